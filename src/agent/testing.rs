//! Test doubles for the agent loop

use crate::llm::{ModelClient, ModelError, ModelReply, ToolSpec};
use crate::thread::Message;
use crate::tools::{Tool, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Model client that replays a fixed script of replies and records every
/// request it sees.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    repeat: Option<ModelReply>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// A model that returns the same reply forever.
    pub fn repeating(reply: ModelReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(reply),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Handle to the recorded request histories.
    pub fn requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        if let Some(reply) = &self.repeat {
            return Ok(reply.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::unknown("script exhausted")))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

struct CannedTool {
    name: String,
    output: ToolOutput,
}

#[async_trait]
impl Tool for CannedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Canned {} for tests", self.name)
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn run(&self, _input: Value) -> ToolOutput {
        self.output.clone()
    }
}

/// A tool that always succeeds with a fixed output.
pub(crate) fn static_tool(name: &str, output: &str) -> Arc<dyn Tool> {
    Arc::new(CannedTool {
        name: name.to_string(),
        output: ToolOutput::success(output),
    })
}

/// A tool that always fails with a fixed message.
pub(crate) fn failing_tool(name: &str, message: &str) -> Arc<dyn Tool> {
    Arc::new(CannedTool {
        name: name.to_string(),
        output: ToolOutput::error(message),
    })
}

//! Common types for model interactions

use crate::thread::ToolCall;
use serde_json::Value;

/// Tool declaration exposed to the model
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Model reply, decided once at the adapter boundary
///
/// A reply carrying any tool calls is a `ToolRequest` even when the model
/// also produced text; that text rides along in the history but is never
/// surfaced as a final answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    FinalAnswer { content: String },
    ToolRequest { content: String, calls: Vec<ToolCall> },
}

impl ModelReply {
    /// Classify a raw assistant reply by whether it carries tool calls.
    pub fn from_parts(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        let content = content.unwrap_or_default();
        if calls.is_empty() {
            ModelReply::FinalAnswer { content }
        } else {
            ModelReply::ToolRequest { content, calls }
        }
    }
}

//! Turn executor
//!
//! Drives the pure transition function against the model client, tool
//! registry and checkpoint store. The whole turn operates on an in-memory
//! copy of the thread state; the single `Persist` effect at `Done` is the
//! only write, so model and persistence failures abort without leaving
//! partial state behind.

use super::{advance, begin, Effect, Step, TransitionError, TurnContext, TurnEvent, TurnPhase};
use crate::llm::{ModelClient, ModelError};
use crate::store::{CheckpointStore, StoreError};
use crate::thread::{Message, ToolCall};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_CYCLES: u32 = 8;

const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant. Use web search when you need current information.";

/// Agent loop configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System instruction prepended to every model call; never persisted.
    pub system_preamble: String,
    /// Upper bound on model calls per turn.
    pub max_cycles: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_preamble: DEFAULT_PREAMBLE.to_string(),
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

/// Errors that abort a turn
///
/// Tool failures never appear here: they are rendered into tool-result
/// messages so the model can react on its next cycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Turn exceeded {limit} model cycles without a final answer")]
    CycleLimit { limit: u32 },
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl From<TransitionError> for AgentError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::CycleLimitExceeded { limit } => AgentError::CycleLimit { limit },
            TransitionError::InvalidTransition(msg) => AgentError::Protocol(msg),
        }
    }
}

/// The agent loop: orchestrates model and tool calls for one thread turn
pub struct AgentLoop<M> {
    store: CheckpointStore,
    model: M,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl<M: ModelClient> AgentLoop<M> {
    pub fn new(store: CheckpointStore, model: M, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            store,
            model,
            tools,
            config,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Process one user-facing turn and return the final assistant answer.
    pub async fn run_turn(&self, thread_id: &str, user_message: &str) -> Result<String, AgentError> {
        let mut state = self.store.load(thread_id)?;
        let ctx = TurnContext::new(thread_id, self.config.max_cycles);
        let specs = self.tools.specs();

        let Step { mut next, mut effects } = begin(user_message);

        loop {
            let mut event: Option<TurnEvent> = None;

            for effect in effects {
                match effect {
                    Effect::Append(message) => state.push(message),
                    Effect::CallModel => {
                        let outbound = self.with_preamble(&state.messages);
                        let reply = self.model.complete(&outbound, &specs).await?;
                        event = Some(TurnEvent::ModelReplied(reply));
                    }
                    Effect::InvokeTools(calls) => {
                        event = Some(TurnEvent::ToolsResolved(self.resolve_tools(&calls).await));
                    }
                    Effect::Persist => {
                        debug_assert!(state.dangling_tool_calls().is_empty());
                        self.store.save(&state)?;
                    }
                }
            }

            if let TurnPhase::Done { reply } = &next {
                tracing::debug!(
                    thread_id = %ctx.thread_id,
                    messages = state.messages.len(),
                    "Turn complete"
                );
                return Ok(reply.clone());
            }

            let event = event
                .ok_or_else(|| AgentError::Protocol("phase produced no event".to_string()))?;
            let step = advance(&ctx, &next, event)?;
            next = step.next;
            effects = step.effects;
        }
    }

    /// Resolve each tool call in request order. Calls within one assistant
    /// turn are independent: no call sees another's result, and a failure
    /// becomes an error-text result rather than an abort.
    async fn resolve_tools(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let content = match self.tools.invoke(&call.name, call.arguments.clone()).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                    format!("Error: {e}")
                }
            };
            results.push(Message::tool_result(call.id.clone(), content));
        }
        results
    }

    fn with_preamble(&self, messages: &[Message]) -> Vec<Message> {
        let mut outbound = Vec::with_capacity(messages.len() + 1);
        outbound.push(Message::system(self.config.system_preamble.clone()));
        outbound.extend_from_slice(messages);
        outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{failing_tool, static_tool, ScriptedModel};
    use crate::llm::ModelReply;
    use crate::thread::{Role, ThreadState};
    use serde_json::json;

    fn tool_request(id: &str, name: &str, query: &str) -> ModelReply {
        ModelReply::ToolRequest {
            content: String::new(),
            calls: vec![ToolCall::new(id, name, json!({"query": query}))],
        }
    }

    fn final_answer(content: &str) -> ModelReply {
        ModelReply::FinalAnswer {
            content: content.to_string(),
        }
    }

    fn agent_with(
        store: CheckpointStore,
        model: ScriptedModel,
        tools: ToolRegistry,
    ) -> AgentLoop<ScriptedModel> {
        AgentLoop::new(store, model, Arc::new(tools), AgentConfig::default())
    }

    #[tokio::test]
    async fn test_final_answer_without_tools() {
        // One model call, straight to done, two new messages.
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![Ok(final_answer("4"))]);
        let agent = agent_with(store.clone(), model, ToolRegistry::with_tools(vec![]));

        let reply = agent.run_turn("t1", "What's 2+2?").await.unwrap();
        assert_eq!(reply, "4");

        let persisted = store.load("t1").unwrap();
        assert_eq!(persisted.messages.len(), 2);
        assert_eq!(persisted.messages[0].role, Role::User);
        assert_eq!(persisted.messages[1].role, Role::Assistant);
        assert_eq!(persisted.messages[1].content, "4");
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        // Tool request, tool result, final answer; four new messages in
        // exact order.
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![
            Ok(tool_request("c1", "web_search", "weather Lima today")),
            Ok(final_answer("It's 22C and sunny")),
        ]);
        let tools = ToolRegistry::with_tools(vec![static_tool("web_search", "22C, sunny")]);
        let agent = agent_with(store.clone(), model, tools);

        let reply = agent
            .run_turn("t1", "What's the weather in Lima today?")
            .await
            .unwrap();
        assert_eq!(reply, "It's 22C and sunny");

        let persisted = store.load("t1").unwrap();
        let roles: Vec<Role> = persisted.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(persisted.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert!(persisted.dangling_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        // An unregistered tool name does not abort the turn.
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![
            Ok(tool_request("c1", "crystal_ball", "tomorrow")),
            Ok(final_answer("I couldn't look that up")),
        ]);
        let agent = agent_with(store.clone(), model, ToolRegistry::with_tools(vec![]));

        let reply = agent.run_turn("t1", "What happens tomorrow?").await.unwrap();
        assert_eq!(reply, "I couldn't look that up");

        let persisted = store.load("t1").unwrap();
        let tool_msg = &persisted.messages[2];
        assert_eq!(tool_msg.role, Role::Tool);
        assert!(tool_msg.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_failing_tool_becomes_error_result() {
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![
            Ok(tool_request("c1", "web_search", "anything")),
            Ok(final_answer("The search failed")),
        ]);
        let tools = ToolRegistry::with_tools(vec![failing_tool("web_search", "network down")]);
        let agent = agent_with(store.clone(), model, tools);

        agent.run_turn("t1", "search something").await.unwrap();

        let tool_msg = &store.load("t1").unwrap().messages[2];
        assert!(tool_msg.content.contains("network down"));
    }

    #[tokio::test]
    async fn test_model_failure_persists_nothing() {
        // A model failure leaves the checkpoint at its pre-turn value.
        let store = CheckpointStore::open_in_memory().unwrap();

        let mut prior = ThreadState::new("t1");
        prior.push(Message::user("earlier"));
        prior.push(Message::assistant("noted"));
        store.save(&prior).unwrap();

        let model = ScriptedModel::new(vec![Err(ModelError::network("connection refused"))]);
        let agent = agent_with(store.clone(), model, ToolRegistry::with_tools(vec![]));

        let err = agent.run_turn("t1", "hello?").await.unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));

        let persisted = store.load("t1").unwrap();
        assert_eq!(persisted.messages, prior.messages);
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_resolved_in_order() {
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::ToolRequest {
                content: String::new(),
                calls: vec![
                    ToolCall::new("c1", "web_search", json!({"query": "a"})),
                    ToolCall::new("c2", "web_search", json!({"query": "b"})),
                ],
            }),
            Ok(final_answer("done")),
        ]);
        let tools = ToolRegistry::with_tools(vec![static_tool("web_search", "hit")]);
        let agent = agent_with(store.clone(), model, tools);

        agent.run_turn("t1", "two lookups please").await.unwrap();

        let persisted = store.load("t1").unwrap();
        assert_eq!(persisted.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(persisted.messages[3].tool_call_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_cycle_limit_aborts_without_persisting() {
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::repeating(tool_request("c1", "web_search", "again"));
        let tools = ToolRegistry::with_tools(vec![static_tool("web_search", "hit")]);
        let agent = AgentLoop::new(
            store.clone(),
            model,
            Arc::new(tools),
            AgentConfig {
                max_cycles: 3,
                ..AgentConfig::default()
            },
        );

        let err = agent.run_turn("t1", "loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::CycleLimit { limit: 3 }));
        assert!(store.load("t1").unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_preamble_prepended_not_persisted() {
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::new(vec![Ok(final_answer("hi"))]);
        let requests = model.requests();
        let agent = agent_with(store.clone(), model, ToolRegistry::with_tools(vec![]));

        agent.run_turn("t1", "hello").await.unwrap();

        let seen = requests.lock().unwrap();
        assert_eq!(seen[0][0].role, Role::System);
        assert_eq!(seen[0][1].role, Role::User);

        let persisted = store.load("t1").unwrap();
        assert!(persisted.messages.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn test_prior_history_included_in_model_call() {
        let store = CheckpointStore::open_in_memory().unwrap();

        let mut prior = ThreadState::new("t1");
        prior.push(Message::user("my name is Ada"));
        prior.push(Message::assistant("Nice to meet you, Ada"));
        store.save(&prior).unwrap();

        let model = ScriptedModel::new(vec![Ok(final_answer("Ada"))]);
        let requests = model.requests();
        let agent = agent_with(store.clone(), model, ToolRegistry::with_tools(vec![]));

        agent.run_turn("t1", "what's my name?").await.unwrap();

        let seen = requests.lock().unwrap();
        // preamble + 2 prior + new user message
        assert_eq!(seen[0].len(), 4);
        assert_eq!(seen[0][1].content, "my name is Ada");

        assert_eq!(store.load("t1").unwrap().messages.len(), 4);
    }
}

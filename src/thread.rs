//! Conversation thread data model
//!
//! A thread is an ordered, append-only message log owned by a single
//! thread id. Message order is conversation order and is load-bearing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single turn unit in a thread
///
/// `tool_calls` is only populated on assistant messages requesting tools;
/// `tool_call_id` only on tool-result messages, and must match a
/// `tool_calls` entry of the assistant message directly before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    /// Assistant message carrying tool-call requests. Content may be
    /// non-empty but is never a user-facing answer in this form.
    pub fn assistant_tool_request(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-result message answering one tool call by id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    #[allow(dead_code)] // Utility method for API completeness
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// Full conversation state for one thread id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ThreadState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: vec![],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Content of the most recent assistant message, if any.
    #[allow(dead_code)] // State query utility
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Tool-call ids that were requested by an assistant message but never
    /// answered by a tool-result message. A resting (persisted) state must
    /// have none.
    pub fn dangling_tool_calls(&self) -> Vec<&str> {
        let answered: Vec<&str> = self
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|tc| tc.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serde_round_trip() {
        let msg = Message::assistant_tool_request(
            "",
            vec![ToolCall::new("c1", "web_search", json!({"query": "weather"}))],
        );

        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_plain_message_omits_tool_fields() {
        let encoded = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(encoded.get("tool_calls").is_none());
        assert!(encoded.get("tool_call_id").is_none());
    }

    #[test]
    fn test_decoding_tolerates_added_fields() {
        let decoded: Message = serde_json::from_value(json!({
            "role": "user",
            "content": "hi",
            "some_future_field": 42
        }))
        .unwrap();
        assert_eq!(decoded.role, Role::User);
    }

    #[test]
    fn test_dangling_tool_calls() {
        let mut state = ThreadState::new("t1");
        state.push(Message::user("weather?"));
        state.push(Message::assistant_tool_request(
            "",
            vec![
                ToolCall::new("c1", "web_search", json!({})),
                ToolCall::new("c2", "web_search", json!({})),
            ],
        ));
        state.push(Message::tool_result("c1", "sunny"));

        assert_eq!(state.dangling_tool_calls(), vec!["c2"]);

        state.push(Message::tool_result("c2", "22C"));
        assert!(state.dangling_tool_calls().is_empty());
    }

    #[test]
    fn test_last_assistant_text() {
        let mut state = ThreadState::new("t1");
        assert!(state.last_assistant_text().is_none());

        state.push(Message::user("2+2?"));
        state.push(Message::assistant("4"));
        state.push(Message::user("thanks"));
        assert_eq!(state.last_assistant_text(), Some("4"));
    }
}

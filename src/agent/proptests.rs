//! Property-based tests for the turn protocol
//!
//! Drives whole turns with arbitrary model scripts and checks the message
//! ordering invariants on the persisted state.

use super::runner::{AgentConfig, AgentError, AgentLoop};
use super::testing::{static_tool, ScriptedModel};
use crate::llm::ModelReply;
use crate::store::CheckpointStore;
use crate::thread::{Role, ToolCall};
use crate::tools::ToolRegistry;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Tool names the model may request; one is registered, one is not, so
/// scripts exercise both the success and the not-found path.
fn arb_tool_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("web_search".to_string()),
        Just("crystal_ball".to_string()),
    ]
}

/// Each round is the list of tool names one assistant message requests.
fn arb_rounds() -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(proptest::collection::vec(arb_tool_name(), 1..=3), 0..=3)
}

/// Build the scripted replies: one tool-request per round, then a final
/// answer. Call ids are unique across the turn.
fn script_from_rounds(rounds: &[Vec<String>], final_content: &str) -> Vec<ModelReply> {
    let mut script = Vec::with_capacity(rounds.len() + 1);
    for (round, names) in rounds.iter().enumerate() {
        let calls = names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(format!("c{round}_{i}"), name, json!({"q": "x"})))
            .collect();
        script.push(ModelReply::ToolRequest {
            content: String::new(),
            calls,
        });
    }
    script.push(ModelReply::FinalAnswer {
        content: final_content.to_string(),
    });
    script
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn turn_preserves_protocol_invariants(
        rounds in arb_rounds(),
        final_content in "[a-zA-Z0-9 ]{0,20}",
    ) {
        let store = CheckpointStore::open_in_memory().unwrap();
        let script = script_from_rounds(&rounds, &final_content)
            .into_iter()
            .map(Ok)
            .collect();
        let model = ScriptedModel::new(script);
        let tools = ToolRegistry::with_tools(vec![static_tool("web_search", "hit")]);
        let agent = AgentLoop::new(store.clone(), model, Arc::new(tools), AgentConfig::default());

        let reply = runtime().block_on(agent.run_turn("t1", "go")).unwrap();
        prop_assert_eq!(&reply, &final_content);

        let persisted = store.load("t1").unwrap();

        // Shape: user, then per round (assistant + one tool result per
        // call), then the final assistant message.
        let expected_len =
            2 + rounds.len() + rounds.iter().map(Vec::len).sum::<usize>();
        prop_assert_eq!(persisted.messages.len(), expected_len);
        prop_assert_eq!(persisted.messages[0].role, Role::User);
        prop_assert_eq!(
            persisted.messages.last().unwrap().role,
            Role::Assistant
        );

        // No dangling tool calls in a resting state, and never a persisted
        // system preamble.
        prop_assert!(persisted.dangling_tool_calls().is_empty());
        prop_assert!(persisted.messages.iter().all(|m| m.role != Role::System));

        // Every tool result directly follows its assistant message, in the
        // order the calls were requested.
        let mut idx = 0;
        while idx < persisted.messages.len() {
            let msg = &persisted.messages[idx];
            if msg.requests_tools() {
                for (offset, call) in msg.tool_calls.iter().enumerate() {
                    let result = &persisted.messages[idx + 1 + offset];
                    prop_assert_eq!(result.role, Role::Tool);
                    prop_assert_eq!(
                        result.tool_call_id.as_deref(),
                        Some(call.id.as_str())
                    );
                }
                idx += 1 + msg.tool_calls.len();
            } else {
                // Any tool result not consumed above would be an orphan.
                prop_assert!(msg.role != Role::Tool);
                idx += 1;
            }
        }
    }

    #[test]
    fn pathological_model_always_hits_cycle_limit(max_cycles in 1u32..5) {
        let store = CheckpointStore::open_in_memory().unwrap();
        let model = ScriptedModel::repeating(ModelReply::ToolRequest {
            content: String::new(),
            calls: vec![ToolCall::new("c1", "web_search", json!({"q": "x"}))],
        });
        let tools = ToolRegistry::with_tools(vec![static_tool("web_search", "hit")]);
        let agent = AgentLoop::new(
            store.clone(),
            model,
            Arc::new(tools),
            AgentConfig { max_cycles, ..AgentConfig::default() },
        );

        let err = runtime().block_on(agent.run_turn("t1", "go")).unwrap_err();
        let hit_cycle_limit = matches!(err, AgentError::CycleLimit { limit } if limit == max_cycles);
        prop_assert!(hit_cycle_limit);
        prop_assert!(store.load("t1").unwrap().messages.is_empty());
    }
}

//! Pure turn transition function
//!
//! Given the same phase and event this always produces the same result,
//! with no I/O. All side effects are returned as `Effect`s for the runner
//! to execute.

use super::{Effect, TurnContext, TurnEvent, TurnPhase};
use crate::llm::ModelReply;
use crate::thread::Message;
use thiserror::Error;

/// Result of a phase transition
#[derive(Debug)]
pub struct Step {
    pub next: TurnPhase,
    pub effects: Vec<Effect>,
}

impl Step {
    pub fn new(next: TurnPhase) -> Self {
        Self {
            next,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Turn exceeded {limit} model cycles without a final answer")]
    CycleLimitExceeded { limit: u32 },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Start a turn: append the incoming user message and request the first
/// model completion.
pub fn begin(user_message: impl Into<String>) -> Step {
    Step::new(TurnPhase::AwaitingModel { cycle: 1 })
        .with_effect(Effect::Append(Message::user(user_message)))
        .with_effect(Effect::CallModel)
}

/// Advance the turn by one event.
pub fn advance(
    ctx: &TurnContext,
    phase: &TurnPhase,
    event: TurnEvent,
) -> Result<Step, TransitionError> {
    match (phase, event) {
        // Final answer: append it, checkpoint, done.
        (
            TurnPhase::AwaitingModel { .. },
            TurnEvent::ModelReplied(ModelReply::FinalAnswer { content }),
        ) => Ok(Step::new(TurnPhase::Done {
            reply: content.clone(),
        })
        .with_effect(Effect::Append(Message::assistant(content)))
        .with_effect(Effect::Persist)),

        // Tool request: append the assistant message (its content, if any,
        // is never a final answer) and resolve every call before the next
        // model cycle.
        (
            TurnPhase::AwaitingModel { cycle },
            TurnEvent::ModelReplied(ModelReply::ToolRequest { content, calls }),
        ) => {
            if *cycle >= ctx.max_cycles {
                return Err(TransitionError::CycleLimitExceeded {
                    limit: ctx.max_cycles,
                });
            }
            Ok(Step::new(TurnPhase::ExecutingTools {
                calls: calls.clone(),
                cycle: *cycle,
            })
            .with_effect(Effect::Append(Message::assistant_tool_request(
                content,
                calls.clone(),
            )))
            .with_effect(Effect::InvokeTools(calls)))
        }

        // All tool results in: append them in request order, loop back to
        // the model.
        (TurnPhase::ExecutingTools { cycle, .. }, TurnEvent::ToolsResolved(results)) => {
            Ok(Step::new(TurnPhase::AwaitingModel { cycle: cycle + 1 })
                .with_effects(results.into_iter().map(Effect::Append))
                .with_effect(Effect::CallModel))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {phase:?} with event {event:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ToolCall;
    use serde_json::json;

    fn ctx() -> TurnContext {
        TurnContext::new("test-thread", 8)
    }

    #[test]
    fn test_begin_appends_user_and_calls_model() {
        let step = begin("What's 2+2?");
        assert_eq!(step.next, TurnPhase::AwaitingModel { cycle: 1 });
        assert!(matches!(&step.effects[0], Effect::Append(m) if m.content == "What's 2+2?"));
        assert!(matches!(step.effects[1], Effect::CallModel));
    }

    #[test]
    fn test_final_answer_goes_done_in_one_step() {
        let step = advance(
            &ctx(),
            &TurnPhase::AwaitingModel { cycle: 1 },
            TurnEvent::ModelReplied(ModelReply::FinalAnswer {
                content: "4".to_string(),
            }),
        )
        .unwrap();

        assert_eq!(
            step.next,
            TurnPhase::Done {
                reply: "4".to_string()
            }
        );
        assert!(matches!(&step.effects[0], Effect::Append(m) if m.content == "4"));
        assert!(matches!(step.effects.last(), Some(Effect::Persist)));
    }

    #[test]
    fn test_tool_request_routes_to_executing_tools() {
        let calls = vec![ToolCall::new(
            "c1",
            "web_search",
            json!({"query": "weather Lima today"}),
        )];
        let step = advance(
            &ctx(),
            &TurnPhase::AwaitingModel { cycle: 1 },
            TurnEvent::ModelReplied(ModelReply::ToolRequest {
                content: String::new(),
                calls: calls.clone(),
            }),
        )
        .unwrap();

        assert_eq!(
            step.next,
            TurnPhase::ExecutingTools {
                calls: calls.clone(),
                cycle: 1
            }
        );
        // No Persist effect mid-turn.
        assert!(!step.effects.iter().any(|e| matches!(e, Effect::Persist)));
        assert!(matches!(&step.effects[1], Effect::InvokeTools(c) if c == &calls));
    }

    #[test]
    fn test_tools_resolved_loops_back_to_model() {
        let step = advance(
            &ctx(),
            &TurnPhase::ExecutingTools {
                calls: vec![ToolCall::new("c1", "web_search", json!({}))],
                cycle: 1,
            },
            TurnEvent::ToolsResolved(vec![Message::tool_result("c1", "22C and sunny")]),
        )
        .unwrap();

        assert_eq!(step.next, TurnPhase::AwaitingModel { cycle: 2 });
        assert!(matches!(&step.effects[0], Effect::Append(m) if m.tool_call_id.as_deref() == Some("c1")));
        assert!(matches!(step.effects.last(), Some(Effect::CallModel)));
    }

    #[test]
    fn test_cycle_limit_guard() {
        let ctx = TurnContext::new("t", 3);
        let result = advance(
            &ctx,
            &TurnPhase::AwaitingModel { cycle: 3 },
            TurnEvent::ModelReplied(ModelReply::ToolRequest {
                content: String::new(),
                calls: vec![ToolCall::new("c9", "web_search", json!({}))],
            }),
        );

        assert!(matches!(
            result,
            Err(TransitionError::CycleLimitExceeded { limit: 3 })
        ));
    }

    #[test]
    fn test_done_is_terminal() {
        let result = advance(
            &ctx(),
            &TurnPhase::Done {
                reply: "4".to_string(),
            },
            TurnEvent::ModelReplied(ModelReply::FinalAnswer {
                content: "5".to_string(),
            }),
        );
        assert!(matches!(result, Err(TransitionError::InvalidTransition(_))));
    }

    #[test]
    fn test_tools_resolved_requires_executing_phase() {
        let result = advance(
            &ctx(),
            &TurnPhase::AwaitingModel { cycle: 1 },
            TurnEvent::ToolsResolved(vec![]),
        );
        assert!(matches!(result, Err(TransitionError::InvalidTransition(_))));
    }
}

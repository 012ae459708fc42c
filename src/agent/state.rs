//! Turn phase types

use crate::thread::ToolCall;

/// Phase of one user-facing turn
///
/// Entered at `AwaitingModel` when the user message arrives; alternates
/// with `ExecutingTools` while the model keeps requesting tools; `Done` is
/// terminal for the cycle and the machine is re-created fresh on the next
/// user message.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPhase {
    /// A model completion is (about to be) in flight. `cycle` counts model
    /// calls within this turn, starting at 1.
    AwaitingModel { cycle: u32 },

    /// Resolving the tool calls of the latest assistant message, in the
    /// order they were requested.
    ExecutingTools { calls: Vec<ToolCall>, cycle: u32 },

    /// Final answer produced and state checkpointed.
    Done { reply: String },
}

impl TurnPhase {
    #[allow(dead_code)] // State query utility
    pub fn is_done(&self) -> bool {
        matches!(self, TurnPhase::Done { .. })
    }
}

/// Immutable configuration for one turn
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub thread_id: String,
    /// Upper bound on model calls per turn; guards against a model that
    /// never stops requesting tools.
    pub max_cycles: u32,
}

impl TurnContext {
    pub fn new(thread_id: impl Into<String>, max_cycles: u32) -> Self {
        Self {
            thread_id: thread_id.into(),
            max_cycles,
        }
    }
}

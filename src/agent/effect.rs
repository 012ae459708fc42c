//! Effects produced by phase transitions

use crate::thread::{Message, ToolCall};

/// Effects to be executed after a phase transition, in order
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a message to the in-memory thread state
    Append(Message),

    /// Request a model completion over the current history
    CallModel,

    /// Invoke each tool call sequentially, in request order
    InvokeTools(Vec<ToolCall>),

    /// Checkpoint the full thread state
    Persist,
}

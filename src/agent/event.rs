//! Events that advance a turn

use crate::llm::ModelReply;
use crate::thread::Message;

/// Events that trigger phase transitions
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// The model client returned a reply.
    ModelReplied(ModelReply),

    /// All tool calls of the current assistant message have been resolved
    /// into tool-result messages, in request order.
    ToolsResolved(Vec<Message>),
}

//! Model client abstraction
//!
//! Wraps a language-model completion call behind a narrow trait: message
//! history plus tool specs in, a tagged reply (final answer or tool
//! requests) out. The tool-vs-final decision is made once here, at the
//! adapter boundary.

mod error;
mod groq;
mod types;

pub use error::{ModelError, ModelErrorKind};
pub use groq::{GroqClient, GroqConfig};
pub use types::{ModelReply, ToolSpec};

use crate::thread::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for model providers
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Make a completion request over the full message history.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        (**self).complete(messages, tools).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for model clients
pub struct LoggingClient {
    inner: Arc<dyn ModelClient>,
    model_id: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn ModelClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ModelClient for LoggingClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(messages, tools).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = messages.len(),
                    tool_request = matches!(reply, ModelReply::ToolRequest { .. }),
                    "Model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Model request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

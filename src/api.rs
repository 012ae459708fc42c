//! HTTP API
//!
//! Thin boundary over the session layer: parses requests, maps core error
//! kinds to transport statuses, and nothing else.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::LoggingClient;
use crate::session::SessionManager;
use std::sync::Arc;

/// Production session type used by the handlers
pub type AppSession = SessionManager<LoggingClient>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<AppSession>,
}

impl AppState {
    pub fn new(sessions: AppSession) -> Self {
        Self {
            sessions: Arc::new(sessions),
        }
    }
}

//! Session API
//!
//! The entry point the HTTP layer talks to: resolves or mints a thread id,
//! serializes turns per thread, and delegates orchestration to the agent
//! loop. The per-thread mutex makes the load-mutate-save cycle atomic for
//! a given thread id; the checkpoint store underneath stays
//! last-writer-wins.

use crate::agent::{AgentError, AgentLoop};
use crate::llm::ModelClient;
use crate::store::CheckpointStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome of a completed turn
#[derive(Debug, Clone)]
pub struct SessionReply {
    pub thread_id: String,
    pub response: String,
}

/// Manager for all conversation sessions
pub struct SessionManager<M> {
    agent: AgentLoop<M>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<M: ModelClient> SessionManager<M> {
    pub fn new(agent: AgentLoop<M>) -> Self {
        Self {
            agent,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get the checkpoint store handle
    pub fn store(&self) -> &CheckpointStore {
        self.agent.store()
    }

    /// Process one user message and return the final assistant answer.
    /// A missing thread id starts a fresh thread.
    pub async fn chat(
        &self,
        thread_id: Option<String>,
        message: &str,
    ) -> Result<SessionReply, AgentError> {
        let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let lock = self.thread_lock(&thread_id).await;
        let _guard = lock.lock().await;

        tracing::info!(thread_id = %thread_id, "Processing turn");
        let response = self.agent.run_turn(&thread_id, message).await?;

        Ok(SessionReply {
            thread_id,
            response,
        })
    }

    /// Get or create the mutex for a thread id.
    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(thread_id) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::agent::AgentConfig;
    use crate::llm::ModelReply;
    use crate::tools::ToolRegistry;

    fn final_answer(content: &str) -> Result<ModelReply, crate::llm::ModelError> {
        Ok(ModelReply::FinalAnswer {
            content: content.to_string(),
        })
    }

    fn manager(model: ScriptedModel) -> SessionManager<ScriptedModel> {
        let store = CheckpointStore::open_in_memory().unwrap();
        SessionManager::new(AgentLoop::new(
            store,
            model,
            Arc::new(ToolRegistry::with_tools(vec![])),
            AgentConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_generates_thread_id_when_absent() {
        let mgr = manager(ScriptedModel::new(vec![final_answer("hi")]));

        let reply = mgr.chat(None, "hello").await.unwrap();
        assert!(!reply.thread_id.is_empty());
        assert_eq!(reply.response, "hi");

        let state = mgr.store().load(&reply.thread_id).unwrap();
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_thread_resumes_across_requests() {
        let mgr = manager(ScriptedModel::new(vec![
            final_answer("first"),
            final_answer("second"),
        ]));

        let first = mgr.chat(None, "one").await.unwrap();
        let second = mgr
            .chat(Some(first.thread_id.clone()), "two")
            .await
            .unwrap();

        assert_eq!(second.thread_id, first.thread_id);
        let state = mgr.store().load(&first.thread_id).unwrap();
        assert_eq!(state.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_same_thread_are_serialized() {
        // Characterizes the same-thread-id behavior: with the per-thread
        // lock, neither turn's messages are lost.
        let mgr = Arc::new(manager(ScriptedModel::new(vec![
            final_answer("a"),
            final_answer("b"),
        ])));

        let (m1, m2) = (mgr.clone(), mgr.clone());
        let (r1, r2) = tokio::join!(
            m1.chat(Some("shared".to_string()), "first"),
            m2.chat(Some("shared".to_string()), "second"),
        );
        r1.unwrap();
        r2.unwrap();

        let state = mgr.store().load("shared").unwrap();
        assert_eq!(state.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_distinct_threads_do_not_interfere() {
        let mgr = manager(ScriptedModel::new(vec![
            final_answer("a"),
            final_answer("b"),
        ]));

        let r1 = mgr.chat(Some("one".to_string()), "for one").await.unwrap();
        let r2 = mgr.chat(Some("two".to_string()), "for two").await.unwrap();

        assert_ne!(r1.thread_id, r2.thread_id);
        assert_eq!(mgr.store().load("one").unwrap().messages.len(), 2);
        assert_eq!(mgr.store().load("two").unwrap().messages.len(), 2);
    }
}

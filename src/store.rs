//! Checkpoint store
//!
//! Durable snapshots of conversation threads: one SQLite row per thread id,
//! value = the JSON-serialized message log. Saves are full replacements
//! (last writer wins at this layer; the session layer serializes writers
//! per thread id).

use crate::thread::{Message, ThreadState};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt checkpoint for thread {thread_id}: {source}")]
    Corrupt {
        thread_id: String,
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints(updated_at DESC);
";

/// Thread-safe checkpoint store handle
#[derive(Clone)]
pub struct CheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

/// Listing entry for read-only history endpoints
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Load the state for a thread id. Unknown ids yield a fresh empty
    /// state, never an error.
    pub fn load(&self, thread_id: &str) -> StoreResult<ThreadState> {
        let conn = self.conn.lock().unwrap();
        let row: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match row {
            Some(encoded) => {
                let messages: Vec<Message> =
                    serde_json::from_str(&encoded).map_err(|source| StoreError::Corrupt {
                        thread_id: thread_id.to_string(),
                        source,
                    })?;
                Ok(ThreadState {
                    thread_id: thread_id.to_string(),
                    messages,
                })
            }
            None => Ok(ThreadState::new(thread_id)),
        }
    }

    /// Persist a thread's full state, replacing any prior checkpoint.
    pub fn save(&self, state: &ThreadState) -> StoreResult<()> {
        let encoded = serde_json::to_string(&state.messages)?;
        let now = Utc::now();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checkpoints (thread_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(thread_id) DO UPDATE SET state = ?2, updated_at = ?3",
            params![state.thread_id, encoded, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// List known threads, most recently updated first.
    pub fn list_threads(&self) -> StoreResult<Vec<ThreadSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT thread_id, updated_at FROM checkpoints ORDER BY updated_at DESC")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        rows.map(|row| {
            let (thread_id, updated_at) = row?;
            Ok(ThreadSummary {
                thread_id,
                updated_at: parse_datetime(&updated_at),
            })
        })
        .collect()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

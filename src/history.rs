//! Per-user plan history
//!
//! Responsible for storing generated plans, most recent first.
//! Currently in-memory behind a trait so a durable store can be
//! substituted without touching the planning pipeline.

use crate::models::HistoryEntry;
use crate::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Plans kept per user; older entries are evicted
pub const HISTORY_CAP: usize = 20;

/// Trait for history persistence
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Store an entry at the front of the user's history
    async fn push(&self, username: &str, entry: HistoryEntry) -> Result<()>;
    /// Load up to `limit` most recent entries
    async fn recent(&self, username: &str, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// In-memory history store for development
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<HashMap<String, VecDeque<HistoryEntry>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn push(&self, username: &str, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let history = entries.entry(username.to_string()).or_default();

        history.push_front(entry);
        history.truncate(HISTORY_CAP);

        Ok(())
    }

    async fn recent(&self, username: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries.read().await;

        Ok(entries
            .get(username)
            .map(|history| history.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

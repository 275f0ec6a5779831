//! Process-scoped key/value store visible to every executor in one run.
//!
//! Guarded at map granularity by a single `tokio::sync::RwLock`: writers racing within the same
//! superstep observe last-writer-wins, which is the documented contract, not a bug. Per-key
//! sharding (e.g. a `DashMap`) was considered and rejected — it would only matter if the contract
//! promised per-key serialization, which it explicitly does not. Cross-executor coordination is
//! expected to flow through the message graph, not through races on shared state.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Shared key/value store for one workflow run.
#[derive(Default)]
pub struct SharedState {
    inner: RwLock<HashMap<String, serde_json::Value>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner.write().await.insert(key.into(), value);
    }

    pub async fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.write().await.remove(key)
    }

    /// Snapshot the entire map, e.g. for a checkpoint.
    pub async fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.inner.read().await.clone()
    }

    /// Replace the entire map, e.g. when restoring from a checkpoint.
    pub async fn restore(&self, state: HashMap<String, serde_json::Value>) {
        *self.inner.write().await = state;
    }
}

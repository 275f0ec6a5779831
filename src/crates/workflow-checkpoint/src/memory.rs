//! In-memory [`CheckpointStore`] implementation.
//!
//! Stores every checkpoint in a process-local map. Fast, requires no configuration, and is
//! appropriate for development, tests, and single-process runs where durability across restarts
//! is not required — exactly the role `InMemoryRunnerContext` plays for mailboxes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::traits::CheckpointStore;

/// Process-local checkpoint store backed by a `HashMap` guarded by an async `RwLock`.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all stored checkpoints. Useful for test isolation between cases that share a
    /// store instance.
    pub async fn clear(&self) {
        self.checkpoints.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
        let id = checkpoint.checkpoint_id.clone();
        self.checkpoints.write().await.insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(checkpoint_id).cloned())
    }

    async fn list(&self, workflow_id: Option<&str>) -> Result<Vec<String>> {
        let guard = self.checkpoints.read().await;
        Ok(guard
            .values()
            .filter(|cp| workflow_id.map_or(true, |wf| cp.workflow_id == wf))
            .map(|cp| cp.checkpoint_id.clone())
            .collect())
    }

    async fn list_full(&self, workflow_id: Option<&str>) -> Result<Vec<Checkpoint>> {
        let guard = self.checkpoints.read().await;
        Ok(guard
            .values()
            .filter(|cp| workflow_id.map_or(true, |wf| cp.workflow_id == wf))
            .cloned()
            .collect())
    }

    async fn delete(&self, checkpoint_id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().await.remove(checkpoint_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn checkpoint(workflow_id: &str) -> Checkpoint {
        Checkpoint::new(workflow_id, Map::new(), Vec::new(), Map::new(), Map::new(), 0, 100)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("wf-1");
        let id = store.save(cp.clone()).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded, Some(cp));
    }

    #[tokio::test]
    async fn load_missing_returns_none_not_error() {
        let store = InMemoryCheckpointStore::new();
        assert_eq!(store.load("does-not-exist").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_by_workflow_id() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("wf-a")).await.unwrap();
        store.save(checkpoint("wf-a")).await.unwrap();
        store.save(checkpoint("wf-b")).await.unwrap();

        assert_eq!(store.list(Some("wf-a")).await.unwrap().len(), 2);
        assert_eq!(store.list(Some("wf-b")).await.unwrap().len(), 1);
        assert_eq!(store.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_reports_prior_existence() {
        let store = InMemoryCheckpointStore::new();
        let id = store.save(checkpoint("wf-1")).await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
    }
}

//! File-backed [`CheckpointStore`]: one JSON file per checkpoint under a root directory.
//!
//! Layout: `<root>/<checkpoint_id>.json`. `list`/`list_full` scan the directory; a file that
//! fails to parse as a [`Checkpoint`] is skipped with a `tracing::warn!`, not surfaced as an
//! error — a single corrupt checkpoint must not make the rest of a run's history unreadable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;

/// Checkpoint store that persists each checkpoint as its own JSON file.
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Open (creating if necessary) a checkpoint directory at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, checkpoint_id: &str) -> PathBuf {
        self.root.join(format!("{checkpoint_id}.json"))
    }

    async fn read_checkpoint(path: &Path) -> Option<Checkpoint> {
        let bytes = fs::read(path).await.ok()?;
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(cp) => Some(cp),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unparseable checkpoint file");
                None
            }
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
        let id = checkpoint.checkpoint_id.clone();
        let path = self.path_for(&id);
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        fs::write(&path, bytes).await?;
        Ok(id)
    }

    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(checkpoint_id);
        if !path.exists() {
            return Ok(None);
        }
        match fs::read(&path).await {
            Ok(bytes) => {
                let checkpoint = serde_json::from_slice(&bytes).map_err(|err| {
                    CheckpointError::invalid(format!(
                        "checkpoint file {} failed to parse: {err}",
                        path.display()
                    ))
                })?;
                Ok(Some(checkpoint))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, workflow_id: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .list_full(workflow_id)
            .await?
            .into_iter()
            .map(|cp| cp.checkpoint_id)
            .collect())
    }

    async fn list_full(&self, workflow_id: Option<&str>) -> Result<Vec<Checkpoint>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(cp) = Self::read_checkpoint(&path).await {
                if workflow_id.map_or(true, |wf| cp.workflow_id == wf) {
                    found.push(cp);
                }
            }
        }
        Ok(found)
    }

    async fn delete(&self, checkpoint_id: &str) -> Result<bool> {
        let path = self.path_for(checkpoint_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

//! The [`CheckpointStore`] trait: the storage-backend abstraction for checkpoint persistence.
//!
//! Implementations must be `Send + Sync` so a store can be shared (typically behind an `Arc`)
//! across the scheduler and any external inspection tooling. This crate ships two reference
//! implementations: [`crate::memory::InMemoryCheckpointStore`] and
//! [`crate::file::FileCheckpointStore`].
//!
//! # Implementing a custom backend
//!
//! ```rust,no_run
//! use workflow_checkpoint::{Checkpoint, CheckpointStore, Result};
//! use async_trait::async_trait;
//!
//! struct RedisCheckpointStore {
//!     // connection handle, etc.
//! }
//!
//! #[async_trait]
//! impl CheckpointStore for RedisCheckpointStore {
//!     async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
//!         todo!("serialize and write to Redis")
//!     }
//!     async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
//!         todo!("read and deserialize from Redis")
//!     }
//!     async fn list(&self, workflow_id: Option<&str>) -> Result<Vec<String>> {
//!         todo!("scan keys matching workflow_id")
//!     }
//!     async fn list_full(&self, workflow_id: Option<&str>) -> Result<Vec<Checkpoint>> {
//!         todo!("scan and deserialize")
//!     }
//!     async fn delete(&self, checkpoint_id: &str) -> Result<bool> {
//!         todo!("delete key, report whether it existed")
//!     }
//! }
//! ```
use async_trait::async_trait;

use crate::checkpoint::Checkpoint;
use crate::error::Result;

/// Storage backend for workflow checkpoints.
///
/// A `CheckpointStore` is intentionally narrow: it knows nothing about the workflow graph, the
/// scheduler, or message/event payload shapes. It persists and retrieves opaque [`Checkpoint`]
/// values keyed by `checkpoint_id`, optionally filterable by `workflow_id`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, returning its id (equal to `checkpoint.checkpoint_id`).
    async fn save(&self, checkpoint: Checkpoint) -> Result<String>;

    /// Load a checkpoint by id. Returns `Ok(None)` if it does not exist — absence is not an
    /// error, per the checkpoint store contract.
    async fn load(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// List checkpoint ids, optionally restricted to one workflow run.
    async fn list(&self, workflow_id: Option<&str>) -> Result<Vec<String>>;

    /// List full checkpoints, optionally restricted to one workflow run.
    async fn list_full(&self, workflow_id: Option<&str>) -> Result<Vec<Checkpoint>>;

    /// Delete a checkpoint by id. Returns whether it existed.
    async fn delete(&self, checkpoint_id: &str) -> Result<bool>;
}

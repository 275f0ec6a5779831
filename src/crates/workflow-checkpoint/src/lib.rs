//! Checkpoint storage for the workflow engine.
//!
//! This crate defines the [`CheckpointStore`] trait and two reference implementations —
//! [`InMemoryCheckpointStore`] and [`FileCheckpointStore`] — that persist a flat, payload-agnostic
//! [`Checkpoint`] snapshot of a workflow run: its undelivered outbox, unconsumed events, shared
//! state, and per-executor private state.
//!
//! It has no dependency on `workflow-core`; message and event payloads are stored as opaque
//! `serde_json::Value`. Typed (de)serialization into the core crate's `Message`/`WorkflowEvent`
//! types happens on the `workflow-core` side when a `Checkpoint` is built from or restored into a
//! live run.
//!
//! ```
//! use workflow_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
//! use std::collections::HashMap;
//!
//! # async fn run() -> workflow_checkpoint::Result<()> {
//! let store = InMemoryCheckpointStore::new();
//! let checkpoint = Checkpoint::new(
//!     "wf-1",
//!     HashMap::new(),
//!     Vec::new(),
//!     HashMap::new(),
//!     HashMap::new(),
//!     0,
//!     100,
//! );
//! let id = store.save(checkpoint).await?;
//! assert!(store.load(&id).await?.is_some());
//! # Ok(())
//! # }
//! ```

mod checkpoint;
mod error;
mod file;
mod memory;
mod traits;

pub use checkpoint::{Checkpoint, CheckpointedMessage, CHECKPOINT_SCHEMA_VERSION};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use traits::CheckpointStore;

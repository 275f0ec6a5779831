//! P5 — checkpoint round-trip: for any checkpoint produced by `save`, `load` returns a checkpoint
//! equal to it by field, against every `CheckpointStore` implementation this crate ships.

use std::collections::HashMap;

use proptest::prelude::*;
use workflow_checkpoint::{Checkpoint, CheckpointStore, CheckpointedMessage, FileCheckpointStore, InMemoryCheckpointStore};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 20,
        ..ProptestConfig::default()
    }
}

/// A scoped temp directory, removed on drop, so `FileCheckpointStore` cases don't leak files
/// across proptest runs.
struct TempDir(std::path::PathBuf);

impl TempDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("workflow-checkpoint-roundtrip-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn checkpointed_message_strategy() -> impl Strategy<Value = CheckpointedMessage> {
    (any::<i64>(), "[a-z]{1,8}", prop::option::of("[a-z]{1,8}")).prop_map(|(n, source_id, target_id)| CheckpointedMessage {
        data: serde_json::json!(n),
        source_id,
        target_id,
    })
}

fn checkpoint_strategy() -> impl Strategy<Value = Checkpoint> {
    (
        "[a-z]{1,8}",
        prop::collection::hash_map("[a-z]{1,4}", prop::collection::vec(checkpointed_message_strategy(), 0..3), 0..3),
        prop::collection::vec(any::<i64>().prop_map(|n| serde_json::json!({ "n": n })), 0..4),
        prop::collection::hash_map("[a-z]{1,4}", any::<i64>().prop_map(|n| serde_json::json!(n)), 0..3),
        prop::collection::hash_map("[a-z]{1,4}", any::<bool>().prop_map(|b| serde_json::json!(b)), 0..3),
        0u64..1000,
        1u64..1000,
    )
        .prop_map(|(workflow_id, messages, events, shared_state, executor_states, iteration_count, max_iterations)| {
            Checkpoint::new(workflow_id, messages, events, shared_state, executor_states, iteration_count, max_iterations)
        })
}

proptest! {
    #![proptest_config(config())]

    /// P5 for the in-memory store: `load(save(c).await.id)` equals `c` by field.
    #[test]
    fn in_memory_store_round_trips_any_checkpoint(checkpoint in checkpoint_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = InMemoryCheckpointStore::new();
            let expected = checkpoint.clone();
            let id = store.save(checkpoint).await.unwrap();
            prop_assert_eq!(id, expected.checkpoint_id.clone());
            let loaded = store.load(&expected.checkpoint_id).await.unwrap();
            prop_assert_eq!(loaded, Some(expected));
            Ok(())
        })?;
    }

    /// P5 for the file-backed store: same guarantee, through a JSON file round trip.
    #[test]
    fn file_store_round_trips_any_checkpoint(checkpoint in checkpoint_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dir = TempDir::new();
            let store = FileCheckpointStore::new(dir.path()).await.unwrap();
            let expected = checkpoint.clone();
            let id = store.save(checkpoint).await.unwrap();
            prop_assert_eq!(id, expected.checkpoint_id.clone());
            let loaded = store.load(&expected.checkpoint_id).await.unwrap();
            prop_assert_eq!(loaded, Some(expected));
            Ok(())
        })?;
    }
}

/// Beyond the field-equality property above: resuming from a checkpoint should let a caller
/// observe the same undelivered messages and queued events a non-checkpointed run would still
/// have in flight, not just a structurally equal struct.
#[tokio::test]
async fn resumed_checkpoint_preserves_undelivered_work() {
    let store = InMemoryCheckpointStore::new();

    let mut messages = HashMap::new();
    messages.insert(
        "a".to_string(),
        vec![CheckpointedMessage {
            data: serde_json::json!("pending"),
            source_id: "a".to_string(),
            target_id: Some("b".to_string()),
        }],
    );
    let events = vec![serde_json::json!({ "kind": "WorkflowWarning", "text": "in flight" })];

    let checkpoint = Checkpoint::new("wf-1", messages, events, HashMap::new(), HashMap::new(), 3, 100);
    let id = store.save(checkpoint.clone()).await.unwrap();

    let resumed = store.load(&id).await.unwrap().unwrap();
    assert_eq!(resumed.messages, checkpoint.messages);
    assert_eq!(resumed.events, checkpoint.events);
    assert_eq!(resumed.iteration_count, 3);
}

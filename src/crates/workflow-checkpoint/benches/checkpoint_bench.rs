use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use workflow_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};

fn checkpoint_save_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("checkpoint save", |b| {
        b.to_async(&runtime).iter(|| async {
            let store = InMemoryCheckpointStore::new();
            let checkpoint = Checkpoint::new(
                "bench-workflow",
                HashMap::new(),
                Vec::new(),
                HashMap::new(),
                HashMap::new(),
                0,
                100,
            );

            store.save(black_box(checkpoint)).await.unwrap();
        });
    });
}

fn checkpoint_load_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("checkpoint load", |b| {
        b.to_async(&runtime).iter(|| async {
            let store = InMemoryCheckpointStore::new();
            let checkpoint = Checkpoint::new(
                "bench-workflow",
                HashMap::new(),
                Vec::new(),
                HashMap::new(),
                HashMap::new(),
                0,
                100,
            );

            let id = store.save(checkpoint).await.unwrap();
            store.load(black_box(&id)).await.unwrap();
        });
    });
}

criterion_group!(benches, checkpoint_save_benchmark, checkpoint_load_benchmark);
criterion_main!(benches);

//! Performance benchmarks for the forum store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forum_store::{
    Comment, CommentInput, Context, LogConfig, LogStorage, MemoryStorage, Page, ParentRef,
    PostId, PostInput, Storage, SubscriptionHub, Timestamp,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id(prefix: &str) -> String {
    format!("{}{}", prefix, NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn create_log_storage(dir: &TempDir) -> LogStorage {
    LogStorage::create(LogConfig {
        path: dir.path().join("forum"),
        create_if_missing: true,
        sync_interval: 10000, // No fsync during bench
    })
    .unwrap()
}

fn with_post(storage: &dyn Storage) -> PostId {
    let id = next_id("P");
    storage
        .create_post(&Context::background(), PostInput::new(id.as_str(), "t", "b", "ann"))
        .unwrap()
        .id
}

/// Benchmark comment creation on each backend
fn bench_create_comment(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_comment");
    let ctx = Context::background();

    let memory = MemoryStorage::new();
    let post_id = with_post(&memory);
    group.bench_function("memory", |b| {
        b.iter(|| {
            black_box(
                memory
                    .create_comment(&ctx, CommentInput::new(next_id("C"), post_id.clone(), "bob", "hello"))
                    .unwrap(),
            );
        });
    });

    let dir = TempDir::new().unwrap();
    let log = create_log_storage(&dir);
    let post_id = with_post(&log);
    group.bench_function("log", |b| {
        b.iter(|| {
            black_box(
                log.create_comment(&ctx, CommentInput::new(next_id("C"), post_id.clone(), "bob", "hello"))
                    .unwrap(),
            );
        });
    });

    group.finish();
}

/// Benchmark reading a whole chain of varying length
fn bench_read_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_chain");
    let ctx = Context::background();

    for length in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("comments", length), &length, |b, &length| {
            let store = MemoryStorage::new();
            let post_id = with_post(&store);
            for i in 0..length {
                store
                    .create_comment(&ctx, CommentInput::new(format!("C{}", i), post_id.clone(), "bob", "x"))
                    .unwrap();
            }

            b.iter(|| {
                black_box(store.get_comments_by_post(&ctx, &post_id, Page::all()).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark fan-out to a growing number of listeners
fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let ctx = Context::background();
    let post_id = PostId::from("P");
    let comment = Comment {
        id: "C".into(),
        post_id: post_id.clone(),
        parent: ParentRef::Post(post_id.clone()),
        author: "bob".into(),
        content: "hello".into(),
        created_at: Timestamp::now(),
    };

    for listeners in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &listeners| {
                let hub = SubscriptionHub::new();
                let handles: Vec<_> = (0..listeners)
                    .map(|_| hub.subscribe(&ctx, &post_id).unwrap())
                    .collect();

                b.iter(|| {
                    black_box(hub.publish(&ctx, &comment).unwrap());
                    for handle in &handles {
                        while handle.try_recv().is_ok() {}
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark replaying a log on open
fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    group.sample_size(20);
    let ctx = Context::background();

    for comments in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("comments", comments), &comments, |b, &comments| {
            let dir = TempDir::new().unwrap();
            let config = LogConfig {
                path: dir.path().join("forum"),
                create_if_missing: true,
                sync_interval: 10000,
            };
            {
                let storage = LogStorage::create(config.clone()).unwrap();
                let post_id = with_post(&storage);
                for i in 0..comments {
                    storage
                        .create_comment(&ctx, CommentInput::new(format!("C{}", i), post_id.clone(), "bob", "x"))
                        .unwrap();
                }
            }

            b.iter(|| {
                black_box(LogStorage::open(config.clone()).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_comment,
    bench_read_chain,
    bench_publish,
    bench_reopen,
);

criterion_main!(benches);

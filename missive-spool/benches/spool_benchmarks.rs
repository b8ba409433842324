//! Benchmarks for spool operations
//!
//! - Codec encode/decode across body sizes
//! - In-memory store append, batch load, and the append → load → delete cycle
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{collections::BTreeSet, hint::black_box};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use missive_spool::{MemoryBackingStore, MessageRecord, MessageStore, codec};

fn create_test_record(body_size: usize, created_time: u64) -> MessageRecord {
    MessageRecord::new("noreply@example.com", "recipient@example.com")
        .plugin_id("ActivityMentionPlugin")
        .owner_parameter("activityId", "1234")
        .subject("You were mentioned")
        .body("<p>".to_string() + &"X".repeat(body_size) + "</p>")
        .footer("<p>Manage your notification settings</p>")
        .created_time(created_time)
}

const SIZES: [(usize, &str); 3] = [(1024, "1KB"), (10 * 1024, "10KB"), (100 * 1024, "100KB")];

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for (size, desc) in SIZES {
        let record = create_test_record(size, 1);
        let encoded = codec::encode(&record).expect("Encode succeeds");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", desc), &record, |b, record| {
            b.iter(|| black_box(codec::encode(black_box(record)).expect("Encode succeeds")));
        });
        group.bench_with_input(BenchmarkId::new("decode", desc), &encoded, |b, encoded| {
            b.iter(|| black_box(codec::decode(black_box(encoded)).expect("Decode succeeds")));
        });
    }

    group.finish();
}

fn bench_store_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_append");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    for (size, desc) in SIZES {
        let store = MemoryBackingStore::new();
        let record = create_test_record(size, 0);
        let mut created_time = 0_u64;

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::from_parameter(desc), |b| {
            b.to_async(&runtime).iter_batched(
                || {
                    created_time += 1;
                    (store.clone(), record.clone().created_time(created_time))
                },
                |(store, record)| async move {
                    black_box(store.append(&record).await.expect("Append succeeds"))
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_store_load_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load_batch");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    for count in [100_u64, 1000, 10_000] {
        let store = MemoryBackingStore::new();
        runtime.block_on(async {
            for created_time in 1..=count {
                store
                    .append(&create_test_record(1024, created_time))
                    .await
                    .expect("Append succeeds");
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("20_of_{count}")),
            &count,
            |b, &count| {
                b.to_async(&runtime).iter(|| {
                    let store = store.clone();
                    async move {
                        black_box(
                            store
                                .load_batch(black_box(count / 2), 20)
                                .await
                                .expect("Load succeeds"),
                        )
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_store_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_cycle");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    group.bench_function("append_load_delete_20", |b| {
        b.to_async(&runtime).iter(|| async {
            let store = MemoryBackingStore::new();
            for created_time in 1..=20 {
                store
                    .append(&create_test_record(1024, created_time))
                    .await
                    .expect("Append succeeds");
            }

            let batch = store.load_batch(0, 20).await.expect("Load succeeds");
            let ids: BTreeSet<_> = batch.into_iter().filter_map(|r| r.id).collect();
            black_box(store.delete_by_ids(&ids).await.expect("Delete succeeds"));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_store_append,
    bench_store_load_batch,
    bench_store_cycle
);
criterion_main!(benches);

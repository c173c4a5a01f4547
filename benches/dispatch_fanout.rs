//! Dispatch benchmarks for configio.
//!
//! Measures the cost of fanning one change out to many subscribers and of
//! reading and writing keyed values.

use configio::notify::{Dispatcher, SubscriptionRegistry};
use configio::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BenchConfig {
    value: i32,
    name: String,
    items: Vec<String>,
}

impl Keyed for BenchConfig {
    fn key(&self) -> &str {
        "bench"
    }
}

fn sample() -> BenchConfig {
    BenchConfig {
        value: 42,
        name: "benchmark".to_string(),
        items: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    }
}

/// Benchmark one dispatch round against a growing number of subscribers
fn benchmark_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("fanout");

    for subscribers in [1usize, 10, 100, 1000] {
        let registry = SubscriptionRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone(), CancellationToken::new());

        let receivers: Vec<_> = (0..subscribers)
            .map(|i| registry.register(format!("sub-{i}"), (), |_, _, _| Status::ok()))
            .collect();

        // One reader task per subscriber drains tokens for the whole run.
        let readers: Vec<_> = receivers
            .into_iter()
            .map(|mut rx| rt.spawn(async move { while rx.recv().await.is_some() {} }))
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async {
                        for (_, handle) in dispatcher.dispatch() {
                            black_box(handle.await.unwrap());
                        }
                    })
                });
            },
        );

        for reader in readers {
            reader.abort();
        }
    }

    group.finish();
}

/// Benchmark keyed reads and writes against the backing file
fn benchmark_read_write(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let manager = rt
        .block_on(
            ConfigManager::builder()
                .with_file(temp_dir.path().join("config.json"))
                .with_watch(false)
                .build(),
        )
        .unwrap();
    manager.marshal(&sample()).unwrap();

    let mut group = c.benchmark_group("read_write");
    group.bench_function("unmarshal", |b| {
        b.iter(|| {
            let mut cfg = BenchConfig::default();
            manager.unmarshal(&mut cfg).unwrap();
            black_box(cfg.value);
        });
    });
    group.bench_function("marshal", |b| {
        let cfg = sample();
        b.iter(|| manager.marshal(black_box(&cfg)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, benchmark_fanout, benchmark_read_write);
criterion_main!(benches);

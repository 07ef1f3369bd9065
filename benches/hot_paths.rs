//! Hot path benchmark suite.
//!
//! Benchmarks the per-command work that runs before any I/O:
//! - Canonical key construction at different payload sizes
//! - Cache lookups (hit and stale)
//! - Deduplicated local commands
//!
//! Run with: cargo bench --bench hot_paths
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use tokio::runtime::Runtime;
use wallet_transport::service::{ResponseCache, command_key};
use wallet_transport::{CommandService, LocalBridge, TransportConfig};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_FIELDS: &[usize] = &[1, 16, 128];
const CONCURRENT_CALLS: &[usize] = &[1, 32, 256];

fn payload(fields: usize) -> Value {
    let map: Map<String, Value> = (0..fields)
        .rev()
        .map(|i| (format!("field_{i:04}"), json!({"n": i, "tags": ["a", "b"]})))
        .collect();
    Value::Object(map)
}

// ============================================================================
// Benchmark: Command Key
// ============================================================================

fn bench_command_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_key");

    for &fields in PAYLOAD_FIELDS {
        let value = payload(fields);
        group.bench_with_input(BenchmarkId::new("fields", fields), &value, |b, value| {
            b.iter(|| command_key(black_box("wallet.history"), black_box(value)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Cache
// ============================================================================

fn bench_cache(c: &mut Criterion) {
    let cache = ResponseCache::new();
    for i in 0..1024 {
        cache.set(format!("wallet.item:{{\"id\":{i}}}"), json!({"id": i}));
    }

    let mut group = c.benchmark_group("cache");

    group.bench_function("hit", |b| {
        b.iter(|| cache.get(black_box("wallet.item:{\"id\":512}"), Duration::from_secs(60)));
    });

    group.bench_function("stale", |b| {
        b.iter(|| cache.get(black_box("wallet.item:{\"id\":512}"), Duration::ZERO));
    });

    group.bench_function("miss", |b| {
        b.iter(|| cache.get(black_box("wallet.absent:{}"), Duration::from_secs(60)));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Deduplicated Commands
// ============================================================================

struct InstantBridge;

#[async_trait]
impl LocalBridge for InstantBridge {
    async fn invoke(&self, _command: &str, payload: Value) -> wallet_transport::Result<Value> {
        tokio::task::yield_now().await;
        Ok(payload)
    }
}

fn bench_dedup(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let service = CommandService::builder()
        .config(TransportConfig::local())
        .bridge(Arc::new(InstantBridge))
        .build()
        .expect("service");

    let mut group = c.benchmark_group("dedup");

    for &calls in CONCURRENT_CALLS {
        group.bench_with_input(BenchmarkId::new("calls", calls), &calls, |b, &calls| {
            b.to_async(&rt).iter(|| {
                let service = service.clone();
                async move {
                    let replies = futures_util::future::join_all(
                        (0..calls).map(|_| service.command("wallet.balance", json!({}))),
                    )
                    .await;
                    black_box(replies)
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_command_key, bench_cache, bench_dedup);
criterion_main!(benches);

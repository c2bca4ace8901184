//! Overhead of running a full hedge race under increasing concurrency.
//!
//! Grounded on `original_source/tools/benchmark.py` (sweep over an
//! increasing number of concurrent requests against one URL) translated onto
//! `criterion`, in the style of `benches/happy_path_overhead.rs`
//! (`Criterion`, `criterion_group!`, `b.to_async(&runtime).iter(...)`,
//! `black_box`).

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hedge_proxy::coordinator::{HedgeCoordinator, SmartRequest};
use hedge_proxy::fetcher::UpstreamClient;

/// Always answers immediately with a minimal valid JSON body, so the
/// measured cost is the coordinator's own bookkeeping (spawns, channel,
/// select loop), not simulated network latency.
struct InstantUpstream;

#[async_trait::async_trait]
impl UpstreamClient for InstantUpstream {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<(u16, Bytes), String> {
        Ok((200, Bytes::from_static(b"{\"time\":0}")))
    }
}

fn bench_single_hedge(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let coordinator = Arc::new(HedgeCoordinator::new(
        Arc::new(InstantUpstream) as Arc<dyn UpstreamClient>,
        Duration::from_secs(1),
    ));

    c.bench_function("single_hedge_race_fast_primary", |b| {
        b.to_async(&runtime).iter(|| {
            let coordinator = Arc::clone(&coordinator);
            async move {
                let result = coordinator
                    .run(SmartRequest {
                        upstream_url: black_box("http://unused".to_string()),
                        deadline_ms: None,
                    })
                    .await;
                black_box(result)
            }
        });
    });
}

/// Mirrors `original_source/tools/benchmark.py::run`'s sweep: increasing
/// numbers of concurrent requests issued against the same coordinator.
fn bench_concurrency_sweep(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let coordinator = Arc::new(HedgeCoordinator::new(
        Arc::new(InstantUpstream) as Arc<dyn UpstreamClient>,
        Duration::from_secs(1),
    ));

    let mut group = c.benchmark_group("concurrent_hedge_races");
    for concurrency in [1usize, 10, 50, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &concurrency| {
                b.to_async(&runtime).iter(|| {
                    let coordinator = Arc::clone(&coordinator);
                    async move {
                        let mut handles = Vec::with_capacity(concurrency);
                        for _ in 0..concurrency {
                            let coordinator = Arc::clone(&coordinator);
                            handles.push(tokio::spawn(async move {
                                coordinator
                                    .run(SmartRequest {
                                        upstream_url: "http://unused".to_string(),
                                        deadline_ms: None,
                                    })
                                    .await
                            }));
                        }
                        for handle in handles {
                            black_box(handle.await.unwrap());
                        }
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_single_hedge, bench_concurrency_sweep);
criterion_main!(benches);

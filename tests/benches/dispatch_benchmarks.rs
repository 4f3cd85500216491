//! # Dispatch Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | `Dispatcher::dispatch` read | read lock + status rendering |
//! | `Dispatcher::dispatch` write | write lock + pre-write copy + rollback check |
//! | envelope decode | request parsing on the service side |
//! | full round trip | caller → in-process broker → dispatcher → caller |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};
use shared_bus::Broker;
use shared_types::{Method, RequestEnvelope};
use std::sync::Arc;
use std::time::Duration;
use vc_02_registry::InMemoryTunnelDriver;
use vc_03_dispatcher::Dispatcher;
use vc_tests::harness::{object, start_client, start_service, OPENVPN_CONFIG};

fn populated(instances: usize) -> Dispatcher {
    let dispatcher = Dispatcher::new("bench-vpn", Arc::new(InMemoryTunnelDriver::new()));
    for i in 0..instances {
        let params = object(json!({
            "instance_name": format!("vpn{i}"),
            "config_content": OPENVPN_CONFIG,
            "auto_start": i % 2 == 0,
        }));
        dispatcher.dispatch(Method::Add, &params);
    }
    dispatcher
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for size in [10, 100, 1000] {
        let dispatcher = populated(size);
        let list = Map::new();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("list", size), &size, |b, _| {
            b.iter(|| black_box(dispatcher.dispatch(Method::List, &list)))
        });
    }

    let dispatcher = populated(100);
    let route = object(json!({"id": "bench", "destination": "10.0.0.0/8"}));
    let delete = object(json!({"id": "bench"}));
    group.bench_function("add_delete_custom_route", |b| {
        b.iter(|| {
            dispatcher.dispatch(Method::AddCustomRoute, &route);
            black_box(dispatcher.dispatch(Method::DeleteCustomRoute, &delete))
        })
    });

    let missing = object(json!({"instance_name": "ghost"}));
    group.bench_function("failed_write", |b| {
        b.iter(|| black_box(dispatcher.dispatch(Method::Start, &missing)))
    });

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let params = object(json!({"instance_name": "vpn0", "config_content": OPENVPN_CONFIG}));
    let payload = RequestEnvelope::new("bench-1", "add", params).to_vec().unwrap_or_default();

    c.bench_function("envelope_decode", |b| {
        b.iter(|| black_box(RequestEnvelope::from_slice(black_box(&payload))))
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_multi_thread().enable_all().build() else {
        return;
    };
    let broker = Broker::new();
    let (_service, client) = runtime.block_on(async {
        let service = start_service(&broker, "bench-vpn").await;
        let client = start_client(&broker, "bench-caller", "bench-vpn", Duration::from_secs(5)).await;
        (service, client)
    });

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("stats", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let result: Value = client.call("stats", Map::new(), None).await.unwrap_or_default();
                black_box(result)
            })
        })
    });
    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_envelope, bench_round_trip);
criterion_main!(benches);

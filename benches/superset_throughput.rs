//! Merged-plan vs. isolated evaluation throughput
//!
//! Measures per-event cost of evaluating N subscriptions that share most of
//! their paths, either one query at a time or through a single merged plan.
//!
//! Run benchmarks: `cargo bench --bench superset_throughput`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mql::{Query, Value, build_superset_plan};
use rand::SeedableRng;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde_json::json;
use std::hint::black_box;

const QUERY_SHAPES: &[&str] = &[
    "select e['version'], e[^'result'] from stream",
    "select e['version'] from stream where e['errors'][*]['code'] == 'err123'",
    "select e['errors'][0]['code'] from stream",
    "select e['events'][*]['path'] from stream where e['events'][*]['latency'] > 450.0",
    "select * from stream where result_a ==~ /.*CC.*/",
    "select e['events'][-1] as last from stream where not e['events'][-1]['success']",
    "select version, timestamp from stream where version != '2.0.0' and e['events'][*]['success']",
];

fn generate_queries(count: usize) -> Vec<Query> {
    (0..count)
        .map(|i| {
            let text = QUERY_SHAPES[i % QUERY_SHAPES.len()];
            Query::new(format!("sub-{}", i), text).expect("benchmark query should parse")
        })
        .collect()
}

/// Generate events shaped like the ones the query shapes expect
fn generate_events(count: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..count)
        .map(|_| {
            let events: Vec<serde_json::Value> = (0..rng.random_range(1..8))
                .map(|i| {
                    json!({
                        "path": format!("/path/{}", i),
                        "success": rng.random_bool(0.8),
                        "latency": rng.random_range(10.0..800.0)
                    })
                })
                .collect();
            let result_a = if rng.random_bool(0.5) { "SUCCESS" } else { "FAILURE" };
            Value::from(json!({
                "events": events,
                "errors": {
                    "err1": { "message": "first", "code": "err123" },
                    "err2": { "message": "second", "code": format!("err{}", rng.random_range(100..999)) }
                },
                "version": "1.0.1",
                "timestamp": "12345678910111213",
                "result_a": result_a,
                "result_b": "SUCCESS"
            }))
        })
        .collect()
}

fn benchmark_isolated_vs_merged(c: &mut Criterion) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut group = c.benchmark_group("superset_throughput");
    let events = generate_events(64);

    for count in [1, 8, 64, 256] {
        let queries = generate_queries(count);
        let plan = build_superset_plan(&queries);
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(BenchmarkId::new("isolated", count), &count, |b, _| {
            b.iter(|| {
                for event in &events {
                    for query in &queries {
                        if query.matches(event) {
                            black_box(query.project(event));
                        }
                    }
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("merged", count), &count, |b, _| {
            b.iter(|| {
                for event in &events {
                    black_box(plan.evaluate(event));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_superset_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("superset_projection");
    let events = generate_events(64);
    let queries: Vec<Query> = generate_queries(QUERY_SHAPES.len())
        .into_iter()
        .filter(|q| !q.statement().selects_all())
        .collect();
    let plan = build_superset_plan(&queries);

    group.bench_function("union_of_paths", |b| {
        b.iter(|| {
            for event in &events {
                black_box(plan.superset_projection(event));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_isolated_vs_merged, benchmark_superset_projection);
criterion_main!(benches);

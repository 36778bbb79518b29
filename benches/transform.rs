//! Transformer benchmark suite
//!
//! Measures the derivations behind each report view over generated datasets:
//! - Scenario filtering and signature normalization
//! - Un-cached freshness-proof reconstruction
//! - Full proof-size and optimization views

use ads_proof_report::config::ReportConfig;
use ads_proof_report::dataset::{generate_rows, GenerateConfig};
use ads_proof_report::report;
use ads_proof_report::transform::{
    adjusted_total_proof_size, filter_by_scenario, optimization_delta, percentage_ads_updated,
    SignatureOverhead,
};
use ads_proof_report::Scenario;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark the individual transformer operations at several dataset sizes
fn bench_transform_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let overhead = SignatureOverhead::for_signatures(71, 3).unwrap();

    for batches in [10u64, 100, 1_000] {
        let rows = generate_rows(&GenerateConfig {
            batches,
            ..Default::default()
        })
        .unwrap();

        group.bench_with_input(BenchmarkId::new("filter", batches), &rows, |bencher, rows| {
            bencher.iter(|| filter_by_scenario(black_box(rows), Scenario::Transferred.selector()))
        });

        let selected = filter_by_scenario(&rows, Scenario::Loaned.selector()).unwrap();

        group.bench_with_input(
            BenchmarkId::new("adjusted_total", batches),
            &selected,
            |bencher, selected| {
                bencher.iter(|| adjusted_total_proof_size(black_box(selected), overhead))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("optimization_delta", batches),
            &selected,
            |bencher, selected| bencher.iter(|| optimization_delta(black_box(selected), overhead)),
        );

        group.bench_with_input(
            BenchmarkId::new("percentage_ads_updated", batches),
            &rows,
            |bencher, rows| bencher.iter(|| percentage_ads_updated(black_box(rows))),
        );
    }

    group.finish();
}

/// Benchmark complete views, as run by the reporting entry point
fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("views");
    let cfg = ReportConfig::default();
    let rows = generate_rows(&GenerateConfig {
        batches: 500,
        ..Default::default()
    })
    .unwrap();

    group.bench_function("proof_sizes", |bencher| {
        bencher.iter(|| report::proof_sizes(black_box(&rows), &cfg))
    });
    group.bench_function("optimization_impact", |bencher| {
        bencher.iter(|| report::optimization_impact(black_box(&rows), &cfg))
    });
    group.bench_function("breakdowns", |bencher| {
        bencher.iter(|| report::breakdowns(black_box(&rows), &cfg))
    });

    group.finish();
}

criterion_group!(benches, bench_transform_ops, bench_views);
criterion_main!(benches);

//! Benchmarks for the per-measurement hot path: summary accumulation and formatting

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http_perftest::{
    models::Measurement,
    output::{JsonFormatter, OutputFormatter, TsvFormatter},
    stats::RunningSummary,
    types::Target,
};
use std::time::Duration;

fn sample_measurements(count: usize) -> Vec<Measurement> {
    let start = Utc::now();
    (0..count)
        .map(|i| {
            let i = i as u64;
            Measurement::new("https://example.com/", start + chrono::Duration::seconds(i as i64 * 10))
                .with_phases(
                    Duration::from_micros(1_000 + i % 500),
                    Duration::from_micros(5_000 + i % 1_000),
                    Duration::from_micros(20_000 + i % 3_000),
                    Duration::from_micros(40_000 + i % 7_000),
                    Duration::from_micros(500 + i % 200),
                )
                .with_response(200, 1_024 + i % 64)
                .with_remote_address("93.184.216.34")
        })
        .collect()
}

fn bench_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("running_summary");
    for &size in &[10usize, 1_000, 10_000] {
        let measurements = sample_measurements(size);
        group.bench_with_input(BenchmarkId::new("record_and_report", size), &measurements, |b, ms| {
            b.iter(|| {
                let mut summary = RunningSummary::new();
                for m in ms {
                    summary.record(black_box(m));
                }
                black_box(summary.report(Utc::now()))
            })
        });
    }
    group.finish();
}

fn bench_formatters(c: &mut Criterion) {
    let measurement = &sample_measurements(1)[0];
    let mut group = c.benchmark_group("formatters");
    group.bench_function("tsv_row", |b| {
        b.iter(|| TsvFormatter.format_measurement(black_box(measurement), "lab"))
    });
    group.bench_function("json_record", |b| {
        b.iter(|| JsonFormatter.format_measurement(black_box(measurement), "lab"))
    });
    group.finish();
}

fn bench_target_parsing(c: &mut Criterion) {
    c.bench_function("target_parse", |b| {
        b.iter(|| Target::parse(black_box("https://example.com:8443/health?probe=1")))
    });
}

criterion_group!(benches, bench_summary, bench_formatters, bench_target_parsing);
criterion_main!(benches);

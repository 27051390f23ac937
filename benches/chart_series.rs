//! Chart pipeline benchmark suite
//!
//! - Loading a metric series from a summary CSV
//! - Building and rendering a two-series comparison chart to SVG

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhdh_perf::charts::{self, ChartInput, ChartOptions};
use rhdh_perf::dataset;
use rhdh_perf::schema::MetricsMetadata;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const METRICS: [&str; 4] = [
    "RHDH_HTTP_Requests_Average",
    "RHDH_CPU_Avg",
    "RHDH_Memory_Avg",
    "RHDH_DB_Storage_Used",
];

/// Deterministic summary CSV with `rows` rows of the bench metrics.
fn write_summary(dir: &TempDir, name: &str, rows: usize, seed: u64) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = format!("RBAC_POLICY_SIZE,{}\n", METRICS.join(","));
    for i in 0..rows {
        let _ = write!(csv, "{}", (i + 1) * 100);
        for metric in METRICS {
            let value: f64 = if dataset::is_memory_metric(metric) {
                rng.gen_range(2.0e8..8.0e8)
            } else {
                rng.gen_range(0.0..1_000.0)
            };
            let _ = write!(csv, ",{value:.3}");
        }
        csv.push('\n');
    }
    let path = dir.path().join(format!("{name}.csv"));
    fs::write(&path, csv).expect("write summary");
    path
}

fn bench_load_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_series");
    let dir = TempDir::new().expect("tempdir");

    for rows in [10usize, 100, 1_000] {
        let path = write_summary(&dir, &format!("summary-{rows}"), rows, 7);
        group.bench_with_input(BenchmarkId::new("memory_metric", rows), &path, |bencher, path| {
            bencher.iter(|| {
                let points = dataset::load_series(black_box(path), "RBAC_POLICY_SIZE", "RHDH_Memory_Avg")
                    .expect("series");
                black_box(points)
            })
        });
        group.bench_with_input(BenchmarkId::new("detect_columns", rows), &path, |bencher, path| {
            bencher.iter(|| black_box(dataset::detect_numeric_columns(black_box(path), "RBAC_POLICY_SIZE")))
        });
    }

    group.finish();
}

fn bench_render_svg(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let dir = TempDir::new().expect("tempdir");
    let metadata = MetricsMetadata::default();

    for rows in [10usize, 100] {
        let inputs = vec![
            ChartInput {
                path: write_summary(&dir, &format!("previous-{rows}"), rows, 1),
                label: "1.4".to_string(),
            },
            ChartInput {
                path: write_summary(&dir, &format!("current-{rows}"), rows, 2),
                label: "1.5".to_string(),
            },
        ];

        for annotate_values in [false, true] {
            let options = ChartOptions {
                annotate_values,
                ..ChartOptions::default()
            };
            let id = if annotate_values { "annotated" } else { "plain" };
            group.bench_with_input(BenchmarkId::new(id, rows), &inputs, |bencher, inputs| {
                bencher.iter(|| {
                    let generated = charts::generate_all(&[METRICS[0].to_string()], inputs, &options, &metadata);
                    black_box(generated)
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_load_series, bench_render_svg);
criterion_main!(benches);

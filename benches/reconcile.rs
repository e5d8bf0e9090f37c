//! Benchmarks for station reconciliation

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use trip_reconciler::config::ReconcileConfig;
use trip_reconciler::models::{BikeType, RawTripRecord, RiderType};
use trip_reconciler::reconcile::{detect_all_conflicts, reconcile};

const NAMES: &[&str] = &[
    "Canal St at Causeway St",
    "Tremont St at Court St",
    "Canal St\u{a0}at\u{a0}Causeway\u{a0}St",
    "Canal St. at Causeway St.",
];

/// Synthetic batch: 200 stations, a quarter of A32046 rows mislabelled
fn synthetic_batch(rows: usize) -> Vec<RawTripRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 9, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    (0..rows)
        .map(|i| {
            let (start_id, start_name) = if i % 10 == 0 {
                ("A32046".to_string(), NAMES[i / 10 % NAMES.len()].to_string())
            } else {
                let station = i % 200;
                (format!("B{:05}", station), format!("Station {}", station))
            };
            let end_station = (i * 7) % 200;
            let started_at = start + chrono::TimeDelta::seconds(i as i64);

            RawTripRecord {
                started_at: Some(started_at),
                ended_at: Some(started_at + chrono::TimeDelta::minutes(12)),
                start_station_id: Some(start_id),
                start_station_name: Some(start_name),
                end_station_id: Some(if i % 97 == 0 {
                    "S32020".to_string()
                } else {
                    format!("B{:05}", end_station)
                }),
                end_station_name: Some(format!("Station {}", end_station)),
                rider_type: Some(RiderType::Member),
                bike_type: Some(BikeType::Electric),
                source_file: 0,
                source_row: i,
            }
        })
        .collect()
}

fn benchmark_reconcile(c: &mut Criterion) {
    let config = ReconcileConfig::default();

    let mut group = c.benchmark_group("reconcile_by_rows");
    for rows in [1_000usize, 10_000, 100_000] {
        let batch = synthetic_batch(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &batch, |b, batch| {
            b.iter(|| reconcile(black_box(&config), batch.clone()))
        });
    }
    group.finish();
}

fn benchmark_conflict_detection(c: &mut Criterion) {
    let cleaned = reconcile(&ReconcileConfig::default().with_max_passes(0), synthetic_batch(50_000))
        .expect("synthetic batch reconciles");

    c.bench_function("detect_all_conflicts_50k", |b| {
        b.iter(|| detect_all_conflicts(black_box(&cleaned.records)))
    });
}

criterion_group!(benches, benchmark_reconcile, benchmark_conflict_detection);
criterion_main!(benches);

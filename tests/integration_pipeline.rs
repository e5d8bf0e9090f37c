//! End-to-end tests for the reconciliation pipeline
//!
//! These tests write realistic monthly trip files to a temporary directory,
//! run the full processor and check the cleaned dataset and report.

use polars::prelude::{ParquetReader, SerReader};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use trip_reconciler::config::ReconcileConfig;
use trip_reconciler::processor::DatasetProcessor;
use trip_reconciler::reconcile::{CorrectionRule, ReportStatus};

const HEADER: &str = "ride_id,rideable_type,started_at,ended_at,start_station_name,start_station_id,end_station_name,end_station_id,member_casual";

fn write_month(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    fs::write(&path, content).unwrap();
    path
}

fn trip(id: usize, start: (&str, &str), end: (&str, &str), minute: usize) -> String {
    format!(
        "T{id:04},classic_bike,2024-09-01 {:02}:{:02}:00,2024-09-01 {:02}:{:02}:00,{},{},{},{},member",
        8 + minute / 60,
        minute % 60,
        8 + (minute + 14) / 60,
        (minute + 14) % 60,
        start.1,
        start.0,
        end.1,
        end.0,
    )
}

/// A September batch with every known defect of the Boston feed
fn create_september(dir: &Path) {
    let canal = ("A32046", "Canal St at Causeway St");
    let canal_nbsp = ("A32046", "Canal St\u{a0}at\u{a0}Causeway\u{a0}St");
    let tremont_mislabel = ("A32046", "Tremont St at Court St");
    let swan = ("M32061", "Swan Pl. at Minuteman Bikeway");
    let boylston = ("D32005", "Boylston St at Berkeley St");
    let mobile = ("S32020", "Mobile Temporary Station");

    let mut first_half = Vec::new();
    for i in 0..30 {
        let start = match i % 5 {
            0 => tremont_mislabel,
            1 => canal_nbsp,
            2 => swan,
            _ => canal,
        };
        first_half.push(trip(i, start, boylston, i));
    }
    first_half.push(trip(100, mobile, canal, 40));
    first_half.push(trip(101, boylston, mobile, 41));
    first_half.push(trip(102, boylston, canal_nbsp, 42));

    let second_half = vec![
        trip(200, canal, boylston, 5),
        "T0201,electric_bike,2024-09-01 09:00:00,2024-09-01 09:12:00,,,Boylston St at Berkeley St,D32005,casual".to_string(),
    ];

    write_month(dir, "202409a-tripdata.csv", &first_half);
    write_month(dir, "202409b-tripdata.csv", &second_half);
}

#[tokio::test]
async fn test_end_to_end_reconciliation() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("bluebikes");
    create_september(&input);
    let output = temp_dir.path().join("clean").join("september.parquet");

    let mut processor = DatasetProcessor::new(input, Some(output.clone()))
        .unwrap()
        .with_quiet(true);
    let outcome = processor.process().await.unwrap();
    let report = &outcome.report;

    assert_eq!(report.rows_in, 35);
    assert_eq!(report.rows_dropped_missing_fields, 1);
    assert_eq!(report.rows_dropped_invalid_station["S32020"].start, 1);
    assert_eq!(report.rows_dropped_invalid_station["S32020"].end, 1);
    assert_eq!(report.rows_out, 32);
    assert_eq!(report.status, ReportStatus::Clean);
    assert!(report.residual_conflicts.is_empty());

    let file = fs::File::open(&output).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), 32);

    let names = df.column("start_station_name").unwrap().str().unwrap();
    for name in names.into_iter().flatten() {
        assert!(!name.contains('\u{a0}'));
        assert_ne!(name, "Tremont St at Court St");
        assert_ne!(name, "Swan Pl. at Minuteman Bikeway");
    }

    let report_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("clean").join("september.report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report_json["rows_in"], 35);
    assert_eq!(report_json["rows_dropped_invalid_station"]["S32020"]["start"], 1);
    assert!(report_json["rules_applied"].as_array().unwrap().len() > 3);
    assert_eq!(report_json["residual_conflicts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_output_independent_of_file_layout() {
    let temp_dir = TempDir::new().unwrap();
    let rows: Vec<String> = (0..12)
        .map(|i| {
            let start = if i % 2 == 0 {
                ("A32046", "Tremont St at Court St")
            } else {
                ("A32046", "Canal St at Causeway St")
            };
            trip(i, start, ("D32005", "Boylston St at Berkeley St"), i * 3)
        })
        .collect();

    let single = temp_dir.path().join("single");
    write_month(&single, "all.csv", &rows);

    let split = temp_dir.path().join("split");
    write_month(&split, "b.csv", &rows[..5]);
    write_month(&split, "a.csv", &rows[5..]);

    let mut outputs = Vec::new();
    for (input, name) in [(single, "single.csv"), (split, "split.csv")] {
        let output = temp_dir.path().join(name);
        let config = ReconcileConfig::default()
            .with_output_format(trip_reconciler::config::OutputFormat::Csv)
            .with_max_concurrent_files(4);
        let mut processor = DatasetProcessor::new(input, Some(output.clone()))
            .unwrap()
            .with_config(config)
            .with_quiet(true);
        processor.process().await.unwrap();
        outputs.push(fs::read_to_string(output).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_custom_rules_leave_residual_conflict() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("bluebikes");
    create_september(&input);

    // Only the Tremont mislabel is handled; the encoding variant stays
    let config = ReconcileConfig::default()
        .with_rules(vec![CorrectionRule::conditional_reassign(
            "A32046",
            "Tremont St at Court St",
            "Canal St at Causeway St",
        )])
        .with_max_passes(2);

    let mut processor =
        DatasetProcessor::new(input, Some(temp_dir.path().join("partial.parquet")))
            .unwrap()
            .with_config(config)
            .with_quiet(true);
    let outcome = processor.process().await.unwrap();

    assert!(!outcome.is_clean());
    assert_eq!(outcome.report.passes_run, 2);
    assert!(
        outcome
            .report
            .residual_conflicts
            .iter()
            .any(|c| c.key == "A32046")
    );
    // Partial results are still written
    assert_eq!(outcome.stats.rows_written, 32);
}

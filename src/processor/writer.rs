//! Output writing for cleaned trip datasets
//!
//! Converts the cleaned records into a polars DataFrame and writes it as
//! Parquet or CSV, then writes the cleaning report as pretty JSON.

use crate::config::{OutputConfig, OutputFormat};
use crate::constants::{
    BIKE_TYPE, END_STATION_ID, END_STATION_NAME, ENDED_AT, REPORT_SUFFIX, RIDER_TYPE,
    START_STATION_ID, START_STATION_NAME, STARTED_AT, TRIP_DURATION,
};
use crate::error::{ReconcileError, Result};
use crate::models::TripRecord;
use crate::reconcile::report::CleaningReport;

use chrono::NaiveDateTime;
use polars::prelude::{
    Column, CsvWriter, DataFrame, DataType, ParquetWriter as PolarsParquetWriter, SerWriter,
    TimeUnit,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default report location for a dataset output path
pub fn default_report_path(output_path: &Path) -> PathBuf {
    output_path.with_extension(REPORT_SUFFIX)
}

fn to_millis(value: Option<NaiveDateTime>) -> Option<i64> {
    value.map(|dt| dt.and_utc().timestamp_millis())
}

fn datetime_column(name: &str, values: Vec<Option<i64>>) -> Result<Column> {
    Ok(Column::new(name.into(), values)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

fn string_column(name: &str, records: &[TripRecord], field: impl Fn(&TripRecord) -> &String) -> Column {
    let values: Vec<&str> = records.iter().map(|r| field(r).as_str()).collect();
    Column::new(name.into(), values)
}

/// Build the output frame; column order is fixed
pub fn records_to_dataframe(records: &[TripRecord]) -> Result<DataFrame> {
    let started_at: Vec<Option<i64>> = records.iter().map(|r| to_millis(r.started_at)).collect();
    let ended_at: Vec<Option<i64>> = records.iter().map(|r| to_millis(r.ended_at)).collect();
    let columns = vec![
        datetime_column(STARTED_AT, started_at)?,
        datetime_column(ENDED_AT, ended_at)?,
        string_column(START_STATION_ID, records, |r| &r.start_station_id),
        string_column(START_STATION_NAME, records, |r| &r.start_station_name),
        string_column(END_STATION_ID, records, |r| &r.end_station_id),
        string_column(END_STATION_NAME, records, |r| &r.end_station_name),
        Column::new(
            RIDER_TYPE.into(),
            records
                .iter()
                .map(|r| r.rider_type.map(|t| t.as_str().to_string()))
                .collect::<Vec<Option<String>>>(),
        ),
        Column::new(
            BIKE_TYPE.into(),
            records
                .iter()
                .map(|r| r.bike_type.as_ref().map(|t| t.as_str().to_string()))
                .collect::<Vec<Option<String>>>(),
        ),
        Column::new(
            TRIP_DURATION.into(),
            records
                .iter()
                .map(TripRecord::duration_seconds)
                .collect::<Vec<Option<i64>>>(),
        ),
    ];

    Ok(DataFrame::new(columns)?)
}

/// Writes the cleaned dataset and its report
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    output_path: PathBuf,
    config: OutputConfig,
}

impl DatasetWriter {
    pub fn new(output_path: PathBuf, config: OutputConfig) -> Self {
        Self {
            output_path,
            config,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Configured report path, or the default sibling of the output
    pub fn report_path(&self) -> PathBuf {
        self.config
            .report_path
            .clone()
            .unwrap_or_else(|| default_report_path(&self.output_path))
    }

    /// Write the records; returns the number of rows written
    pub fn write_dataset(&self, records: &[TripRecord]) -> Result<usize> {
        let mut df = records_to_dataframe(records)?;

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = std::fs::File::create(&self.output_path)?;
        match self.config.format {
            OutputFormat::Parquet => {
                PolarsParquetWriter::new(file)
                    .with_compression(self.config.compression.to_polars_compression())
                    .finish(&mut df)
                    .map_err(|e| ReconcileError::ProcessingFailed {
                        path: self.output_path.clone(),
                        reason: format!("Failed to write parquet: {}", e),
                    })?;
            }
            OutputFormat::Csv => {
                CsvWriter::new(&mut file)
                    .include_header(true)
                    .finish(&mut df)
                    .map_err(|e| ReconcileError::ProcessingFailed {
                        path: self.output_path.clone(),
                        reason: format!("Failed to write csv: {}", e),
                    })?;
            }
        }

        debug!(
            "Wrote {} rows to {} ({:?})",
            df.height(),
            self.output_path.display(),
            self.config.format
        );
        Ok(df.height())
    }

    /// Write the report as pretty JSON; returns its path
    pub fn write_report(&self, report: &CleaningReport) -> Result<PathBuf> {
        let path = self.report_path();
        write_report(report, &path)?;
        Ok(path)
    }
}

/// Serialize a report to `path`
pub fn write_report(report: &CleaningReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    debug!("Wrote report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgorithm;
    use crate::models::{BikeType, RawTripRecord, RiderType};
    use chrono::NaiveDate;
    use polars::prelude::{CsvReadOptions, ParquetReader, SerReader};
    use tempfile::TempDir;

    fn record(minute: u32, end_minute: u32) -> TripRecord {
        let at = |m| {
            NaiveDate::from_ymd_opt(2024, 9, 1)
                .unwrap()
                .and_hms_opt(8, m, 0)
                .unwrap()
        };
        TripRecord::from_raw(RawTripRecord {
            started_at: Some(at(minute)),
            ended_at: Some(at(end_minute)),
            start_station_id: Some("A32046".to_string()),
            start_station_name: Some("Canal St at Causeway St".to_string()),
            end_station_id: Some("D32005".to_string()),
            end_station_name: Some("Boylston St at Berkeley St".to_string()),
            rider_type: Some(RiderType::Casual),
            bike_type: Some(BikeType::Electric),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_dataframe_shape_and_types() {
        let records = vec![record(0, 10), record(5, 2)];
        let df = records_to_dataframe(&records).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 9);
        assert_eq!(
            df.column(STARTED_AT).unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );

        let durations = df.column(TRIP_DURATION).unwrap();
        assert_eq!(durations.null_count(), 1);
    }

    #[test]
    fn test_write_parquet_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out").join("trips.parquet");
        let writer = DatasetWriter::new(
            output.clone(),
            OutputConfig {
                compression: CompressionAlgorithm::Zstd,
                ..Default::default()
            },
        );

        let rows = writer.write_dataset(&[record(0, 10)]).unwrap();
        assert_eq!(rows, 1);

        let file = std::fs::File::open(&output).unwrap();
        let df = ParquetReader::new(file).finish().unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.column(START_STATION_NAME).is_ok());
    }

    #[test]
    fn test_write_csv() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("trips.csv");
        let writer = DatasetWriter::new(
            output.clone(),
            OutputConfig {
                format: OutputFormat::Csv,
                ..Default::default()
            },
        );

        writer.write_dataset(&[record(0, 10), record(1, 4)]).unwrap();

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(output))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_report_path_defaults_next_to_output() {
        let writer = DatasetWriter::new(PathBuf::from("/data/trips.parquet"), OutputConfig::default());
        assert_eq!(
            writer.report_path(),
            PathBuf::from("/data/trips.report.json")
        );
    }

    #[test]
    fn test_write_report_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        let report = CleaningReport::new(7, &[], 5);

        write_report(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows_in"], 7);
        assert_eq!(value["max_passes"], 5);
    }
}

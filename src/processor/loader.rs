//! Concurrent trip file loading
//!
//! Files are parsed on the blocking pool with bounded parallelism. The
//! concurrency limit is halved when the host is under memory pressure.
//! Parsed rows are merged into one batch ordered by start time, then by
//! file and row position, so the merged order never depends on which
//! file finished first.

use crate::config::IngestConfig;
use crate::constants::{
    BIKE_TYPE, END_STATION_ID, END_STATION_NAME, ENDED_AT, RIDER_TYPE, START_STATION_ID,
    START_STATION_NAME, STARTED_AT,
};
use crate::error::{ReconcileError, Result};
use crate::models::{BikeType, RawTripRecord, RiderType};
use crate::reconcile::diagnostics::TimestampCensus;
use crate::schema::ColumnMapping;

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::{Mutex, Semaphore};
use tokio::task;
use tracing::{debug, error, warn};

/// Rows and timestamp outcomes from one file
#[derive(Debug, Default)]
pub struct FileLoad {
    pub records: Vec<RawTripRecord>,
    pub timestamps: TimestampCensus,
}

/// Merged result of loading every discovered file
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub records: Vec<RawTripRecord>,
    pub timestamps: TimestampCensus,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Failed files with the reason, in discovery order
    pub failures: Vec<(PathBuf, String)>,
}

fn parse_timestamp(
    value: Option<&str>,
    format: &str,
    census: &mut TimestampCensus,
) -> Option<NaiveDateTime> {
    let parsed = value.and_then(|v| NaiveDateTime::parse_from_str(v, format).ok());
    census.observe(value, parsed.is_some());
    parsed
}

/// Parse one trip CSV file into raw records
///
/// Unparseable timestamps become `None` and are counted; a missing
/// required column fails the whole file.
pub fn parse_trip_file(path: &Path, file_index: usize, timestamp_format: &str) -> Result<FileLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ReconcileError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let headers = reader
        .headers()
        .map_err(|source| ReconcileError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let mapping = ColumnMapping::analyze(&headers, path)?;

    let mut load = FileLoad::default();

    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|source| ReconcileError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let field = |column: &str| mapping.field(&record, column);

        let started_at = parse_timestamp(field(STARTED_AT), timestamp_format, &mut load.timestamps);
        let ended_at = parse_timestamp(field(ENDED_AT), timestamp_format, &mut load.timestamps);

        load.records.push(RawTripRecord {
            started_at,
            ended_at,
            start_station_id: field(START_STATION_ID).map(str::to_string),
            start_station_name: field(START_STATION_NAME).map(str::to_string),
            end_station_id: field(END_STATION_ID).map(str::to_string),
            end_station_name: field(END_STATION_NAME).map(str::to_string),
            rider_type: field(RIDER_TYPE).and_then(RiderType::parse),
            bike_type: field(BIKE_TYPE).and_then(BikeType::parse),
            source_file: file_index,
            source_row: row,
        });
    }

    debug!("Parsed {} rows from {}", load.records.len(), path.display());
    Ok(load)
}

/// Loads trip files concurrently
#[derive(Debug)]
pub struct TripLoader {
    config: IngestConfig,
    system_monitor: Arc<Mutex<System>>,
    show_progress: bool,
}

impl TripLoader {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            system_monitor: Arc::new(Mutex::new(System::new())),
            show_progress: true,
        }
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Check if system is under memory pressure
    pub async fn check_memory_pressure(&self) -> bool {
        let mut system = self.system_monitor.lock().await;
        system.refresh_memory();

        let used_memory = system.used_memory() as f64;
        let total_memory = system.total_memory() as f64;

        if total_memory == 0.0 {
            return false;
        }

        let memory_usage = used_memory / total_memory;
        let is_pressure = memory_usage > self.config.memory_threshold;

        if is_pressure {
            debug!(
                "Memory pressure detected: {:.1}% usage (threshold: {:.1}%)",
                memory_usage * 100.0,
                self.config.memory_threshold * 100.0
            );
        }

        is_pressure
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Loading trip files");
        pb
    }

    /// Parse every file and merge the rows into one ordered batch
    pub async fn load_files(&self, files: &[PathBuf]) -> Result<LoadedBatch> {
        if files.is_empty() {
            return Ok(LoadedBatch::default());
        }

        let mut concurrent_limit = self.config.max_concurrent_files.min(files.len()).max(1);
        if self.check_memory_pressure().await {
            concurrent_limit = (concurrent_limit / 2).max(1);
            debug!(
                "Memory pressure detected, reducing concurrency to {}",
                concurrent_limit
            );
        }

        let semaphore = Arc::new(Semaphore::new(concurrent_limit));
        let pb = self.progress_bar(files.len());

        let mut results = stream::iter(files.iter().cloned().enumerate())
            .map(|(file_index, file_path)| {
                let sem = semaphore.clone();
                let pb = pb.clone();
                let format = self.config.timestamp_format.clone();
                async move {
                    let result = match sem.acquire().await {
                        Ok(_permit) => {
                            let path = file_path.clone();
                            task::spawn_blocking(move || parse_trip_file(&path, file_index, &format))
                                .await
                                .unwrap_or_else(|e| {
                                    Err(ReconcileError::processing_failed(
                                        &file_path,
                                        format!("parse task failed: {}", e),
                                    ))
                                })
                        }
                        Err(e) => Err(ReconcileError::processing_failed(&file_path, e.to_string())),
                    };

                    if let Some(file_name) = file_path.file_name() {
                        pb.set_message(format!("Loaded: {}", file_name.to_string_lossy()));
                    }
                    pb.inc(1);

                    (file_index, file_path, result)
                }
            })
            .buffer_unordered(concurrent_limit)
            .collect::<Vec<_>>()
            .await;

        pb.finish_and_clear();

        // Completion order is nondeterministic; fold in discovery order
        results.sort_by_key(|(file_index, _, _)| *file_index);

        let mut batch = LoadedBatch::default();
        for (_, file_path, result) in results {
            match result {
                Ok(load) => {
                    if load.records.is_empty() {
                        warn!("No rows in {}", file_path.display());
                    }
                    batch.files_processed += 1;
                    batch.timestamps.merge(&load.timestamps);
                    batch.records.extend(load.records);
                }
                Err(e) => {
                    error!("Failed to load {}: {}", file_path.display(), e);
                    batch.files_failed += 1;
                    batch.failures.push((file_path, e.to_string()));
                }
            }
        }

        batch.records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then(a.source_file.cmp(&b.source_file))
                .then(a.source_row.cmp(&b.source_row))
        });

        if batch.timestamps.unparseable > 0 {
            warn!(
                "{} timestamps did not match format '{}' and were left empty",
                batch.timestamps.unparseable, self.config.timestamp_format
            );
        }
        debug!(
            "Loaded {} rows from {} files ({} failed)",
            batch.records.len(),
            batch.files_processed,
            batch.files_failed
        );

        Ok(batch)
    }
}

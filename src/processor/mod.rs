//! Dataset processing engine.
//!
//! Drives a complete run over a trip dataset: file discovery, concurrent
//! loading, station reconciliation and output writing.

pub mod discovery;
pub mod loader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, loader::TripLoader, writer::DatasetWriter};

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::models::{ProcessingStats, TripRecord};
use crate::reconcile::{self, CleanedDataset, CleaningReport};

use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

/// Statistics and report of a finished run
#[derive(Debug)]
pub struct ProcessingOutcome {
    pub stats: ProcessingStats,
    pub report: CleaningReport,
}

impl ProcessingOutcome {
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
    }
}

/// Default output path: `<stem>-cleaned.<ext>` beside the input
pub fn default_output_path(input_path: &Path, config: &ReconcileConfig) -> PathBuf {
    let stem = input_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    input_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}-cleaned.{}", stem, config.output.format.extension()))
}

/// Main processor for trip dataset reconciliation
#[derive(Debug)]
pub struct DatasetProcessor {
    input_path: PathBuf,
    output_path: PathBuf,
    explicit_output: bool,
    config: ReconcileConfig,
    check_only: bool,
    quiet: bool,
}

impl DatasetProcessor {
    /// Create a new dataset processor
    pub fn new(input_path: PathBuf, output_path: Option<PathBuf>) -> Result<Self> {
        if !input_path.exists() {
            return Err(ReconcileError::InputNotFound { path: input_path });
        }

        let config = ReconcileConfig::default();
        let explicit_output = output_path.is_some();
        let output_path =
            output_path.unwrap_or_else(|| default_output_path(&input_path, &config));

        Ok(Self {
            input_path,
            output_path,
            explicit_output,
            config,
            check_only: false,
            quiet: false,
        })
    }

    /// Configure the processor
    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        if !self.explicit_output {
            self.output_path = default_output_path(&self.input_path, &config);
        }
        self.config = config;
        self
    }

    /// List conflicts without correcting or writing the dataset
    pub fn with_check_only(mut self, check_only: bool) -> Self {
        self.check_only = check_only;
        self
    }

    /// Suppress console output and progress bars
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Main processing entry point
    pub async fn process(&mut self) -> Result<ProcessingOutcome> {
        let start_time = Instant::now();
        self.config.validate()?;

        self.announce();

        // Step 1: Discover trip files
        self.say(format!("\n{}", "Discovering trip files...".bright_yellow()));
        let files = FileDiscovery::new(self.input_path.clone(), &self.config.ingest)
            .discover_csv_files()?;
        self.say(format!(
            "  {} {} trip files",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold()
        ));

        // Step 2: Load and merge
        self.say(format!("\n{}", "Loading trips...".bright_yellow()));
        let batch = TripLoader::new(self.config.ingest.clone())
            .with_progress(!self.quiet)
            .load_files(&files)
            .await?;

        if batch.files_processed == 0 && batch.files_failed > 0 {
            return Err(ReconcileError::processing_failed(
                &self.input_path,
                format!("all {} trip files failed to load", batch.files_failed),
            ));
        }

        let mut stats = ProcessingStats {
            files_processed: batch.files_processed,
            files_failed: batch.files_failed,
            rows_read: batch.records.len(),
            ..Default::default()
        };

        // Step 3: Reconcile station identities
        self.say(format!("\n{}", "Reconciling station identities...".bright_yellow()));
        let config = self.config.clone();
        let check_only = self.check_only;
        let records = batch.records;
        let mut dataset = task::spawn_blocking(move || {
            if check_only {
                reconcile::check(&config, records)
            } else {
                reconcile::reconcile(&config, records)
            }
        })
        .await
        .map_err(|e| {
            ReconcileError::processing_failed(&self.input_path, format!("reconcile task failed: {}", e))
        })??;
        dataset.report.timestamps = Some(batch.timestamps);

        // Step 4: Write outputs
        if self.check_only {
            if let Some(report_path) = self.config.output.report_path.clone() {
                writer::write_report(&dataset.report, &report_path)?;
                stats.report_path = Some(report_path);
            }
        } else {
            self.write_outputs(&dataset, &mut stats).await?;
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!("{}", dataset.report.summary());
        self.print_summary(&stats, &dataset.report);

        Ok(ProcessingOutcome {
            stats,
            report: dataset.report,
        })
    }

    async fn write_outputs(&self, dataset: &CleanedDataset, stats: &mut ProcessingStats) -> Result<()> {
        let writer = DatasetWriter::new(self.output_path.clone(), self.config.output.clone());

        let records = dataset.records.clone();
        let dataset_writer = writer.clone();
        stats.rows_written = task::spawn_blocking(move || dataset_writer.write_dataset(&records))
            .await
            .map_err(|e| {
                ReconcileError::processing_failed(&self.output_path, format!("write task failed: {}", e))
            })??;
        stats.output_path = Some(self.output_path.clone());

        for (pass, snapshot) in dataset.snapshots.iter().enumerate() {
            let path = self.snapshot_path(pass + 1);
            debug!("Writing pre-pass snapshot {} to {}", pass + 1, path.display());
            write_snapshot(&path, snapshot, &self.config)?;
        }

        stats.report_path = Some(writer.write_report(&dataset.report)?);
        Ok(())
    }

    /// `<output stem>.pass<N>.<ext>` for the record set entering pass N
    fn snapshot_path(&self, pass: usize) -> PathBuf {
        self.output_path.with_extension(format!(
            "pass{}.{}",
            pass,
            self.config.output.format.extension()
        ))
    }

    fn say(&self, line: String) {
        if !self.quiet {
            println!("{}", line);
        }
    }

    fn announce(&self) {
        let mode = if self.check_only { "check" } else { "reconcile" };
        self.say(format!(
            "{}",
            format!("Starting trip dataset {}", mode).bright_green().bold()
        ));
        self.say(format!("  {} {}", "Input:".bright_cyan(), self.input_path.display()));
        if !self.check_only {
            self.say(format!("  {} {}", "Output:".bright_cyan(), self.output_path.display()));
        }
    }

    fn print_summary(&self, stats: &ProcessingStats, report: &CleaningReport) {
        if self.quiet {
            return;
        }

        println!("\n{}", "Processing Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            stats.processing_time_ms.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files processed:".bright_cyan(),
            stats.files_processed.to_string().bright_white()
        );
        if stats.files_failed > 0 {
            println!(
                "  {} {}",
                "Files failed:".bright_red(),
                stats.files_failed.to_string().bright_red().bold()
            );
        }
        println!(
            "  {} {} -> {}",
            "Rows:".bright_cyan(),
            report.rows_in.to_string().bright_white(),
            report.rows_out.to_string().bright_white().bold()
        );
        println!(
            "  {} {}",
            "Dropped (missing fields):".bright_cyan(),
            report.rows_dropped_missing_fields
        );
        for (station_id, counts) in &report.rows_dropped_invalid_station {
            println!(
                "  {} {} (start: {}, end: {})",
                "Invalid station".bright_cyan(),
                station_id.bright_white(),
                counts.start,
                counts.end
            );
        }
        println!(
            "  {} {} over {} pass(es)",
            "Rows rewritten:".bright_cyan(),
            report.rows_rewritten().to_string().bright_white(),
            report.passes_run
        );
        println!(
            "  {} {} initial",
            "Conflicts:".bright_cyan(),
            report.initial_conflicts
        );

        if report.residual_conflicts.is_empty() {
            println!("  {}", "No residual station conflicts".bright_green());
        } else {
            println!(
                "  {} {}",
                "Residual conflicts:".bright_red(),
                report.residual_conflicts.len().to_string().bright_red().bold()
            );
            for conflict in &report.residual_conflicts {
                println!("    {}", conflict);
            }
        }

        if !report.encoding_artifacts.is_empty() {
            println!(
                "  {} {} station name spellings with non-ASCII whitespace",
                "Encoding artifacts:".bright_yellow(),
                report.encoding_artifacts.len()
            );
        }
        if let Some(path) = &stats.report_path {
            println!("  {} {}", "Report:".bright_cyan(), path.display());
        }
    }
}

fn write_snapshot(path: &Path, records: &[TripRecord], config: &ReconcileConfig) -> Result<usize> {
    DatasetWriter::new(path.to_path_buf(), config.output.clone()).write_dataset(records)
}

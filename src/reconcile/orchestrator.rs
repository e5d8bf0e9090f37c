//! Fixed-point reconciliation driver
//!
//! The orchestrator is an explicit state machine over one batch:
//!
//! ```text
//! Raw -> Excluded -> Indexed -> (ConflictsFound -> Corrected -> Indexed)* -> Finalized
//! ```
//!
//! Every correction pass applies the full ordered rule list once and then
//! re-indexes. The loop ends at the first conflict-free index or after
//! `max_passes`; running out of passes is reported, not raised.

use std::mem;
use tracing::{debug, info, warn};

use super::correction::CorrectionEngine;
use super::diagnostics::{find_encoding_artifacts, missing_value_census};
use super::exclusion::{ExclusionFilter, drop_incomplete};
use super::index::{ConflictRecord, detect_all_conflicts};
use super::report::{CleaningReport, ReportStatus};
use crate::config::{MissingValuePolicy, ReconcileConfig};
use crate::error::Result;
use crate::models::{RawTripRecord, TripRecord};

/// Position of the orchestrator in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Excluded,
    Indexed,
    ConflictsFound,
    Corrected,
    Finalized,
}

/// Frozen output of a reconciliation run
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub records: Vec<TripRecord>,
    pub report: CleaningReport,
    /// Pre-pass record sets, oldest first; empty unless snapshots are enabled
    pub snapshots: Vec<Vec<TripRecord>>,
}

impl CleanedDataset {
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
    }
}

#[derive(Debug)]
pub struct ReconciliationOrchestrator {
    engine: CorrectionEngine,
    filter: ExclusionFilter,
    policy: MissingValuePolicy,
    max_passes: usize,
    always_apply_rules: bool,
    keep_snapshots: bool,
    stage: Stage,
    raw: Vec<RawTripRecord>,
    records: Vec<TripRecord>,
    conflicts: Vec<ConflictRecord>,
    pending_counts: Vec<usize>,
    snapshots: Vec<Vec<TripRecord>>,
    report: CleaningReport,
}

impl ReconciliationOrchestrator {
    pub fn new(config: &ReconcileConfig, raw: Vec<RawTripRecord>) -> Self {
        let report = CleaningReport::new(raw.len(), &config.rules, config.max_passes);
        Self {
            engine: CorrectionEngine::new(config.rules.clone()),
            filter: ExclusionFilter::new(config.sentinel_station_ids.iter().cloned()),
            policy: config.missing_value_policy,
            max_passes: config.max_passes,
            always_apply_rules: config.always_apply_rules,
            keep_snapshots: config.keep_snapshots,
            stage: Stage::Raw,
            raw,
            records: Vec::new(),
            conflicts: Vec::new(),
            pending_counts: Vec::new(),
            snapshots: Vec::new(),
            report,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Conflicts found by the most recent index
    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    /// Advance by one transition and return the new stage
    pub fn step(&mut self) -> Result<Stage> {
        self.stage = match self.stage {
            Stage::Raw => self.exclude(),
            Stage::Excluded => {
                self.index();
                self.report.initial_conflicts = self.conflicts.len();
                info!(
                    "Initial index: {} records, {} conflicts",
                    self.records.len(),
                    self.conflicts.len()
                );
                Stage::Indexed
            }
            Stage::Indexed => self.decide()?,
            Stage::ConflictsFound => {
                self.correct()?;
                Stage::Corrected
            }
            Stage::Corrected => {
                self.index();
                let counts = mem::take(&mut self.pending_counts);
                self.report.record_pass(&counts, self.conflicts.len());
                debug!(
                    "Pass {} complete: {} rows rewritten, {} conflicts remain",
                    self.report.passes_run,
                    counts.iter().sum::<usize>(),
                    self.conflicts.len()
                );
                Stage::Indexed
            }
            Stage::Finalized => Stage::Finalized,
        };
        Ok(self.stage)
    }

    /// Drive the state machine to `Finalized`
    pub fn run(mut self) -> Result<CleanedDataset> {
        while self.step()? != Stage::Finalized {}

        Ok(CleanedDataset {
            records: self.records,
            report: self.report,
            snapshots: self.snapshots,
        })
    }

    fn exclude(&mut self) -> Stage {
        let raw = mem::take(&mut self.raw);
        self.report.missing_values = missing_value_census(&raw);

        let (complete, dropped_missing) = drop_incomplete(raw, self.policy);
        self.report.rows_dropped_missing_fields = dropped_missing;

        let excluded = self.filter.apply(complete);
        self.report.rows_dropped_invalid_station = excluded.dropped;
        self.report.rows_removed_invalid_station = excluded.rows_removed;
        self.records = excluded.records;

        Stage::Excluded
    }

    fn index(&mut self) {
        self.conflicts = detect_all_conflicts(&self.records);
    }

    fn decide(&mut self) -> Result<Stage> {
        let forced_first_pass =
            self.report.passes_run == 0 && self.always_apply_rules && !self.engine.is_empty();

        if self.conflicts.is_empty() && !forced_first_pass {
            return Ok(self.finalize());
        }
        if self.report.passes_run >= self.max_passes {
            return Ok(self.finalize());
        }
        if self.conflicts.is_empty() {
            self.correct()?;
            return Ok(Stage::Corrected);
        }

        debug!(
            "{} conflicts before pass {}",
            self.conflicts.len(),
            self.report.passes_run + 1
        );
        Ok(Stage::ConflictsFound)
    }

    fn correct(&mut self) -> Result<()> {
        let records = mem::take(&mut self.records);
        if self.keep_snapshots {
            self.snapshots.push(records.clone());
        }

        let outcome = self.engine.run_pass(records)?;
        self.pending_counts = outcome.rows_affected;
        self.records = outcome.records;
        Ok(())
    }

    fn finalize(&mut self) -> Stage {
        self.report.residual_conflicts = self.conflicts.clone();
        self.report.status = if self.conflicts.is_empty() {
            ReportStatus::Clean
        } else {
            ReportStatus::Partial
        };
        self.report.rows_out = self.records.len();
        self.report.encoding_artifacts = find_encoding_artifacts(&self.records);

        if self.conflicts.is_empty() {
            info!(
                "Reconciliation reached a fixed point after {} pass(es)",
                self.report.passes_run
            );
        } else {
            warn!(
                "{} station conflicts remain after {} of {} passes",
                self.conflicts.len(),
                self.report.passes_run,
                self.max_passes
            );
            for conflict in &self.conflicts {
                debug!("Residual conflict: {}", conflict);
            }
        }

        Stage::Finalized
    }
}

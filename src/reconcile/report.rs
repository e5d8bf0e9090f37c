//! Cleaning report handed to downstream consumers
//!
//! The report is the only record of what the pipeline removed and rewrote.
//! It serializes to the JSON shape consumed by the analytics side.

use serde::Serialize;
use std::collections::BTreeMap;

use super::correction::CorrectionRule;
use super::diagnostics::{EncodingArtifact, TimestampCensus};
use super::exclusion::SentinelCounts;
use super::index::ConflictRecord;

/// Whether the run reached a conflict-free fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Clean,
    Partial,
}

/// Rows affected by one configured rule, summed over all passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleImpact {
    pub rule: String,
    pub kind: String,
    pub rows_affected: usize,
}

/// Outcome of a single correction pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: usize,
    pub rows_affected: Vec<usize>,
    pub conflicts_after: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub rows_dropped_missing_fields: usize,
    pub rows_dropped_invalid_station: BTreeMap<String, SentinelCounts>,
    pub rows_removed_invalid_station: usize,
    pub rules_applied: Vec<RuleImpact>,
    pub passes_run: usize,
    pub max_passes: usize,
    pub initial_conflicts: usize,
    pub residual_conflicts: Vec<ConflictRecord>,
    pub status: ReportStatus,
    pub rows_out: usize,
    pub pass_history: Vec<PassSummary>,
    pub missing_values: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampCensus>,
    pub encoding_artifacts: Vec<EncodingArtifact>,
}

impl CleaningReport {
    /// Start a report for `rows_in` raw rows and the configured rule list
    pub fn new(rows_in: usize, rules: &[CorrectionRule], max_passes: usize) -> Self {
        Self {
            rows_in,
            rows_dropped_missing_fields: 0,
            rows_dropped_invalid_station: BTreeMap::new(),
            rows_removed_invalid_station: 0,
            rules_applied: rules
                .iter()
                .map(|rule| RuleImpact {
                    rule: rule.to_string(),
                    kind: rule.kind().to_string(),
                    rows_affected: 0,
                })
                .collect(),
            passes_run: 0,
            max_passes,
            initial_conflicts: 0,
            residual_conflicts: Vec::new(),
            status: ReportStatus::Clean,
            rows_out: 0,
            pass_history: Vec::new(),
            missing_values: BTreeMap::new(),
            timestamps: None,
            encoding_artifacts: Vec::new(),
        }
    }

    /// Fold one pass's per-rule counts into the running totals
    pub fn record_pass(&mut self, rows_affected: &[usize], conflicts_after: usize) {
        for (impact, affected) in self.rules_applied.iter_mut().zip(rows_affected) {
            impact.rows_affected += affected;
        }
        self.passes_run += 1;
        self.pass_history.push(PassSummary {
            pass: self.passes_run,
            rows_affected: rows_affected.to_vec(),
            conflicts_after,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.status == ReportStatus::Clean
    }

    /// Occurrences of sentinel ids across both roles
    pub fn invalid_station_occurrences(&self) -> usize {
        self.rows_dropped_invalid_station
            .values()
            .map(SentinelCounts::total)
            .sum()
    }

    pub fn rows_rewritten(&self) -> usize {
        self.rules_applied.iter().map(|r| r.rows_affected).sum()
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Cleaning Summary: {} -> {} rows | missing fields: {} | invalid station: {} | \
             rewrites: {} over {} pass(es) | residual conflicts: {} ({:?})",
            self.rows_in,
            self.rows_out,
            self.rows_dropped_missing_fields,
            self.rows_removed_invalid_station,
            self.rows_rewritten(),
            self.passes_run,
            self.residual_conflicts.len(),
            self.status
        )
    }
}

//! Station identity reconciliation core
//!
//! This module turns a batch of raw trip rows into a record set where every
//! station id maps to exactly one name and every name to exactly one id, or
//! reports precisely which associations could not be resolved.
//!
//! # Architecture
//!
//! - [`index`] - name↔id indices per role and conflict detection
//! - [`exclusion`] - missing-identity and sentinel-id filtering
//! - [`correction`] - ordered, typed correction rules and the engine that applies them
//! - [`orchestrator`] - the fixed-point state machine tying the stages together
//! - [`report`] - the cleaning report handed to downstream consumers
//! - [`diagnostics`] - census helpers that surface data-quality facts without rewriting
//!
//! # Pipeline
//!
//! 1. **Exclusion**: drop rows missing a station field, then rows touching a sentinel id
//! 2. **Indexing**: build name→ids and id→names per role, list every ambiguous key
//! 3. **Correction**: apply the full rule list once per pass, in configured order
//! 4. **Re-indexing**: repeat until conflict-free or the pass bound is reached
//!
//! Each stage consumes one record-set version and produces the next; nothing
//! is shared between passes beyond the current version and the report. The
//! whole reconciliation is single-threaded because conflict detection needs a
//! globally consistent view of the batch.
//!
//! # Example
//!
//! ```rust
//! use trip_reconciler::config::ReconcileConfig;
//! use trip_reconciler::reconcile::reconcile;
//!
//! # fn example(rows: Vec<trip_reconciler::models::RawTripRecord>) -> trip_reconciler::error::Result<()> {
//! let config = ReconcileConfig::default();
//! let cleaned = reconcile(&config, rows)?;
//!
//! println!("{}", cleaned.report.summary());
//! # Ok(())
//! # }
//! ```

pub mod correction;
pub mod diagnostics;
pub mod exclusion;
pub mod index;
pub mod orchestrator;
pub mod report;

#[cfg(test)]
pub mod tests;

pub use correction::{CorrectionEngine, CorrectionRule, PassOutcome};
pub use exclusion::{ExclusionFilter, SentinelCounts};
pub use index::{ConflictRecord, IdentityIndex, IndexScope, detect_all_conflicts};
pub use orchestrator::{CleanedDataset, ReconciliationOrchestrator, Stage};
pub use report::{CleaningReport, ReportStatus, RuleImpact};

use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::models::RawTripRecord;

/// Run the full reconciliation over one in-memory batch
pub fn reconcile(config: &ReconcileConfig, raw: Vec<RawTripRecord>) -> Result<CleanedDataset> {
    ReconciliationOrchestrator::new(config, raw).run()
}

/// Exclusion and conflict listing only; no rule is applied
pub fn check(config: &ReconcileConfig, raw: Vec<RawTripRecord>) -> Result<CleanedDataset> {
    let detect_only = ReconcileConfig {
        max_passes: 0,
        ..config.clone()
    };
    ReconciliationOrchestrator::new(&detect_only, raw).run()
}

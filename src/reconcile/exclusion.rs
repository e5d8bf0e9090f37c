//! Record exclusion ahead of indexing
//!
//! Two filters run before the first index is built: rows missing a station
//! identity field are dropped (an index cannot group on an absent key), then
//! rows touching a sentinel invalid station id are removed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::MissingValuePolicy;
use crate::models::{RawTripRecord, TripRecord};

/// Rows removed for one sentinel id, split by the column it appeared in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelCounts {
    pub start: usize,
    pub end: usize,
}

impl SentinelCounts {
    /// Combined occurrences across both roles
    pub fn total(&self) -> usize {
        self.start + self.end
    }
}

/// Promote raw rows to [`TripRecord`]s, dropping rows the policy rejects
///
/// Returns the kept records and the number of rows dropped.
pub fn drop_incomplete(
    raw: Vec<RawTripRecord>,
    policy: MissingValuePolicy,
) -> (Vec<TripRecord>, usize) {
    let total = raw.len();
    let records: Vec<TripRecord> = raw
        .into_iter()
        .filter(|row| match policy {
            MissingValuePolicy::IdentityOnly => true,
            MissingValuePolicy::AnyField => row.is_complete(),
        })
        .filter_map(TripRecord::from_raw)
        .collect();

    let dropped = total - records.len();
    if dropped > 0 {
        info!(
            "Dropped {} of {} rows with missing fields (policy: {:?})",
            dropped, total, policy
        );
    }

    (records, dropped)
}

/// Result of running the sentinel filter
#[derive(Debug, Clone)]
pub struct ExclusionResult {
    pub records: Vec<TripRecord>,
    /// Per-sentinel counts; every configured sentinel appears, even at zero
    pub dropped: BTreeMap<String, SentinelCounts>,
    /// Rows actually removed (a row with sentinels at both ends counts once)
    pub rows_removed: usize,
}

/// Drops every record that references a sentinel station id
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    sentinel_ids: BTreeSet<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(sentinel_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sentinel_ids: sentinel_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_sentinel(&self, station_id: &str) -> bool {
        self.sentinel_ids.contains(station_id)
    }

    pub fn sentinel_ids(&self) -> &BTreeSet<String> {
        &self.sentinel_ids
    }

    pub fn apply(&self, records: Vec<TripRecord>) -> ExclusionResult {
        let mut dropped: BTreeMap<String, SentinelCounts> = self
            .sentinel_ids
            .iter()
            .map(|id| (id.clone(), SentinelCounts::default()))
            .collect();

        let total = records.len();
        let mut kept = Vec::with_capacity(total);

        for record in records {
            let start_hit = dropped.get_mut(&record.start_station_id).map(|c| c.start += 1);
            let end_hit = dropped.get_mut(&record.end_station_id).map(|c| c.end += 1);

            if start_hit.is_none() && end_hit.is_none() {
                kept.push(record);
            }
        }

        let rows_removed = total - kept.len();
        for (id, counts) in dropped.iter().filter(|(_, c)| c.total() > 0) {
            info!(
                "{} trips start or end at sentinel station {} (start: {}, end: {})",
                counts.total(),
                id,
                counts.start,
                counts.end
            );
        }
        debug!("Sentinel filter: {} -> {} records", total, kept.len());

        ExclusionResult {
            records: kept,
            dropped,
            rows_removed,
        }
    }
}

//! Data-quality census helpers for the cleaning report
//!
//! None of these rewrite records. They surface facts an operator needs when
//! curating the rule set: missing cells per column, timestamp parse outcomes
//! and station names carrying non-ASCII whitespace.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::constants::{
    BIKE_TYPE, END_STATION_ID, END_STATION_NAME, ENDED_AT, RIDER_TYPE, START_STATION_ID,
    START_STATION_NAME, STARTED_AT,
};
use crate::models::{RawTripRecord, Role, TripRecord};

static FRACTIONAL_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d+").expect("fractional seconds pattern is valid"));

/// Count missing values per column across raw rows
pub fn missing_value_census(rows: &[RawTripRecord]) -> BTreeMap<String, usize> {
    let mut census: BTreeMap<String, usize> = [
        STARTED_AT,
        ENDED_AT,
        START_STATION_ID,
        START_STATION_NAME,
        END_STATION_ID,
        END_STATION_NAME,
        RIDER_TYPE,
        BIKE_TYPE,
    ]
    .iter()
    .map(|column| (column.to_string(), 0))
    .collect();

    let mut bump = |column: &str, missing: bool| {
        if missing {
            if let Some(count) = census.get_mut(column) {
                *count += 1;
            }
        }
    };

    for row in rows {
        bump(STARTED_AT, row.started_at.is_none());
        bump(ENDED_AT, row.ended_at.is_none());
        bump(START_STATION_ID, row.start_station_id.is_none());
        bump(START_STATION_NAME, row.start_station_name.is_none());
        bump(END_STATION_ID, row.end_station_id.is_none());
        bump(END_STATION_NAME, row.end_station_name.is_none());
        bump(RIDER_TYPE, row.rider_type.is_none());
        bump(BIKE_TYPE, row.bike_type.is_none());
    }

    census
}

/// Timestamp parse outcomes gathered during ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimestampCensus {
    pub parsed: usize,
    pub unparseable: usize,
    pub empty: usize,
    /// Values carrying a fractional-seconds suffix, parsed or not
    pub fractional_seconds: usize,
}

impl TimestampCensus {
    /// Record one timestamp cell
    pub fn observe(&mut self, raw: Option<&str>, parsed: bool) {
        match raw {
            None => self.empty += 1,
            Some(value) => {
                if FRACTIONAL_SECONDS.is_match(value) {
                    self.fractional_seconds += 1;
                }
                if parsed {
                    self.parsed += 1;
                } else {
                    self.unparseable += 1;
                }
            }
        }
    }

    pub fn merge(&mut self, other: &TimestampCensus) {
        self.parsed += other.parsed;
        self.unparseable += other.unparseable;
        self.empty += other.empty;
        self.fractional_seconds += other.fractional_seconds;
    }
}

/// A station name containing whitespace other than ASCII space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingArtifact {
    pub role: Role,
    pub station_id: String,
    /// Name with the offending characters escaped as `\u{..}`
    pub name: String,
    pub rows: usize,
}

pub fn has_encoding_artifact(name: &str) -> bool {
    name.chars().any(|c| c.is_whitespace() && c != ' ')
}

fn escape_whitespace(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() && c != ' ' {
                format!("\\u{{{:04x}}}", c as u32)
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Names with non-ASCII whitespace, grouped by role, id and spelling
pub fn find_encoding_artifacts(records: &[TripRecord]) -> Vec<EncodingArtifact> {
    let mut grouped: BTreeMap<(Role, &str, &str), usize> = BTreeMap::new();

    for record in records {
        for role in Role::ALL {
            let name = record.station_name(role);
            if has_encoding_artifact(name) {
                *grouped
                    .entry((role, record.station_id(role), name))
                    .or_default() += 1;
            }
        }
    }

    grouped
        .into_iter()
        .map(|((role, station_id, name), rows)| EncodingArtifact {
            role,
            station_id: station_id.to_string(),
            name: escape_whitespace(name),
            rows,
        })
        .collect()
}

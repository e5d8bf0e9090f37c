//! Core data structures and types for trip reconciliation.
//!
//! Defines the raw and cleaned trip record shapes, the categorical trip
//! attributes, station roles and the run statistics used throughout the
//! library.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants::{END_STATION_ID, END_STATION_NAME, START_STATION_ID, START_STATION_NAME};

/// Which end of a trip a station column belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Origin,
    Destination,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Origin, Role::Destination];

    /// Column holding the station id for this role
    pub fn id_column(&self) -> &'static str {
        match self {
            Role::Origin => START_STATION_ID,
            Role::Destination => END_STATION_ID,
        }
    }

    /// Column holding the station name for this role
    pub fn name_column(&self) -> &'static str {
        match self {
            Role::Origin => START_STATION_NAME,
            Role::Destination => END_STATION_NAME,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Origin => write!(f, "origin"),
            Role::Destination => write!(f, "destination"),
        }
    }
}

/// Whether a conflict is keyed by station id or by station name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    StationId,
    StationName,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::StationId => write!(f, "id"),
            KeyKind::StationName => write!(f, "name"),
        }
    }
}

/// Rider membership category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderType {
    Member,
    Casual,
}

impl RiderType {
    /// Parse a source value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "member" => Some(RiderType::Member),
            "casual" => Some(RiderType::Casual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiderType::Member => "member",
            RiderType::Casual => "casual",
        }
    }
}

/// Bike category as published in the trip feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BikeType {
    Classic,
    Electric,
    Docked,
    Other(String),
}

impl BikeType {
    /// Parse a source value; unknown categories are kept verbatim
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        Some(match value.to_ascii_lowercase().as_str() {
            "classic_bike" => BikeType::Classic,
            "electric_bike" => BikeType::Electric,
            "docked_bike" => BikeType::Docked,
            _ => BikeType::Other(value.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            BikeType::Classic => "classic_bike",
            BikeType::Electric => "electric_bike",
            BikeType::Docked => "docked_bike",
            BikeType::Other(value) => value,
        }
    }
}

/// A trip row as delivered by ingestion, before any cleaning
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTripRecord {
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub start_station_id: Option<String>,
    pub start_station_name: Option<String>,
    pub end_station_id: Option<String>,
    pub end_station_name: Option<String>,
    pub rider_type: Option<RiderType>,
    pub bike_type: Option<BikeType>,
    /// Index of the source file in discovery order
    pub source_file: usize,
    /// Zero-based data row within the source file
    pub source_row: usize,
}

impl RawTripRecord {
    /// Identity columns that are absent on this row
    pub fn missing_identity_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.start_station_id.is_none() {
            missing.push(START_STATION_ID);
        }
        if self.start_station_name.is_none() {
            missing.push(START_STATION_NAME);
        }
        if self.end_station_id.is_none() {
            missing.push(END_STATION_ID);
        }
        if self.end_station_name.is_none() {
            missing.push(END_STATION_NAME);
        }
        missing
    }

    /// True when every column, not only the station identity, is present
    pub fn is_complete(&self) -> bool {
        self.missing_identity_fields().is_empty()
            && self.started_at.is_some()
            && self.ended_at.is_some()
            && self.rider_type.is_some()
            && self.bike_type.is_some()
    }
}

/// A trip row whose station identity is fully populated
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub start_station_id: String,
    pub start_station_name: String,
    pub end_station_id: String,
    pub end_station_name: String,
    pub rider_type: Option<RiderType>,
    pub bike_type: Option<BikeType>,
    pub trip_duration: Option<TimeDelta>,
}

impl TripRecord {
    /// Promote a raw row, returning `None` when any station field is missing
    pub fn from_raw(raw: RawTripRecord) -> Option<Self> {
        let trip_duration = trip_duration(raw.started_at, raw.ended_at);
        Some(Self {
            start_station_id: raw.start_station_id?,
            start_station_name: raw.start_station_name?,
            end_station_id: raw.end_station_id?,
            end_station_name: raw.end_station_name?,
            started_at: raw.started_at,
            ended_at: raw.ended_at,
            rider_type: raw.rider_type,
            bike_type: raw.bike_type,
            trip_duration,
        })
    }

    pub fn station_id(&self, role: Role) -> &str {
        match role {
            Role::Origin => &self.start_station_id,
            Role::Destination => &self.end_station_id,
        }
    }

    pub fn station_name(&self, role: Role) -> &str {
        match role {
            Role::Origin => &self.start_station_name,
            Role::Destination => &self.end_station_name,
        }
    }

    pub fn set_station_name(&mut self, role: Role, name: &str) {
        match role {
            Role::Origin => self.start_station_name = name.to_string(),
            Role::Destination => self.end_station_name = name.to_string(),
        }
    }

    /// Trip duration in whole seconds, when derivable
    pub fn duration_seconds(&self) -> Option<i64> {
        self.trip_duration.map(|d| d.num_seconds())
    }
}

/// Duration between two timestamps; negative spans are treated as unknown
pub fn trip_duration(
    started_at: Option<NaiveDateTime>,
    ended_at: Option<NaiveDateTime>,
) -> Option<TimeDelta> {
    match (started_at, ended_at) {
        (Some(start), Some(end)) if end >= start => Some(end - start),
        _ => None,
    }
}

/// Processing statistics for a complete run
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub rows_read: usize,
    pub rows_written: usize,
    pub output_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub processing_time_ms: u128,
}

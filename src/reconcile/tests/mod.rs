//! Tests for the reconciliation core
//!
//! Unit and property-style tests for indexing, exclusion, correction and
//! the fixed-point driver.


// Test helper functions and fixtures
use crate::config::ReconcileConfig;
use crate::models::{BikeType, RawTripRecord, RiderType, TripRecord};
use chrono::{NaiveDate, NaiveDateTime};

pub const CANAL: &str = "Canal St at Causeway St";
pub const CANAL_NBSP: &str = "Canal St\u{a0}at\u{a0}Causeway\u{a0}St";
pub const CANAL_DOTTED_NBSP: &str = "Canal St.\u{a0}at\u{a0}Causeway\u{a0}St.";
pub const TREMONT: &str = "Tremont St at Court St";
pub const BOYLSTON: &str = "Boylston St at Berkeley St";

pub fn test_time(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
        + chrono::TimeDelta::minutes(minute as i64)
}

/// Create a raw trip between two stations
pub fn create_raw_trip(
    start_id: &str,
    start_name: &str,
    end_id: &str,
    end_name: &str,
) -> RawTripRecord {
    RawTripRecord {
        started_at: Some(test_time(0)),
        ended_at: Some(test_time(12)),
        start_station_id: Some(start_id.to_string()),
        start_station_name: Some(start_name.to_string()),
        end_station_id: Some(end_id.to_string()),
        end_station_name: Some(end_name.to_string()),
        rider_type: Some(RiderType::Member),
        bike_type: Some(BikeType::Classic),
        ..Default::default()
    }
}

/// Create a cleaned trip between two stations
pub fn create_trip(start_id: &str, start_name: &str, end_id: &str, end_name: &str) -> TripRecord {
    TripRecord::from_raw(create_raw_trip(start_id, start_name, end_id, end_name))
        .expect("fixture has full station identity")
}

/// Trips departing A32046 under each given name, all ending at Boylston
pub fn trips_from_a32046(names: &[&str]) -> Vec<RawTripRecord> {
    names
        .iter()
        .map(|name| create_raw_trip("A32046", name, "D32005", BOYLSTON))
        .collect()
}

/// Configuration with an explicit rule list and no sentinels
pub fn config_with_rules(rules: Vec<crate::reconcile::CorrectionRule>) -> ReconcileConfig {
    ReconcileConfig::default()
        .with_rules(rules)
        .with_sentinel_ids(Vec::<String>::new())
}

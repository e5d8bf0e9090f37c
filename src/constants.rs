//! Application constants for the trip reconciler
//!
//! This module contains column names, default values and the built-in
//! correction rule set used throughout the reconciler.

use crate::reconcile::correction::CorrectionRule;

// =============================================================================
// Column Names
// =============================================================================

pub const STARTED_AT: &str = "started_at";
pub const ENDED_AT: &str = "ended_at";
pub const START_STATION_ID: &str = "start_station_id";
pub const START_STATION_NAME: &str = "start_station_name";
pub const END_STATION_ID: &str = "end_station_id";
pub const END_STATION_NAME: &str = "end_station_name";
pub const RIDER_TYPE: &str = "rider_type";
pub const BIKE_TYPE: &str = "bike_type";
pub const TRIP_DURATION: &str = "trip_duration";

/// Columns every trip file must provide (after alias resolution)
pub const REQUIRED_COLUMNS: &[&str] = &[
    STARTED_AT,
    ENDED_AT,
    START_STATION_ID,
    START_STATION_NAME,
    END_STATION_ID,
    END_STATION_NAME,
    RIDER_TYPE,
    BIKE_TYPE,
];

/// Source column names renamed to their canonical form on load
pub const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("member_casual", RIDER_TYPE),
    ("rideable_type", BIKE_TYPE),
];

// =============================================================================
// Ingestion Defaults
// =============================================================================

/// Timestamp format; `%.f` accepts an optional fractional-seconds suffix
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Default pattern for trip files inside an input directory
pub const DEFAULT_FILE_PATTERN: &str = "*.csv";

/// Name of the per-user configuration directory
pub const CONFIG_DIR_NAME: &str = "trip-reconciler";

/// Name of the rules file looked up in the configuration directory
pub const RULES_FILE_NAME: &str = "rules.toml";

/// Suffix appended to the output stem for the cleaning report
pub const REPORT_SUFFIX: &str = "report.json";

// =============================================================================
// Reconciliation Defaults
// =============================================================================

/// Upper bound on correction passes before the run is finalized as partial
pub const DEFAULT_MAX_PASSES: usize = 5;

/// Station ids known not to correspond to any real station
pub const DEFAULT_SENTINEL_STATION_IDS: &[&str] = &["S32020"];

/// Non-breaking space, the most common encoding artifact in station names
pub const NBSP: char = '\u{a0}';

/// Formatting variants of already-canonical names, applied unconditionally
pub const DEFAULT_NAME_CHANGES: &[(&str, &str)] = &[
    ("Canal St. at Causeway St.", "Canal St at Causeway St"),
    ("Tremont St. at Court St.", "Tremont St at Court St"),
    (
        "Chestnut Hill Ave. at Ledgemere Road",
        "Chestnut Hill Ave at Ledgemere Rd",
    ),
    ("Centre St. at Allandale St.", "Centre St at Allandale St"),
    (
        "Hyde Square - Barbara St at Centre St",
        "Hyde Square - Centre St at Perkins St",
    ),
    (
        "Swan Pl. at Minuteman Bikeway",
        "Swan Place at Minuteman Bikeway",
    ),
    (
        "CambridgeSide Galleria - CambridgeSide PL at Land Blvd",
        "Cambridgeside Pl at Land Blvd",
    ),
    ("Summer St at Quincy St", "Somerville Hospital"),
    (
        "Everett Square (Broadway at Chelsea St)",
        "Everett Square (Broadway at Norwood St)",
    ),
    ("Damrell st at Old Colony Ave", "Damrell St at Old Colony Ave"),
];

/// Built-in ordered rule set for the Boston trip data
///
/// Station A32046 is "Canal St at Causeway St"; some batches label it with
/// the neighbouring Tremont St name or with non-breaking spaces.
pub fn default_rules() -> Vec<CorrectionRule> {
    let mut rules = vec![CorrectionRule::ConditionalReassign {
        station_id: "A32046".to_string(),
        wrong_name: "Tremont St at Court St".to_string(),
        correct_name: "Canal St at Causeway St".to_string(),
    }];

    rules.extend(
        DEFAULT_NAME_CHANGES
            .iter()
            .map(|(old_name, new_name)| CorrectionRule::ExactReplace {
                old_name: old_name.to_string(),
                new_name: new_name.to_string(),
            }),
    );

    rules.push(CorrectionRule::EncodingNormalize {
        station_id: "A32046".to_string(),
        variants: vec!["Canal St\u{a0}at\u{a0}Causeway\u{a0}St".to_string()],
        canonical: "Canal St at Causeway St".to_string(),
    });

    rules
}

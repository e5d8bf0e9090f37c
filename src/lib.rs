//! Trip Reconciler Library
//!
//! A Rust library for reconciling station identities in bike-share trip
//! records, so that every station id maps to one canonical name and every
//! name to one id.
//!
//! This library provides tools for:
//! - Loading monthly trip CSV files concurrently into one ordered batch
//! - Dropping rows with missing station fields or sentinel station ids
//! - Detecting name/id conflicts in both directions, per station role
//! - Applying ordered, typed correction rules until a fixed point
//! - Writing the cleaned dataset to Parquet or CSV with a JSON cleaning report

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;
pub mod reconcile;
pub mod schema;

// Re-export commonly used types
pub use config::ReconcileConfig;
pub use error::{ReconcileError, Result};
pub use models::{RawTripRecord, TripRecord};
pub use reconcile::{CleanedDataset, CleaningReport, CorrectionRule, reconcile};

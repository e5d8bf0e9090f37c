//! Column mapping for trip CSV headers.
//!
//! Resolves published column names (including legacy aliases) to the
//! canonical names used throughout the crate and checks that every
//! required column is present before any row is parsed.

use crate::constants::{COLUMN_ALIASES, REQUIRED_COLUMNS};
use crate::error::{ReconcileError, Result};
use csv::StringRecord;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Canonical column name to header index
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    name_to_index: HashMap<String, usize>,

    /// Header columns not used by the pipeline
    pub ignored_columns: Vec<String>,
}

/// Canonical name for a header cell
pub fn canonical_column_name(header: &str) -> String {
    let name = header.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(name)
}

impl ColumnMapping {
    /// Analyze a header row; fails when a required column is absent
    pub fn analyze(headers: &StringRecord, path: &Path) -> Result<Self> {
        let mut name_to_index = HashMap::new();
        let mut ignored_columns = Vec::new();

        for (index, header) in headers.iter().enumerate() {
            let column_name = canonical_column_name(header);

            if REQUIRED_COLUMNS.contains(&column_name.as_str()) {
                // First occurrence wins on duplicated headers
                name_to_index.entry(column_name).or_insert(index);
            } else {
                ignored_columns.push(column_name);
            }
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !name_to_index.contains_key(*column))
            .collect();

        if !missing.is_empty() {
            return Err(ReconcileError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing.join(", "),
            });
        }

        if !ignored_columns.is_empty() {
            debug!(
                "{}: ignoring columns {:?}",
                path.display(),
                ignored_columns
            );
        }

        Ok(Self {
            name_to_index,
            ignored_columns,
        })
    }

    /// Get the index for a given column name
    pub fn get_index(&self, column_name: &str) -> Option<usize> {
        self.name_to_index.get(column_name).copied()
    }

    /// Cell value with ASCII whitespace trimmed; empty cells read as `None`.
    /// Non-ASCII whitespace such as U+00A0 is kept for the scoped rules.
    pub fn field<'r>(&self, record: &'r StringRecord, column_name: &str) -> Option<&'r str> {
        self.get_index(column_name)
            .and_then(|index| record.get(index))
            .map(str::trim_ascii)
            .filter(|value| !value.is_empty())
    }
}

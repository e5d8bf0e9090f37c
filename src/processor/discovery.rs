//! File discovery for trip datasets
//!
//! An input is either a single CSV file or a directory of monthly trip
//! files. Directory inputs are matched against the configured glob
//! pattern, optionally descending into sub-directories.

use crate::config::IngestConfig;
use crate::error::{ReconcileError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File discovery component for trip datasets
#[derive(Debug)]
pub struct FileDiscovery {
    input_path: PathBuf,
    pattern: String,
    recursive: bool,
}

impl FileDiscovery {
    /// Create a new file discovery instance
    pub fn new(input_path: PathBuf, config: &IngestConfig) -> Self {
        Self {
            input_path,
            pattern: config.file_pattern.clone(),
            recursive: config.recursive,
        }
    }

    /// Discover trip files, sorted by path
    ///
    /// Sorting fixes the file index recorded on every row, which in turn
    /// fixes the merge order of rows sharing a start time.
    pub fn discover_csv_files(&self) -> Result<Vec<PathBuf>> {
        if !self.input_path.exists() {
            return Err(ReconcileError::InputNotFound {
                path: self.input_path.clone(),
            });
        }

        if self.input_path.is_file() {
            return Ok(vec![self.input_path.clone()]);
        }

        let pattern = Pattern::new(&self.pattern).map_err(|e| {
            ReconcileError::configuration(format!(
                "invalid file pattern '{}': {}",
                self.pattern, e
            ))
        })?;

        debug!(
            "Searching for '{}' in: {} (recursive: {})",
            self.pattern,
            self.input_path.display(),
            self.recursive
        );

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.input_path)
            .max_depth(max_depth)
            .follow_links(true)
        {
            let entry = entry.map_err(|e| {
                ReconcileError::processing_failed(&self.input_path, e.to_string())
            })?;

            if entry.file_type().is_file() && matches_pattern(&pattern, entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Found {} trip files", files.len());

        Ok(files)
    }
}

/// Match the pattern against the file name only
fn matches_pattern(pattern: &Pattern, path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| pattern.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Helper to create a small directory of monthly trip files
    fn create_test_dataset(temp_dir: &TempDir) -> PathBuf {
        let dataset_path = temp_dir.path().join("trips");
        let nested = dataset_path.join("2024");
        fs::create_dir_all(&nested).unwrap();

        fs::write(dataset_path.join("202409-tripdata.csv"), "x").unwrap();
        fs::write(dataset_path.join("202408-tripdata.csv"), "x").unwrap();
        fs::write(dataset_path.join("README.txt"), "notes").unwrap();
        fs::write(nested.join("202407-tripdata.csv"), "x").unwrap();

        dataset_path
    }

    fn file_names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_discover_top_level_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let dataset_path = create_test_dataset(&temp_dir);

        let discovery = FileDiscovery::new(dataset_path, &IngestConfig::default());
        let files = discovery.discover_csv_files().unwrap();

        assert_eq!(
            file_names(&files),
            vec!["202408-tripdata.csv", "202409-tripdata.csv"]
        );
    }

    #[test]
    fn test_discover_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let dataset_path = create_test_dataset(&temp_dir);

        let config = IngestConfig {
            recursive: true,
            ..Default::default()
        };
        let files = FileDiscovery::new(dataset_path, &config)
            .discover_csv_files()
            .unwrap();

        assert_eq!(files.len(), 3);
        assert!(file_names(&files).contains(&"202407-tripdata.csv".to_string()));
    }

    #[test]
    fn test_single_file_input() {
        let temp_dir = TempDir::new().unwrap();
        let dataset_path = create_test_dataset(&temp_dir);
        let file = dataset_path.join("202409-tripdata.csv");

        let files = FileDiscovery::new(file.clone(), &IngestConfig::default())
            .discover_csv_files()
            .unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let discovery =
            FileDiscovery::new(temp_dir.path().join("absent"), &IngestConfig::default());

        match discovery.discover_csv_files() {
            Err(ReconcileError::InputNotFound { .. }) => {}
            other => panic!("Expected InputNotFound error, got {:?}", other),
        }
    }
}

//! Configuration management and validation.
//!
//! Provides the reconciliation settings (rule list, sentinel ids, pass
//! bound), ingestion and output settings, and the layered loading of a
//! TOML rules file over the built-in defaults.

use crate::constants::{
    self, CONFIG_DIR_NAME, DEFAULT_FILE_PATTERN, DEFAULT_MAX_PASSES,
    DEFAULT_SENTINEL_STATION_IDS, DEFAULT_TIMESTAMP_FORMAT, RULES_FILE_NAME,
};
use crate::error::{ReconcileError, Result};
use crate::reconcile::correction::CorrectionRule;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// How rows with missing values are treated before indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Drop only rows missing a station id or name
    #[default]
    IdentityOnly,
    /// Drop rows missing any column
    AnyField,
}

/// File format for the cleaned dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(ReconcileError::configuration(format!(
                "unknown output format '{}' (expected parquet or csv)",
                other
            ))),
        }
    }
}

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    #[default]
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    #[serde(alias = "none")]
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "none" | "uncompressed" => Ok(CompressionAlgorithm::Uncompressed),
            other => Err(ReconcileError::configuration(format!(
                "unknown compression '{}' (expected snappy, zstd, lz4 or none)",
                other
            ))),
        }
    }
}

/// Settings for discovering and parsing trip files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum files parsed concurrently
    pub max_concurrent_files: usize,

    /// chrono format for `started_at` / `ended_at`
    pub timestamp_format: String,

    /// Glob pattern for trip files inside an input directory
    pub file_pattern: String,

    /// Descend into sub-directories when discovering files
    pub recursive: bool,

    /// Memory usage fraction above which concurrency is halved
    pub memory_threshold: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: num_cpus::get().max(1),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            recursive: false,
            memory_threshold: 0.8,
        }
    }
}

/// Settings for the cleaned dataset and report files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub compression: CompressionAlgorithm,

    /// Report location; defaults to a sibling of the dataset output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

/// Global configuration for a reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Upper bound on correction passes
    pub max_passes: usize,

    /// Station ids whose trips are removed before indexing
    pub sentinel_station_ids: Vec<String>,

    /// Run one correction pass even when the first index is conflict-free
    pub always_apply_rules: bool,

    /// Keep each pre-pass record set in the output
    pub keep_snapshots: bool,

    pub missing_value_policy: MissingValuePolicy,

    pub ingest: IngestConfig,

    pub output: OutputConfig,

    /// Ordered correction rules
    pub rules: Vec<CorrectionRule>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            sentinel_station_ids: DEFAULT_SENTINEL_STATION_IDS
                .iter()
                .map(|id| id.to_string())
                .collect(),
            always_apply_rules: true,
            keep_snapshots: false,
            missing_value_policy: MissingValuePolicy::default(),
            ingest: IngestConfig::default(),
            output: OutputConfig::default(),
            rules: constants::default_rules(),
        }
    }
}

impl ReconcileConfig {
    /// Parse a configuration from TOML text; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ReconcileError::configuration(format!("invalid TOML: {}", e)))
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconcileError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ReconcileError::RuleFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize to TOML, e.g. to seed a user rules file
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ReconcileError::configuration(format!("cannot serialize config: {}", e)))
    }

    /// Per-user rules file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(RULES_FILE_NAME))
    }

    /// Built-in defaults, overlaid by an explicit or per-user rules file
    ///
    /// With `use_builtin_rules` off and no file found, the rule list is empty
    /// and only exclusion and conflict detection take place.
    pub fn load_layered(rules_path: Option<&Path>, use_builtin_rules: bool) -> Result<Self> {
        let user_path = Self::default_config_path().filter(|path| path.exists());

        let config = match rules_path.map(Path::to_path_buf).or(user_path) {
            Some(path) => {
                debug!("Loading rules from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                let mut config = Self::default();
                if !use_builtin_rules {
                    config.rules.clear();
                }
                config
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject rule sets and settings that cannot run soundly
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            rule.validate()?;
        }

        if self.sentinel_station_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ReconcileError::configuration(
                "sentinel station ids must not be empty",
            ));
        }

        if self.ingest.max_concurrent_files == 0 {
            return Err(ReconcileError::configuration(
                "ingest.max_concurrent_files must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.ingest.memory_threshold) {
            return Err(ReconcileError::configuration(
                "ingest.memory_threshold must be between 0 and 1",
            ));
        }

        Ok(())
    }

    /// Sentinel ids as a set
    pub fn sentinel_set(&self) -> BTreeSet<String> {
        self.sentinel_station_ids.iter().cloned().collect()
    }

    /// Set the maximum number of correction passes
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Replace the sentinel station ids
    pub fn with_sentinel_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinel_station_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the rule list
    pub fn with_rules(mut self, rules: Vec<CorrectionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_missing_value_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_value_policy = policy;
        self
    }

    /// Only apply rules when the first index shows conflicts
    pub fn without_forced_pass(mut self) -> Self {
        self.always_apply_rules = false;
        self
    }

    /// Retain pre-pass snapshots
    pub fn with_snapshots(mut self) -> Self {
        self.keep_snapshots = true;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output.format = format;
        self
    }

    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.ingest.max_concurrent_files = max_files;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_passes, DEFAULT_MAX_PASSES);
        assert!(config.sentinel_set().contains("S32020"));
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn test_toml_rules_parse_in_order() {
        let content = r#"
max_passes = 3
sentinel_station_ids = ["S32020", "X00000"]

[[rules]]
kind = "conditional_reassign"
station_id = "A32046"
wrong_name = "Tremont St at Court St"
correct_name = "Canal St at Causeway St"

[[rules]]
kind = "exact_replace"
old_name = "Canal St. at Causeway St."
new_name = "Canal St at Causeway St"

[[rules]]
kind = "encoding_normalize"
station_id = "A32046"
variants = ["Canal St\u00a0at\u00a0Causeway\u00a0St"]
canonical = "Canal St at Causeway St"
"#;
        let config = ReconcileConfig::from_toml_str(content).unwrap();

        assert_eq!(config.max_passes, 3);
        assert_eq!(config.sentinel_station_ids.len(), 2);
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].kind(), "conditional_reassign");
        assert_eq!(config.rules[1].kind(), "exact_replace");
        match &config.rules[2] {
            CorrectionRule::EncodingNormalize { variants, .. } => {
                assert!(variants[0].contains('\u{a0}'));
            }
            other => panic!("Expected encoding rule, got {:?}", other),
        }
        // Untouched sections keep defaults
        assert_eq!(config.ingest.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = ReconcileConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = ReconcileConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.rules, config.rules);
    }

    #[test]
    fn test_validate_rejects_degenerate_rules() {
        let config = ReconcileConfig::default()
            .with_rules(vec![CorrectionRule::exact_replace("Same St", "Same St")]);
        assert!(matches!(
            config.validate(),
            Err(ReconcileError::Configuration { .. })
        ));

        let config = ReconcileConfig::default().with_rules(vec![
            CorrectionRule::encoding_normalize("A1", Vec::<String>::new(), "Name"),
        ]);
        assert!(config.validate().is_err());

        let config = ReconcileConfig::default().with_sentinel_ids([""]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_path_on_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rules.toml");
        std::fs::write(&path, "max_passes = \"many\"").unwrap();

        match ReconcileConfig::from_file(&path) {
            Err(ReconcileError::RuleFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected RuleFile error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_layered_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rules.toml");
        std::fs::write(&path, "max_passes = 2\nrules = []\n").unwrap();

        let config = ReconcileConfig::load_layered(Some(path.as_path()), true).unwrap();
        assert_eq!(config.max_passes, 2);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_format_and_compression_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xlsx".parse::<OutputFormat>().is_err());
        assert_eq!(
            "none".parse::<CompressionAlgorithm>().unwrap(),
            CompressionAlgorithm::Uncompressed
        );
    }
}

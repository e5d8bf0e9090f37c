//! Command-line interface components.

use crate::config::{CompressionAlgorithm, MissingValuePolicy, OutputFormat, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

/// Exit status when residual conflicts remain under `--strict`
pub const EXIT_RESIDUAL_CONFLICTS: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "trip-reconciler")]
#[command(about = "Reconcile station identities in bike-share trip records")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Trip CSV file or directory of monthly trip files
    #[arg(value_name = "INPUT", required_unless_present = "print_default_rules")]
    pub input: Option<PathBuf>,

    /// Output file for the cleaned dataset (default: <input>-cleaned.<format> beside the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TOML rules file (default: the per-user rules file, if present)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Do not use the built-in correction rules when no rules file is found
    #[arg(long)]
    pub no_default_rules: bool,

    /// Sentinel station id to exclude; repeat to give several (replaces configured ids)
    #[arg(long = "sentinel", value_name = "STATION_ID")]
    pub sentinels: Vec<String>,

    /// Maximum number of correction passes
    #[arg(long)]
    pub max_passes: Option<usize>,

    /// Output format (parquet, csv)
    #[arg(long)]
    pub format: Option<String>,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long)]
    pub compression: Option<String>,

    /// Report file (default: <output>.report.json)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Drop rows with any missing field, not only missing station fields
    #[arg(long)]
    pub drop_incomplete: bool,

    /// Keep each pre-pass record set next to the output
    #[arg(long)]
    pub keep_snapshots: bool,

    /// Descend into sub-directories of the input
    #[arg(short, long)]
    pub recursive: bool,

    /// List station conflicts without correcting or writing the dataset
    #[arg(long)]
    pub check_only: bool,

    /// Print the built-in configuration as TOML and exit
    #[arg(long)]
    pub print_default_rules: bool,

    /// Exit with status 2 when conflicts remain after the last pass
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors; no progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Input path; present unless only printing the defaults
    pub fn input_path(&self) -> Result<PathBuf> {
        self.input
            .clone()
            .ok_or_else(|| ReconcileError::configuration("no input path given"))
    }

    /// Layered configuration: defaults, then rules file, then flags
    pub fn build_config(&self) -> Result<ReconcileConfig> {
        let mut config =
            ReconcileConfig::load_layered(self.rules.as_deref(), !self.no_default_rules)?;

        if let Some(max_passes) = self.max_passes {
            config.max_passes = max_passes;
        }
        if !self.sentinels.is_empty() {
            config.sentinel_station_ids = self.sentinels.clone();
        }
        if let Some(format) = &self.format {
            config.output.format = format.parse::<OutputFormat>()?;
        }
        if let Some(compression) = &self.compression {
            config.output.compression = compression.parse::<CompressionAlgorithm>()?;
        }
        if self.report.is_some() {
            config.output.report_path = self.report.clone();
        }
        if self.drop_incomplete {
            config.missing_value_policy = MissingValuePolicy::AnyField;
        }
        if self.keep_snapshots {
            config.keep_snapshots = true;
        }
        if self.recursive {
            config.ingest.recursive = true;
        }

        config.validate()?;
        debug!(
            "Configuration: {} rules, sentinels {:?}, max passes {}",
            config.rules.len(),
            config.sentinel_station_ids,
            config.max_passes
        );
        Ok(config)
    }
}

/// Initialize tracing on stderr; `RUST_LOG` overrides the flag-derived level
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trip_reconciler={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| ReconcileError::configuration(format!("cannot initialize logging: {}", e)))?;
    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_input_required_unless_printing_defaults() {
        assert!(Args::try_parse_from(["trip-reconciler"]).is_err());
        let args = parse(&["trip-reconciler", "--print-default-rules"]);
        assert!(args.input.is_none());
    }

    #[test]
    fn test_flags_override_rules_file() {
        let temp_dir = TempDir::new().unwrap();
        let rules = temp_dir.path().join("rules.toml");
        std::fs::write(&rules, "max_passes = 2\n").unwrap();
        let rules_arg = rules.to_string_lossy().to_string();

        let args = parse(&[
            "trip-reconciler",
            "trips",
            "--rules",
            &rules_arg,
            "--max-passes",
            "7",
            "--sentinel",
            "S32020",
            "--sentinel",
            "X00000",
            "--format",
            "csv",
            "--drop-incomplete",
        ]);
        let config = args.build_config().unwrap();

        assert_eq!(config.max_passes, 7);
        assert_eq!(config.sentinel_station_ids, vec!["S32020", "X00000"]);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.missing_value_policy, MissingValuePolicy::AnyField);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let args = parse(&["trip-reconciler", "trips", "--format", "xlsx"]);
        assert!(args.build_config().is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse(&["trip-reconciler", "x", "-v"]).get_log_level(), "debug");
        assert_eq!(parse(&["trip-reconciler", "x", "-q"]).get_log_level(), "warn");
        assert!(Args::try_parse_from(["trip-reconciler", "x", "-v", "-q"]).is_err());
    }
}

use anyhow::Context;
use clap::Parser;
use std::process;
use trip_reconciler::cli::{self, Args, EXIT_RESIDUAL_CONFLICTS};
use trip_reconciler::config::ReconcileConfig;
use trip_reconciler::processor::{DatasetProcessor, ProcessingOutcome};
use trip_reconciler::ReconcileError;

fn main() {
    let args = Args::parse();

    if args.print_default_rules {
        match ReconcileConfig::default().to_toml_string() {
            Ok(toml) => {
                print!("{}", toml);
                process::exit(0);
            }
            Err(error) => {
                eprintln!("Error: {}", error);
                process::exit(1);
            }
        }
    }

    if let Err(error) = cli::setup_logging(&args) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let strict = args.strict;
    let result = runtime.block_on(async {
        tokio::select! {
            result = run(args) => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(ReconcileError::Interrupted {
                    reason: "interrupted by user".to_string(),
                }
                .into())
            }
        }
    });

    match result {
        Ok(outcome) => {
            if strict && !outcome.is_clean() {
                eprintln!(
                    "{} station conflicts remain after {} pass(es)",
                    outcome.report.residual_conflicts.len(),
                    outcome.report.passes_run
                );
                process::exit(EXIT_RESIDUAL_CONFLICTS);
            }
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ProcessingOutcome> {
    let config = args.build_config().context("Failed to load configuration")?;
    let input = args.input_path()?;

    let mut processor = DatasetProcessor::new(input.clone(), args.output.clone())
        .with_context(|| format!("Cannot open input {}", input.display()))?
        .with_config(config)
        .with_check_only(args.check_only)
        .with_quiet(args.quiet);

    let outcome = processor
        .process()
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?;

    Ok(outcome)
}

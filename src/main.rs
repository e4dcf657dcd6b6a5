//! metricmatch command-line entry point
//!
//! Runs the conformance checks against a running service, or the offline
//! normalize/diff helpers on exposition files.

use clap::Parser;
use metricmatch::cli::{
    CheckSelection, Cli, Command, diff_files, filter_from_config, generate_config_template,
    normalize_file,
};
use metricmatch::{config::Config, metrics::Metrics, scenario::Scenario, telemetry};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Check {
        selection: CheckSelection::All,
        emit_metrics: false,
    });

    match command {
        Command::Config { output } => {
            let template = generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    eprintln!("Configuration template written to {}", path);
                }
                None => print!("{}", template),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Normalize { file, paths } => {
            telemetry::init("warn");
            let filter = filter_from_config(Path::new(&cli.config))?;
            println!("{}", normalize_file(&file, &filter, paths)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Diff { live, fixture } => {
            telemetry::init("warn");
            let filter = filter_from_config(Path::new(&cli.config))?;
            match diff_files(&live, &fixture, &filter) {
                Ok(normalized) => {
                    println!("Metric paths match ({} lines)", normalized.line_count());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_check_failure() => {
                    eprintln!("{}", e);
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Check {
            selection,
            emit_metrics,
        } => {
            let config = Config::from_file(&cli.config)?;
            telemetry::init(&config.observability.log_level);

            tracing::info!(
                service = %config.service.base_url,
                monitor = %config.monitor.base_url,
                "Running metrics conformance checks"
            );

            let metrics = Arc::new(Metrics::new()?);
            let scenario = Scenario::from_config(&config, Arc::clone(&metrics))?;
            let report = scenario.run(&selection.checks()).await;

            println!("{}", report);
            if emit_metrics {
                print!("{}", metrics.gather()?);
            }

            if report.all_passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

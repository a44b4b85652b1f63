//! Couchload - main entry point

use clap::Parser;
use couchload_common::logging::{init_logging, LogConfig, LogLevel};
use couchload_ingest::progress::ConsoleProgress;
use couchload_ingest::{Cli, CouchClient, Pipeline, Report};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit status for a run stopped by Ctrl-C
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout carries the report only
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {}", e);
            log_config
        },
    };

    // The import works without logging
    let _ = init_logging(&log_config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current batch");
            on_interrupt.cancel();
        }
    });

    match run(&cli, cancel).await {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: could not render report: {}", e);
                        process::exit(1);
                    },
                }
            } else {
                print!("{}", report.summary());
            }

            if report.cancelled {
                process::exit(EXIT_CANCELLED);
            }
        },
        Err(e) => {
            error!(error = %e, "Import failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    }
}

async fn run(cli: &Cli, cancel: CancellationToken) -> couchload_ingest::Result<Report> {
    let config = cli.config()?;
    let source = cli.source()?;

    let client = CouchClient::from_config(&config).map_err(|e| {
        couchload_ingest::IngestError::config(format!("could not build HTTP client: {}", e))
    })?;

    let progress: Arc<ConsoleProgress> = Arc::new(ConsoleProgress::new());

    Pipeline::new(&client, cli.db.clone(), source, config.pipeline_options())?
        .with_progress(progress)
        .with_cancellation(cancel)
        .run()
        .await
}

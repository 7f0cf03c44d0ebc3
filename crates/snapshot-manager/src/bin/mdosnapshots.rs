// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use clap::Parser;
use snapshot_manager::{
    config::{self, CONFIGS_DIR},
    doctl::DoctlProvider,
    engine::{EngineConfig, RetentionEngine},
    PRODUCER_NAME,
};
use snapshot_status::{
    hostname::get_hostname,
    logger::{self, LogOutputs, RotatingFile},
};
use std::{env, path::PathBuf, process::ExitCode, time::Duration};
use tracing::{debug, error, info};

const DEFAULT_LOG_FILE: &str = "mdosnapshots.log";

/// Manage DigitalOcean droplet snapshots.
#[derive(Debug, Parser)]
#[command(name = "mdosnapshots", version)]
struct Args {
    /// Configuration files to process, relative to the configuration directory.
    /// Defaults to every '.yaml' file in it.
    configs: Vec<String>,

    /// Enable verbose output to the console.
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = CONFIGS_DIR)]
    configs_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Overrides LOG_LEVEL.
    #[arg(long)]
    log_level: Option<String>,

    /// Pause between droplets.
    #[arg(long, default_value_t = 5)]
    resource_delay_secs: u64,

    /// Pause between failed deletion attempts.
    #[arg(long, default_value_t = 5)]
    delete_retry_delay_secs: u64,
}

fn fail(message: &str) -> ExitCode {
    error!("{message}");
    eprintln!("{message}");
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let log_level = args
        .log_level
        .clone()
        .or_else(|| env::var("LOG_LEVEL").ok())
        .map_or_else(|| default_level.to_string(), |level| level.to_lowercase());

    let log_file = match RotatingFile::with_defaults(&args.log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to open log file '{}': {e}",
                args.log_file.display()
            );
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger::init(
        &log_level,
        LogOutputs {
            file: Some(log_file),
            stdout: args.verbose,
        },
    ) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let provider = match DoctlProvider::locate() {
        Ok(provider) => provider,
        Err(e) => return fail(&e.to_string()),
    };
    debug!("Using doctl at {}", provider.binary().display());

    let resources = match config::load_resources(&args.configs_dir, &args.configs) {
        Ok(resources) => resources,
        Err(e) => return fail(&e.to_string()),
    };
    for resource in &resources {
        debug!("Loaded configuration: {resource:?}");
    }

    let mut engine_config = EngineConfig::new(PRODUCER_NAME, get_hostname());
    engine_config.resource_delay = Duration::from_secs(args.resource_delay_secs);
    engine_config.delete_retry_delay = Duration::from_secs(args.delete_retry_delay_secs);

    let engine = RetentionEngine::new(provider, engine_config);
    let reports = engine.run(&resources).await;
    for report in &reports {
        let total = report
            .snapshot_count
            .map_or_else(|| "unknown".to_string(), |count| count.to_string());
        info!(
            "Droplet '{}': {} (created: {}, deleted: {}, failed deletions: {}, total: {})",
            report.resource,
            report.outcome,
            report.created.as_deref().unwrap_or("none"),
            report.deleted.len(),
            report.failed_deletions.len(),
            total
        );
    }
    ExitCode::SUCCESS
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use clap::Parser;
use log_notifier::{
    config::{load_dotenv, NotifierConfig},
    cursor::CursorStore,
    dispatch::{Dispatcher, TelegramNotifier},
    format::{EventFilter, FilterPolicy},
    pipeline::StatusPipeline,
    tailer::LogTailer,
    watch::{run_watch_loop, LogWatcher},
};
use snapshot_status::logger::{self, LogOutputs, RotatingFile};
use std::{path::PathBuf, process::ExitCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const OWN_LOG_FILE: &str = "log2telegram.log";

/// Forward FINAL_STATUS lines from the snapshot log to Telegram.
#[derive(Debug, Parser)]
#[command(name = "log2telegram", version)]
struct Args {
    /// Process new lines once and exit instead of watching.
    #[arg(long)]
    once: bool,

    /// Log file to follow. Overrides LOG2TELEGRAM_LOG_FILE.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// State file. Overrides LOG2TELEGRAM_STATE_FILE.
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let env_file = load_dotenv(None);
    let mut config = match NotifierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(log_file) = args.log_file {
        config.log_file = log_file;
    }
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }

    let own_log = match RotatingFile::with_defaults(OWN_LOG_FILE) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to open '{OWN_LOG_FILE}', logging to stdout only: {e}");
            None
        }
    };
    if let Err(e) = logger::init(
        &config.log_level,
        LogOutputs {
            file: own_log,
            stdout: true,
        },
    ) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    if let Some(env_file) = env_file {
        debug!("Loaded environment from '{}'", env_file.display());
    }
    debug!("Configuration: {config:?}");

    let filter = EventFilter {
        policy: if config.only_failures {
            FilterPolicy::FailuresOnly
        } else {
            FilterPolicy::All
        },
        strip_preamble: config.strip_preamble,
    };
    let mut pipeline = StatusPipeline::new(
        LogTailer::new(&config.log_file),
        CursorStore::new(&config.state_file),
        filter,
        Dispatcher::new(TelegramNotifier::from_config(&config), config.message_delay),
    );

    if args.once {
        let report = pipeline.run_cycle().await;
        info!(
            "Read {} line(s), delivered {} message(s), {} failed",
            report.lines_read,
            report.delivered(),
            report.failed()
        );
        return ExitCode::SUCCESS;
    }

    let mut watcher = match LogWatcher::new(&config.log_file) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Monitoring '{}' for FINAL_STATUS lines",
        config.log_file.display()
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {e}"),
        }
    });

    run_watch_loop(&mut pipeline, watcher.events(), cancel).await;
    ExitCode::SUCCESS
}

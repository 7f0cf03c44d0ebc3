// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Continuous mode: file system notifications drive pipeline cycles.
//!
//! The watcher observes the log's parent directory rather than the file itself, so it keeps
//! working across rotation and while the file does not exist yet.

use crate::dispatch::Notifier;
use crate::pipeline::StatusPipeline;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Modified,
    Created,
    Removed,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("log file path '{}' has no file name", .0.display())]
    InvalidPath(PathBuf),
    #[error("failed to watch '{}': {source}", .path.display())]
    Notify {
        path: PathBuf,
        source: notify::Error,
    },
}

/// Maps a raw notification to an event about the followed file, if it concerns that file.
#[must_use]
pub fn classify(event: &Event, file_name: &OsString) -> Option<WatchEvent> {
    let concerns_file = event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()));
    if !concerns_file {
        return None;
    }
    match event.kind {
        EventKind::Create(_) => Some(WatchEvent::Created),
        EventKind::Modify(_) => Some(WatchEvent::Modified),
        EventKind::Remove(_) => Some(WatchEvent::Removed),
        _ => None,
    }
}

/// Owns the OS watcher and the channel its notifications arrive on.
pub struct LogWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<WatchEvent>,
}

impl LogWatcher {
    pub fn new(log_file: &Path) -> Result<Self, WatchError> {
        let file_name = log_file
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| WatchError::InvalidPath(log_file.to_path_buf()))?;
        let dir = match log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(watch_event) = classify(&event, &file_name) {
                    match tx.try_send(watch_event) {
                        // A full queue already guarantees another cycle.
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => debug!("Watch channel closed"),
                    }
                }
            }
            Err(e) => error!("Watch error: {e}"),
        })
        .map_err(|source| WatchError::Notify {
            path: dir.clone(),
            source,
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: dir.clone(),
                source,
            })?;
        info!("Watching '{}' for changes", dir.display());

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    pub fn events(&mut self) -> &mut mpsc::Receiver<WatchEvent> {
        &mut self.events
    }
}

/// Runs a catch-up cycle, then one cycle per burst of notifications until cancelled.
pub async fn run_watch_loop<N: Notifier>(
    pipeline: &mut StatusPipeline<N>,
    events: &mut mpsc::Receiver<WatchEvent>,
    cancel: CancellationToken,
) {
    pipeline.run_cycle().await;

    loop {
        let first = tokio::select! {
            () = cancel.cancelled() => {
                info!("Shutdown requested, stopping");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    warn!("Watch channel closed, stopping");
                    break;
                }
            },
        };

        // Coalesce everything already queued into a single cycle.
        let mut only_removed = first == WatchEvent::Removed;
        while let Ok(event) = events.try_recv() {
            only_removed &= event == WatchEvent::Removed;
        }
        if only_removed {
            info!("Log file was removed, waiting for it to be recreated");
            continue;
        }
        if first == WatchEvent::Created {
            info!("Log file has been created");
        }
        pipeline.run_cycle().await;
    }
}

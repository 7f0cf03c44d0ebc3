// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-droplet retention run: list, partition, create, delete, recount, report.

use crate::config::ManagedResource;
use crate::provider::{ProviderError, SnapshotProvider};
use crate::retention::{RetentionDecision, SnapshotRecord};
use chrono::{Local, NaiveDateTime};
use snapshot_status::retry::{retry, RetryStrategy};
use snapshot_status::{Outcome, StatusLine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Snapshot name suffix layout, in local wall-clock time.
pub const SNAPSHOT_NAME_FORMAT: &str = "%Y%m%d%H%M%S";
pub const DEFAULT_RESOURCE_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_DELETE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Source of local wall-clock time for snapshot names and status timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Destination of the terminal status line of each run.
pub trait StatusSink: Send + Sync {
    fn emit(&self, line: &StatusLine);
}

/// Writes status lines through the process logger at INFO, where the notifier picks them up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn emit(&self, line: &StatusLine) {
        info!("{line}");
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub producer: String,
    pub host: String,
    pub resource_delay: Duration,
    pub delete_retry_delay: Duration,
}

impl EngineConfig {
    #[must_use]
    pub fn new(producer: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            host: host.into(),
            resource_delay: DEFAULT_RESOURCE_DELAY,
            delete_retry_delay: DEFAULT_DELETE_RETRY_DELAY,
        }
    }
}

/// What happened to one resource during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub resource: String,
    pub created: Option<String>,
    pub deleted: Vec<String>,
    pub failed_deletions: Vec<String>,
    pub snapshot_count: Option<usize>,
    pub outcome: Outcome,
}

enum Deletion {
    Deleted,
    AlreadyGone,
}

pub struct RetentionEngine<P> {
    provider: P,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn StatusSink>,
}

impl<P: SnapshotProvider> RetentionEngine<P> {
    pub fn new(provider: P, config: EngineConfig) -> Self {
        Self {
            provider,
            config,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogStatusSink),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Manages each resource in turn, pausing between resources but not after the last one.
    pub async fn run(&self, resources: &[ManagedResource]) -> Vec<RunReport> {
        let mut reports = Vec::with_capacity(resources.len());
        for (index, resource) in resources.iter().enumerate() {
            reports.push(self.manage(resource).await);
            if index + 1 < resources.len() && !self.config.resource_delay.is_zero() {
                info!(
                    "Waiting for {} seconds before processing the next droplet...",
                    self.config.resource_delay.as_secs()
                );
                tokio::time::sleep(self.config.resource_delay).await;
            }
        }
        reports
    }

    /// Runs one retention pass for `resource` and emits its status line.
    pub async fn manage(&self, resource: &ManagedResource) -> RunReport {
        info!(
            "--- Managing droplet '{}' (ID: {}) ---",
            resource.name, resource.id
        );
        info!(
            "Configuration: Retain last {} snapshot(s). New snapshots will be named as '{}-<timestamp>'.",
            resource.retain_last_snapshots, resource.name
        );

        let existing = self.list(resource).await.unwrap_or_default();
        let decision = RetentionDecision::compute(&existing, resource.retain_last_snapshots);
        info!(
            "Droplet '{}': Identified {} snapshot(s) for deletion: {:?}",
            resource.name,
            decision.delete.len(),
            decision
                .delete
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
        );

        let created = self.create(resource).await;

        let mut deleted = Vec::new();
        let mut failed_deletions = Vec::new();
        if decision.delete.is_empty() {
            info!(
                "Droplet '{}': No snapshots to delete based on retention policy.",
                resource.name
            );
        }
        for snapshot in &decision.delete {
            if self.delete(resource, snapshot).await {
                deleted.push(snapshot.id.clone());
            } else {
                failed_deletions.push(snapshot.id.clone());
            }
        }

        let snapshot_count = self.list(resource).await.map(|snapshots| snapshots.len());
        if snapshot_count.is_none() {
            warn!(
                "Droplet '{}': Could not recount snapshots, reporting the count as unknown.",
                resource.name
            );
        }
        let outcome = if created.is_some() {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        self.sink.emit(&StatusLine {
            producer: self.config.producer.clone(),
            resource: resource.name.clone(),
            outcome,
            host: self.config.host.clone(),
            timestamp: self.clock.now(),
            artifact: created.clone(),
            snapshot_count,
        });
        info!(
            "--- Completed snapshot management for droplet '{}' ---",
            resource.name
        );

        RunReport {
            resource: resource.name.clone(),
            created,
            deleted,
            failed_deletions,
            snapshot_count,
            outcome,
        }
    }

    async fn list(&self, resource: &ManagedResource) -> Option<Vec<SnapshotRecord>> {
        match self.provider.list_snapshots(resource).await {
            Ok(snapshots) => Some(snapshots),
            Err(e) => {
                error!(
                    "Droplet '{}': No snapshots retrieved or an error occurred during retrieval: {e}",
                    resource.name
                );
                None
            }
        }
    }

    async fn create(&self, resource: &ManagedResource) -> Option<String> {
        let name = format!(
            "{}-{}",
            resource.name,
            self.clock.now().format(SNAPSHOT_NAME_FORMAT)
        );
        match self.provider.create_snapshot(resource, &name).await {
            Ok(()) => {
                info!(
                    "Droplet '{}': New snapshot created: {name}",
                    resource.name
                );
                Some(name)
            }
            Err(e) => {
                error!(
                    "Droplet '{}': Failed to create a new snapshot: {e}",
                    resource.name
                );
                None
            }
        }
    }

    /// Returns whether the snapshot is gone, either deleted now or already missing.
    async fn delete(&self, resource: &ManagedResource, snapshot: &SnapshotRecord) -> bool {
        let strategy =
            RetryStrategy::Fixed(resource.delete_retries, self.config.delete_retry_delay);
        let result = retry(&strategy, move |attempt| async move {
            match self.provider.delete_snapshot(resource, &snapshot.id).await {
                Ok(()) => Ok(Deletion::Deleted),
                Err(ProviderError::NotFound) => Ok(Deletion::AlreadyGone),
                Err(e) => {
                    error!(
                        "Droplet '{}': Attempt {attempt} failed to delete snapshot: {} ({e})",
                        resource.name, snapshot.name
                    );
                    Err(e)
                }
            }
        })
        .await;

        match result {
            Ok(retried) => {
                match retried.value {
                    Deletion::Deleted => info!(
                        "Droplet '{}': Snapshot deleted: {}",
                        resource.name, snapshot.name
                    ),
                    Deletion::AlreadyGone => warn!(
                        "Droplet '{}': Snapshot not found (likely already deleted): {}. Treating as successful deletion.",
                        resource.name, snapshot.name
                    ),
                }
                debug!("Deletion of {} took {} attempt(s)", snapshot.id, retried.attempts);
                true
            }
            Err(e) => {
                error!(
                    "Droplet '{}': Failed to delete snapshot after {} attempts: {}",
                    resource.name,
                    e.attempts,
                    snapshot.name
                );
                false
            }
        }
    }
}

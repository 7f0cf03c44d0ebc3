// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::ManagedResource;
use crate::retention::SnapshotRecord;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::process::ExitStatus;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("snapshot not found")]
    NotFound,
    #[error("command failed with {status}: {stderr}")]
    CommandFailed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("failed to run command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Cloud snapshot operations the retention engine depends on.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Snapshots belonging to `resource`, in the order the provider returned them.
    async fn list_snapshots(
        &self,
        resource: &ManagedResource,
    ) -> Result<Vec<SnapshotRecord>, ProviderError>;

    /// Takes a snapshot called `name` and waits for it to complete.
    async fn create_snapshot(
        &self,
        resource: &ManagedResource,
        name: &str,
    ) -> Result<(), ProviderError>;

    /// Deletes a snapshot. Returns [`ProviderError::NotFound`] when it is already gone.
    async fn delete_snapshot(
        &self,
        resource: &ManagedResource,
        snapshot_id: &str,
    ) -> Result<(), ProviderError>;
}

fn next_field(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((field, rest)) => Some((field, rest)),
        None => Some((input, "")),
    }
}

fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    // Some doctl versions print "2024-11-30 05:00:12 +0000 UTC".
    let prefix = value.get(..19)?;
    NaiveDateTime::parse_from_str(prefix, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses `ID Name CreatedAt` rows, keeping those whose name mentions the resource id or name.
///
/// Rows with an unparsable creation time are logged and left out.
#[must_use]
pub fn parse_snapshot_listing(output: &str, resource: &ManagedResource) -> Vec<SnapshotRecord> {
    let mut snapshots = Vec::new();
    for line in output.lines() {
        let Some((id, rest)) = next_field(line) else {
            continue;
        };
        let Some((name, rest)) = next_field(rest) else {
            continue;
        };
        let created_at = rest.trim();
        if created_at.is_empty() {
            continue;
        }
        if !name.contains(resource.id.as_str()) && !name.contains(resource.name.as_str()) {
            continue;
        }
        match parse_created_at(created_at) {
            Some(created_at) => {
                debug!(
                    "Droplet '{}': Snapshot found: {} (ID: {}) created at {}",
                    resource.name, name, id, created_at
                );
                snapshots.push(SnapshotRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    created_at,
                });
            }
            None => error!(
                "Droplet '{}': Invalid date format for snapshot '{}': {}",
                resource.name, name, created_at
            ),
        }
    }
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resource() -> ManagedResource {
        ManagedResource {
            id: "123456".to_string(),
            name: "web".to_string(),
            api_token: "token".to_string(),
            retain_last_snapshots: 2,
            delete_retries: 3,
        }
    }

    #[test]
    fn test_parse_listing_filters_by_id_or_name() {
        let output = "\
111  web-20241201000000     2024-12-01T00:00:00Z
222  db-20241201000000      2024-12-01T00:00:00Z
333  backup-123456-manual   2024-11-01T12:30:00Z
";
        let snapshots = parse_snapshot_listing(output, &resource());
        let ids: Vec<_> = snapshots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["111", "333"]);
        assert_eq!(
            snapshots[1].created_at,
            Utc.with_ymd_and_hms(2024, 11, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_listing_converts_offsets_to_utc() {
        let output = "111 web-a 2024-12-01T02:00:00+02:00\n";
        let snapshots = parse_snapshot_listing(output, &resource());
        assert_eq!(
            snapshots[0].created_at,
            Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_listing_accepts_space_separated_timestamps() {
        let output = "111 web-a 2024-12-01 00:00:00 +0000 UTC\n";
        let snapshots = parse_snapshot_listing(output, &resource());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            snapshots[0].created_at,
            Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_parse_listing_skips_bad_timestamps() {
        let output = "111 web-a yesterday\n222 web-b 2024-12-01T00:00:00Z\n333 web-c\n\n";
        let snapshots = parse_snapshot_listing(output, &resource());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, "222");
        assert!(logs_contain("Invalid date format for snapshot 'web-a'"));
    }
}

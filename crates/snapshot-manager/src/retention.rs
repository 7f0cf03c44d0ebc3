// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

/// A snapshot as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Which snapshots survive a retention pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetentionDecision {
    pub keep: Vec<SnapshotRecord>,
    pub delete: Vec<SnapshotRecord>,
}

impl RetentionDecision {
    /// Keeps the `retain` most recent snapshots and marks the rest for deletion.
    ///
    /// Snapshots with the same creation time keep their listing order.
    #[must_use]
    pub fn compute(snapshots: &[SnapshotRecord], retain: u32) -> Self {
        let mut ranked = snapshots.to_vec();
        ranked.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let retain = usize::try_from(retain).unwrap_or(usize::MAX).min(ranked.len());
        let delete = ranked.split_off(retain);
        Self {
            keep: ranked,
            delete,
        }
    }
}

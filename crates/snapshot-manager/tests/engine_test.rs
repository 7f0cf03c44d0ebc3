// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use snapshot_manager::config::ManagedResource;
use snapshot_manager::engine::{Clock, EngineConfig, RetentionEngine, StatusSink};
use snapshot_manager::provider::{ProviderError, SnapshotProvider};
use snapshot_manager::retention::SnapshotRecord;
use snapshot_status::{Outcome, StatusEvent, StatusLine};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    List,
    Create(String),
    Delete(String),
}

enum DeleteBehaviour {
    Ok,
    NotFound,
    Fail,
}

#[derive(Default)]
struct FakeProvider {
    snapshots: Mutex<Vec<SnapshotRecord>>,
    calls: Mutex<Vec<Call>>,
    fail_create: bool,
    fail_list: bool,
    delete_behaviour: Mutex<HashMap<String, VecDeque<DeleteBehaviour>>>,
}

impl FakeProvider {
    fn with_snapshots(snapshots: Vec<SnapshotRecord>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots),
            ..Default::default()
        }
    }

    fn script_delete(&self, id: &str, behaviour: Vec<DeleteBehaviour>) {
        self.delete_behaviour
            .lock()
            .unwrap()
            .insert(id.to_string(), behaviour.into());
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn delete_calls(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::Delete(id.to_string()))
            .count()
    }
}

fn failed() -> ProviderError {
    ProviderError::Spawn(io::Error::new(io::ErrorKind::Other, "boom"))
}

#[async_trait]
impl SnapshotProvider for FakeProvider {
    async fn list_snapshots(
        &self,
        _resource: &ManagedResource,
    ) -> Result<Vec<SnapshotRecord>, ProviderError> {
        self.calls.lock().unwrap().push(Call::List);
        if self.fail_list {
            return Err(failed());
        }
        Ok(self.snapshots.lock().unwrap().clone())
    }

    async fn create_snapshot(
        &self,
        _resource: &ManagedResource,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(Call::Create(name.to_string()));
        if self.fail_create {
            return Err(failed());
        }
        self.snapshots.lock().unwrap().push(SnapshotRecord {
            id: format!("new-{name}"),
            name: name.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        _resource: &ManagedResource,
        snapshot_id: &str,
    ) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(snapshot_id.to_string()));
        let behaviour = self
            .delete_behaviour
            .lock()
            .unwrap()
            .get_mut(snapshot_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(DeleteBehaviour::Ok);
        match behaviour {
            DeleteBehaviour::Ok => {
                self.snapshots
                    .lock()
                    .unwrap()
                    .retain(|s| s.id != snapshot_id);
                Ok(())
            }
            DeleteBehaviour::NotFound => Err(ProviderError::NotFound),
            DeleteBehaviour::Fail => Err(failed()),
        }
    }
}

struct FixedClock(NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<StatusLine>>);

impl StatusSink for RecordingSink {
    fn emit(&self, line: &StatusLine) {
        self.0.lock().unwrap().push(line.clone());
    }
}

fn resource(name: &str, retain: u32, delete_retries: u32) -> ManagedResource {
    ManagedResource {
        id: "123456".to_string(),
        name: name.to_string(),
        api_token: "token".to_string(),
        retain_last_snapshots: retain,
        delete_retries,
    }
}

fn snapshot(id: &str, day: u32) -> SnapshotRecord {
    SnapshotRecord {
        id: id.to_string(),
        name: format!("web-{id}"),
        created_at: Utc.with_ymd_and_hms(2024, 11, day, 0, 0, 0).unwrap(),
    }
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(
        NaiveDate::from_ymd_opt(2024, 12, 2)
            .unwrap()
            .and_hms_opt(13, 32, 34)
            .unwrap(),
    ))
}

fn engine<'a>(
    provider: &'a FakeProvider,
    sink: Arc<RecordingSink>,
) -> RetentionEngine<&'a FakeProvider> {
    let mut config = EngineConfig::new("mdosnapshots", "host-1");
    config.resource_delay = Duration::from_secs(5);
    config.delete_retry_delay = Duration::from_secs(5);
    RetentionEngine::new(provider, config)
        .with_clock(clock())
        .with_sink(sink)
}

#[async_trait]
impl<'a> SnapshotProvider for &'a FakeProvider {
    async fn list_snapshots(
        &self,
        resource: &ManagedResource,
    ) -> Result<Vec<SnapshotRecord>, ProviderError> {
        (**self).list_snapshots(resource).await
    }

    async fn create_snapshot(
        &self,
        resource: &ManagedResource,
        name: &str,
    ) -> Result<(), ProviderError> {
        (**self).create_snapshot(resource, name).await
    }

    async fn delete_snapshot(
        &self,
        resource: &ManagedResource,
        snapshot_id: &str,
    ) -> Result<(), ProviderError> {
        (**self).delete_snapshot(resource, snapshot_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn retain_two_of_four_deletes_two_oldest() {
    let provider = FakeProvider::with_snapshots(vec![
        snapshot("s1", 1),
        snapshot("s3", 3),
        snapshot("s2", 2),
        snapshot("s4", 4),
    ]);
    let sink = Arc::new(RecordingSink::default());

    let report = engine(&provider, sink.clone())
        .manage(&resource("web", 2, 3))
        .await;

    assert_eq!(report.created.as_deref(), Some("web-20241202133234"));
    assert_eq!(report.deleted, vec!["s2", "s1"]);
    assert!(report.failed_deletions.is_empty());
    assert_eq!(report.snapshot_count, Some(3));
    assert_eq!(report.outcome, Outcome::Success);

    // Create happens before deletes, recount comes last.
    let calls = provider.calls();
    assert_eq!(calls[0], Call::List);
    assert_eq!(calls[1], Call::Create("web-20241202133234".to_string()));
    assert_eq!(calls.last(), Some(&Call::List));

    let lines = sink.0.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0].to_string(),
        "FINAL_STATUS | mdosnapshots | web | SUCCESS | host-1 | 2024-12-02 13:32:34 | web-20241202133234 | 3 snapshots exist"
    );
}

#[tokio::test(start_paused = true)]
async fn not_found_counts_as_deleted_without_retry() {
    let provider = FakeProvider::with_snapshots(vec![snapshot("s1", 1), snapshot("s2", 2)]);
    provider.script_delete("s1", vec![DeleteBehaviour::NotFound]);
    let sink = Arc::new(RecordingSink::default());

    let start = Instant::now();
    let report = engine(&provider, sink)
        .manage(&resource("web", 1, 3))
        .await;

    assert_eq!(report.deleted, vec!["s1"]);
    assert_eq!(provider.delete_calls("s1"), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_is_retried_then_abandoned() {
    let provider = FakeProvider::with_snapshots(vec![snapshot("s1", 1), snapshot("s2", 2)]);
    provider.script_delete(
        "s1",
        vec![
            DeleteBehaviour::Fail,
            DeleteBehaviour::Fail,
            DeleteBehaviour::Fail,
        ],
    );
    let sink = Arc::new(RecordingSink::default());

    let start = Instant::now();
    let report = engine(&provider, sink.clone())
        .manage(&resource("web", 1, 3))
        .await;

    assert_eq!(provider.delete_calls("s1"), 3);
    assert!(report.deleted.is_empty());
    assert_eq!(report.failed_deletions, vec!["s1"]);
    // Two waits between three attempts.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    // Still reported as a success because the new snapshot exists.
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.snapshot_count, Some(3));
}

#[tokio::test(start_paused = true)]
async fn delete_succeeds_on_second_attempt() {
    let provider = FakeProvider::with_snapshots(vec![snapshot("s1", 1), snapshot("s2", 2)]);
    provider.script_delete("s1", vec![DeleteBehaviour::Fail, DeleteBehaviour::Ok]);
    let sink = Arc::new(RecordingSink::default());

    let report = engine(&provider, sink)
        .manage(&resource("web", 1, 3))
        .await;

    assert_eq!(provider.delete_calls("s1"), 2);
    assert_eq!(report.deleted, vec!["s1"]);
}

#[tokio::test(start_paused = true)]
async fn create_failure_reports_failure_and_still_prunes() {
    let provider = FakeProvider {
        fail_create: true,
        ..FakeProvider::with_snapshots(vec![snapshot("s1", 1), snapshot("s2", 2)])
    };
    let sink = Arc::new(RecordingSink::default());

    let report = engine(&provider, sink.clone())
        .manage(&resource("web", 1, 3))
        .await;

    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.created, None);
    assert_eq!(report.deleted, vec!["s1"]);
    assert_eq!(report.snapshot_count, Some(1));

    let line = sink.0.lock().unwrap()[0].to_string();
    let event = StatusEvent::parse(&line).unwrap();
    assert_eq!(event.outcome, "FAILURE");
    assert_eq!(event.artifact, "none");
    assert_eq!(event.summary, "1 snapshots exist");
}

#[tokio::test(start_paused = true)]
async fn listing_failure_deletes_nothing() {
    let provider = FakeProvider {
        fail_list: true,
        ..FakeProvider::with_snapshots(vec![snapshot("s1", 1), snapshot("s2", 2)])
    };
    let sink = Arc::new(RecordingSink::default());

    let report = engine(&provider, sink.clone())
        .manage(&resource("web", 0, 3))
        .await;

    assert!(report.deleted.is_empty());
    assert_eq!(report.snapshot_count, None);
    let line = sink.0.lock().unwrap()[0].to_string();
    assert_eq!(
        StatusEvent::parse(&line).unwrap().summary,
        "snapshot count unknown"
    );
    assert!(!provider
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Delete(_))));
}

#[tokio::test(start_paused = true)]
async fn pacing_delay_only_between_resources() {
    let provider = FakeProvider::default();
    let sink = Arc::new(RecordingSink::default());
    let resources = vec![
        resource("a", 1, 1),
        resource("b", 1, 1),
        resource("c", 1, 1),
    ];

    let start = Instant::now();
    let reports = engine(&provider, sink.clone()).run(&resources).await;

    assert_eq!(reports.len(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    let names: Vec<_> = sink
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|l| l.resource.clone())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

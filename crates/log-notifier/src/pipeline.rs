// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One read-filter-deliver-persist cycle over the followed log.

use crate::cursor::{Cursor, CursorStore};
use crate::dispatch::{DeliveryOutcome, Dispatcher, Notifier};
use crate::format::{EventFilter, Message};
use crate::tailer::LogTailer;
use tracing::{debug, error, info};

/// Counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub lines_read: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl CycleReport {
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

pub struct StatusPipeline<N> {
    tailer: LogTailer,
    store: CursorStore,
    filter: EventFilter,
    dispatcher: Dispatcher<N>,
    cursor: Cursor,
}

impl<N: Notifier> StatusPipeline<N> {
    /// Creates the pipeline, resuming from the persisted cursor.
    pub fn new(
        tailer: LogTailer,
        store: CursorStore,
        filter: EventFilter,
        dispatcher: Dispatcher<N>,
    ) -> Self {
        let cursor = store.load();
        Self {
            tailer,
            store,
            filter,
            dispatcher,
            cursor,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn dispatcher(&self) -> &Dispatcher<N> {
        &self.dispatcher
    }

    /// Processes everything appended since the last cycle.
    ///
    /// The cursor moves past every line read, whether or not it produced a message or the
    /// message was delivered, and is persisted once the batch is handled.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let batch = match self.tailer.read_batch(&self.cursor) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(
                    "Log file '{}' does not exist yet",
                    self.tailer.path().display()
                );
                return CycleReport::default();
            }
            Err(e) => {
                error!(
                    "Error reading log file '{}': {e}",
                    self.tailer.path().display()
                );
                return CycleReport::default();
            }
        };

        let messages: Vec<Message> = batch
            .lines
            .iter()
            .filter_map(|line| {
                debug!("Read line: {line}");
                self.filter.prepare(line)
            })
            .collect();
        let outcomes = self.dispatcher.dispatch(&messages).await;

        if batch.cursor != self.cursor {
            self.cursor = batch.cursor;
            if let Err(e) = self.store.save(&self.cursor) {
                error!("Failed to save state: {e}");
            }
        }

        let report = CycleReport {
            lines_read: batch.lines.len(),
            outcomes,
        };
        if !report.outcomes.is_empty() {
            info!(
                "Processed {} line(s): {} message(s) delivered, {} failed",
                report.lines_read,
                report.delivered(),
                report.failed()
            );
        }
        report
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Selects status lines from the log and renders them as Telegram Markdown.

use snapshot_status::preamble::strip_preamble;
use snapshot_status::status::is_status_line;
use snapshot_status::{StatusEvent, FINAL_STATUS_MARKER};
use tracing::{debug, warn};

/// A message ready to send, tagged with the formatting Telegram should apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Markdown(String),
    /// Sent without a parse mode, so Telegram shows the text as is.
    Plain(String),
}

impl Message {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Message::Markdown(text) | Message::Plain(text) => text,
        }
    }

    #[must_use]
    pub fn parse_mode(&self) -> Option<&'static str> {
        match self {
            Message::Markdown(_) => Some("Markdown"),
            Message::Plain(_) => None,
        }
    }
}

/// Which well-formed status lines are forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    #[default]
    All,
    /// Drop lines whose outcome is success.
    FailuresOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub policy: FilterPolicy,
    pub strip_preamble: bool,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            policy: FilterPolicy::All,
            strip_preamble: true,
        }
    }
}

impl EventFilter {
    /// Turns a raw log line into the message to send, if any.
    ///
    /// Malformed status lines are forwarded as their raw text, unformatted.
    #[must_use]
    pub fn prepare(&self, line: &str) -> Option<Message> {
        let line = line.trim();
        let text = if self.strip_preamble {
            strip_preamble(line)
        } else {
            line
        };
        if !is_status_line(text) {
            return None;
        }

        match StatusEvent::parse(text) {
            Ok(event) => {
                if self.policy == FilterPolicy::FailuresOnly && event.is_success() {
                    debug!("Skipping successful status for '{}'", event.resource);
                    return None;
                }
                Some(Message::Markdown(render(&event)))
            }
            Err(e) => {
                warn!("Unexpected {FINAL_STATUS_MARKER} format ({e}): {text}");
                Some(Message::Plain(text.to_string()))
            }
        }
    }
}

/// Title line followed by one bold label and monospace value per field.
#[must_use]
pub fn render(event: &StatusEvent) -> String {
    format!(
        "*{FINAL_STATUS_MARKER}*\n\
         *Script:* `{}`\n\
         *Droplet:* `{}`\n\
         *Status:* `{}`\n\
         *Hostname:* `{}`\n\
         *Timestamp:* `{}`\n\
         *Snapshot:* `{}`\n\
         *Total Snapshots:* `{}`",
        event.producer,
        event.resource,
        event.outcome,
        event.host,
        event.timestamp,
        event.artifact,
        event.summary,
    )
}

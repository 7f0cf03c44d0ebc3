// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Marker opening every terminal status line.
pub const FINAL_STATUS_MARKER: &str = "FINAL_STATUS";
/// Number of pipe-delimited fields in a well-formed status line, marker included.
pub const STATUS_FIELD_COUNT: usize = 8;
/// Artifact name written when no snapshot was created.
pub const NO_ARTIFACT: &str = "none";
/// Timestamp layout of the status line.
pub const STATUS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FIELD_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("success") {
            Ok(Outcome::Success)
        } else if s.eq_ignore_ascii_case("failure") {
            Ok(Outcome::Failure)
        } else {
            Err(StatusParseError::UnknownOutcome(s.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusParseError {
    #[error("line does not start with the {marker} marker", marker = FINAL_STATUS_MARKER)]
    MissingMarker,
    #[error("expected {expected} fields, found {0}", expected = STATUS_FIELD_COUNT)]
    FieldCount(usize),
    #[error("unknown outcome '{0}'")]
    UnknownOutcome(String),
}

/// Terminal status of one retention run, as written by the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub producer: String,
    pub resource: String,
    pub outcome: Outcome,
    pub host: String,
    pub timestamp: NaiveDateTime,
    pub artifact: Option<String>,
    /// `None` when the final listing failed.
    pub snapshot_count: Option<usize>,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{FINAL_STATUS_MARKER} | {} | {} | {} | {} | {} | {} | ",
            self.producer,
            self.resource,
            self.outcome,
            self.host,
            self.timestamp.format(STATUS_TIMESTAMP_FORMAT),
            self.artifact.as_deref().unwrap_or(NO_ARTIFACT),
        )?;
        match self.snapshot_count {
            Some(count) => write!(f, "{count} snapshots exist"),
            None => f.write_str("snapshot count unknown"),
        }
    }
}

/// Fields of a status line as read back from the log.
///
/// Values are kept as text: the consumer only renders them, and a line written by an
/// older or foreign producer must not be rejected over a timestamp layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub producer: String,
    pub resource: String,
    pub outcome: String,
    pub host: String,
    pub timestamp: String,
    pub artifact: String,
    pub summary: String,
}

impl StatusEvent {
    /// Splits a status line into its fields. The marker comparison is case-insensitive.
    pub fn parse(line: &str) -> Result<Self, StatusParseError> {
        let line = line.trim();
        if !is_status_line(line) {
            return Err(StatusParseError::MissingMarker);
        }
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
        let [_, producer, resource, outcome, host, timestamp, artifact, summary] =
            fields.as_slice()
        else {
            return Err(StatusParseError::FieldCount(fields.len()));
        };
        Ok(StatusEvent {
            producer: (*producer).to_string(),
            resource: (*resource).to_string(),
            outcome: (*outcome).to_string(),
            host: (*host).to_string(),
            timestamp: (*timestamp).to_string(),
            artifact: (*artifact).to_string(),
            summary: (*summary).to_string(),
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome.parse::<Outcome>(), Ok(Outcome::Success))
    }
}

/// True when `line` opens with the status marker, in any letter case.
#[must_use]
pub fn is_status_line(line: &str) -> bool {
    let line = line.trim_start();
    let Some(head) = line.get(..FINAL_STATUS_MARKER.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(FINAL_STATUS_MARKER) {
        return false;
    }
    // Reject longer words such as "FINAL_STATUSES".
    line[FINAL_STATUS_MARKER.len()..]
        .chars()
        .next()
        .map_or(true, |c| c == FIELD_SEPARATOR || c.is_whitespace())
}

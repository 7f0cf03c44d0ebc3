// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logger preamble handling.
//!
//! Lines written through [`crate::logger::Formatter`] look like
//!
//! ```text
//! 2024-12-02 13:32:34,512 - INFO - FINAL_STATUS | mdosnapshots | ...
//! ```
//!
//! The consumer strips everything up to the message before matching the status marker.

/// Separator between the timestamp, the level and the message.
pub const PREAMBLE_DELIMITER: &str = " - ";

const LEVEL_NAMES: [&str; 7] = [
    "TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL",
];

/// Returns the message part of a logger line, or the whole line when it carries no preamble.
///
/// A preamble is only recognised when it starts with a digit and its second segment is a
/// known level name, so status lines that happen to contain `" - "` are left untouched.
#[must_use]
pub fn strip_preamble(line: &str) -> &str {
    let mut parts = line.splitn(3, PREAMBLE_DELIMITER);
    let (Some(timestamp), Some(level), Some(message)) = (parts.next(), parts.next(), parts.next())
    else {
        return line;
    };
    let looks_like_timestamp = timestamp
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    let level = level.trim();
    if looks_like_timestamp && LEVEL_NAMES.iter().any(|l| l.eq_ignore_ascii_case(level)) {
        message
    } else {
        line
    }
}

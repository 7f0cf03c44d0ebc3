// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared contract between the snapshot manager (producer) and the log notifier (consumer).
//!
//! The two binaries only communicate through an append-only log file. This crate owns
//! everything both sides must agree on:
//!
//! - [`status`]: the `FINAL_STATUS` line written once per resource run, and its parser
//! - [`preamble`]: the `<timestamp> - <LEVEL> - ` prefix the logger puts in front of it
//! - [`logger`]: the tracing formatter and rotating file writer that produce that prefix
//! - [`retry`]: the retry strategy used for snapshot deletion and message delivery
//! - [`hostname`]: host identity reported in status lines

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod hostname;
pub mod logger;
pub mod preamble;
pub mod retry;
pub mod status;

pub use status::{Outcome, StatusEvent, StatusLine, StatusParseError, FINAL_STATUS_MARKER};

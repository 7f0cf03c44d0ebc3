// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Follows the snapshot manager's log file and forwards its `FINAL_STATUS` lines to a
//! Telegram chat.
//!
//! A [`pipeline::StatusPipeline`] cycle reads the lines appended since the persisted cursor,
//! turns status lines into Markdown messages, delivers them in order and then saves the new
//! cursor. Cycles run once ([`pipeline::StatusPipeline::run_cycle`]) or whenever the file
//! changes ([`watch::run_watch_loop`]).

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod format;
pub mod http;
pub mod pipeline;
pub mod tailer;
pub mod watch;

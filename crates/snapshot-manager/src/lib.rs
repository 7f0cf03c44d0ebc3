// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Snapshot retention for DigitalOcean droplets.
//!
//! For every configured droplet the [`engine::RetentionEngine`] lists existing snapshots,
//! decides which ones fall outside the retention window, takes a new snapshot, deletes the
//! superseded ones and writes a single `FINAL_STATUS` line summarising the run. The status
//! line is what the log notifier forwards.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod doctl;
pub mod engine;
pub mod provider;
pub mod retention;

/// Producer name written into status lines.
pub const PRODUCER_NAME: &str = "mdosnapshots";

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname detection for status lines.

use std::env;
use tracing::warn;

/// Environment variable overriding the detected hostname.
pub const HOSTNAME_OVERRIDE_ENV: &str = "SNAPSHOT_HOSTNAME";

/// Get the host identity written into status lines.
///
/// 1. `SNAPSHOT_HOSTNAME` environment variable, if set and non-empty
/// 2. System node name via `gethostname()`
/// 3. `"unknown"`
#[must_use]
pub fn get_hostname() -> String {
    if let Ok(hostname) = env::var(HOSTNAME_OVERRIDE_ENV) {
        if !hostname.trim().is_empty() {
            return hostname.trim().to_string();
        }
    }

    if let Some(hostname) = system_hostname() {
        return hostname;
    }

    warn!("Could not determine hostname, using 'unknown'");
    "unknown".to_string()
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name
            .to_str()
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!("Failed to get system hostname: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    env::var("COMPUTERNAME").ok().filter(|name| !name.is_empty())
}

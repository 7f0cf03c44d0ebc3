// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`SnapshotProvider`] backed by the `doctl` command-line client.

use crate::config::{mask_token, ConfigError, ManagedResource};
use crate::provider::{parse_snapshot_listing, ProviderError, SnapshotProvider};
use crate::retention::SnapshotRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

const DEFAULT_DOCTL_PATH: &str = "/usr/local/bin/doctl";
const TOKEN_ENV: &str = "DIGITALOCEAN_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct DoctlProvider {
    binary: PathBuf,
}

impl DoctlProvider {
    #[must_use]
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Finds `doctl` on `PATH`, falling back to the usual install location.
    pub fn locate() -> Result<Self, ConfigError> {
        if let Ok(path) = which::which("doctl") {
            return Ok(Self::new(path));
        }
        let fallback = Path::new(DEFAULT_DOCTL_PATH);
        if fallback.is_file() {
            return Ok(Self::new(fallback.to_path_buf()));
        }
        Err(ConfigError::ProviderNotFound)
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: &[&str], token: &str) -> Result<String, ProviderError> {
        info!(
            "Executing command: {} {} --access-token {}",
            self.binary.display(),
            args.join(" "),
            mask_token(token)
        );
        let output = Command::new(&self.binary)
            .args(args)
            .arg("--access-token")
            .arg(token)
            .env(TOKEN_ENV, token)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() {
            if !stderr.is_empty() {
                warn!("Command stderr: {stderr}");
            }
            return Ok(stdout);
        }

        Err(ProviderError::CommandFailed {
            status: output.status,
            stdout,
            stderr,
        })
    }
}

/// Whether doctl's output reports an HTTP 404 or a missing resource.
///
/// Only a standalone `404` token counts, so ids and request ids containing those digits
/// do not.
fn is_not_found(output: &str) -> bool {
    output.to_ascii_lowercase().contains("not found")
        || output
            .split_whitespace()
            .any(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()) == "404")
}

#[async_trait]
impl SnapshotProvider for DoctlProvider {
    async fn list_snapshots(
        &self,
        resource: &ManagedResource,
    ) -> Result<Vec<SnapshotRecord>, ProviderError> {
        let output = self
            .run(
                &[
                    "compute",
                    "snapshot",
                    "list",
                    "--resource",
                    "droplet",
                    "--format",
                    "ID,Name,CreatedAt",
                    "--no-header",
                ],
                &resource.api_token,
            )
            .await?;
        Ok(parse_snapshot_listing(&output, resource))
    }

    async fn create_snapshot(
        &self,
        resource: &ManagedResource,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.run(
            &[
                "compute",
                "droplet-action",
                "snapshot",
                &resource.id,
                "--snapshot-name",
                name,
                "--wait",
            ],
            &resource.api_token,
        )
        .await
        .map(|_| ())
    }

    async fn delete_snapshot(
        &self,
        resource: &ManagedResource,
        snapshot_id: &str,
    ) -> Result<(), ProviderError> {
        let result = self
            .run(
                &["compute", "snapshot", "delete", snapshot_id, "--force"],
                &resource.api_token,
            )
            .await;
        match result {
            // doctl can report a missing snapshot on stdout while still exiting cleanly.
            Ok(stdout) if is_not_found(&stdout) => Err(ProviderError::NotFound),
            Ok(_) => Ok(()),
            Err(ProviderError::CommandFailed { stdout, stderr, .. })
                if is_not_found(&stdout) || is_not_found(&stderr) =>
            {
                Err(ProviderError::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}

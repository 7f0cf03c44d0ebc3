// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-droplet YAML configuration.
//!
//! Each file under the configuration directory describes one droplet:
//!
//! ```yaml
//! droplet:
//!   id: "123456789"
//!   name: example.com
//!   api_token: dop_v1_...
//!   retain_last_snapshots: 3
//!   delete_retries: 3
//! ```
//!
//! Any problem here is fatal: nothing is touched until every file loads and validates.

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default directory holding the droplet configuration files.
pub const CONFIGS_DIR: &str = "configs";

const CONFIG_EXTENSION: &str = "yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The configuration directory '{}' does not exist.", .0.display())]
    MissingDirectory(PathBuf),
    #[error("No '.yaml' configuration files found in the '{}' directory.", .0.display())]
    NoConfigFiles(PathBuf),
    #[error("Configuration file '{}' does not exist.", .0.display())]
    MissingFile(PathBuf),
    #[error("Error parsing configuration file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Invalid '{field}' in '{}': {reason}", .path.display())]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
    #[error("Failed to read configuration directory '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("doctl command not found. Please ensure it is installed and accessible.")]
    ProviderNotFound,
}

/// A droplet whose snapshots are managed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedResource {
    #[serde(deserialize_with = "deserialize_string_or_int")]
    pub id: String,
    pub name: String,
    pub api_token: String,
    pub retain_last_snapshots: u32,
    pub delete_retries: u32,
}

impl fmt::Debug for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_token", &mask_token(&self.api_token))
            .field("retain_last_snapshots", &self.retain_last_snapshots)
            .field("delete_retries", &self.delete_retries)
            .finish()
    }
}

impl ManagedResource {
    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::InvalidField {
            path: path.to_path_buf(),
            field,
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id", "must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.api_token.trim().is_empty() {
            return Err(invalid("api_token", "must not be empty"));
        }
        if self.delete_retries == 0 {
            return Err(invalid("delete_retries", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct ResourceFile {
    droplet: ManagedResource,
}

/// Shortens a credential to its first and last six characters for logging.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => Ok(s),
        StringOrInt::Int(n) => Ok(n.to_string()),
    }
}

/// Loads and validates a single droplet configuration file.
pub fn load_resource(path: &Path) -> Result<ManagedResource, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    let file: ResourceFile = Figment::new()
        .merge(Yaml::file(path))
        .extract()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    file.droplet.validate(path)?;
    Ok(file.droplet)
}

/// Resolves which configuration files to load.
///
/// Explicit names are taken relative to `dir`. Without any, every `*.yaml` file in `dir` is
/// used, in alphabetical order.
pub fn resolve_config_paths(
    dir: &Path,
    requested: &[String],
) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingDirectory(dir.to_path_buf()));
    }
    if !requested.is_empty() {
        return Ok(requested.iter().map(|name| dir.join(name)).collect());
    }

    let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == CONFIG_EXTENSION)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ConfigError::NoConfigFiles(dir.to_path_buf()));
    }
    Ok(paths)
}

/// Loads every requested droplet configuration, failing on the first invalid one.
pub fn load_resources(
    dir: &Path,
    requested: &[String],
) -> Result<Vec<ManagedResource>, ConfigError> {
    resolve_config_paths(dir, requested)?
        .iter()
        .map(|path| load_resource(path))
        .collect()
}

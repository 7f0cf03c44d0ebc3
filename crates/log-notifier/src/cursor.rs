// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Persisted read position in the followed log file.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("state file '{}': {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("state file '{}' is not valid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Identifies a file independently of its name, so a rotated log is told apart from its
/// replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    #[must_use]
    pub fn of(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub identity: Option<FileIdentity>,
    pub offset: u64,
}

#[derive(Serialize, Deserialize)]
struct CursorRecord {
    #[serde(default)]
    device: Option<u64>,
    #[serde(default)]
    inode: Option<u64>,
    #[serde(default)]
    position: u64,
}

impl From<&Cursor> for CursorRecord {
    fn from(cursor: &Cursor) -> Self {
        Self {
            device: cursor.identity.map(|id| id.device),
            inode: cursor.identity.map(|id| id.inode),
            position: cursor.offset,
        }
    }
}

impl From<CursorRecord> for Cursor {
    fn from(record: CursorRecord) -> Self {
        let identity = match (record.device, record.inode) {
            (Some(device), Some(inode)) => Some(FileIdentity { device, inode }),
            _ => None,
        };
        Self {
            identity,
            offset: record.position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved cursor. A missing or unreadable state file starts from the beginning.
    #[must_use]
    pub fn load(&self) -> Cursor {
        match self.try_load() {
            Ok(Some(cursor)) => {
                debug!(
                    "Loaded state: identity={:?}, position={}",
                    cursor.identity, cursor.offset
                );
                cursor
            }
            Ok(None) => {
                debug!(
                    "No state file at '{}', starting from the beginning",
                    self.path.display()
                );
                Cursor::default()
            }
            Err(e) => {
                warn!("Failed to load state, starting from the beginning: {e}");
                Cursor::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<Cursor>, CursorError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CursorError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let record: CursorRecord =
            serde_json::from_str(&contents).map_err(|source| CursorError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(record.into()))
    }

    /// Replaces the state file atomically: write a sibling, sync it, rename it over.
    pub fn save(&self, cursor: &Cursor) -> Result<(), CursorError> {
        let io_err = |source| CursorError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec(&CursorRecord::from(cursor)).map_err(|source| {
            CursorError::Json {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(
            "Saved state: identity={:?}, position={}",
            cursor.identity, cursor.offset
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

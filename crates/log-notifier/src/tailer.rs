// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::cursor::{Cursor, FileIdentity};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete lines appended since the last cursor, and the cursor just past them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub lines: Vec<String>,
    pub cursor: Cursor,
    /// The file was replaced or truncated since the previous cursor.
    pub reset: bool,
}

/// Reads a log file incrementally, following rotation.
#[derive(Debug, Clone)]
pub struct LogTailer {
    path: PathBuf,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every complete line after `cursor`. Returns `None` when the file does not exist.
    ///
    /// A trailing line without a newline is left for the next read. When the file's identity
    /// changed, or it is shorter than the cursor, reading restarts from the beginning.
    pub fn read_batch(&self, cursor: &Cursor) -> io::Result<Option<Batch>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let metadata = file.metadata()?;
        let identity = FileIdentity::of(&metadata);

        let mut offset = cursor.offset;
        let mut reset = false;
        if identity != cursor.identity {
            info!(
                "Log file '{}' is new or was rotated, reading from the beginning",
                self.path.display()
            );
            offset = 0;
            reset = true;
        } else if metadata.len() < offset {
            info!(
                "Log file '{}' was truncated, reading from the beginning",
                self.path.display()
            );
            offset = 0;
            reset = true;
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let consumed = buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        let lines: Vec<String> = match buf[..consumed].strip_suffix(b"\n") {
            Some(complete) => complete
                .split(|b| *b == b'\n')
                .map(|line| {
                    let line = line.strip_suffix(b"\r").unwrap_or(line);
                    String::from_utf8_lossy(line).into_owned()
                })
                .collect(),
            None => Vec::new(),
        };

        debug!(
            "Read {} line(s) from '{}' at offset {offset}",
            lines.len(),
            self.path.display()
        );
        Ok(Some(Batch {
            lines,
            cursor: Cursor {
                identity,
                offset: offset + consumed as u64,
            },
            reset,
        }))
    }
}

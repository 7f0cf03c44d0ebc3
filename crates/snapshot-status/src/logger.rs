// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log output shared by both binaries.
//!
//! Every event is written as
//!
//! ```text
//! 2024-12-02 13:32:34,512 - INFO - message field=value
//! ```
//!
//! which is the preamble [`crate::preamble::strip_preamble`] removes on the reading side.
//! The snapshot manager's log file is the hand-off point to the notifier, so it is written
//! through [`RotatingFile`]: rotation renames the file aside and opens a fresh one, giving
//! the reader a new file identity to detect.

use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, MakeWriter,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Size at which the log file is rotated.
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
/// Number of rotated files kept next to the live one.
pub const DEFAULT_BACKUP_COUNT: usize = 5;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Formats events as `<timestamp> - <LEVEL> - <message>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format(TIMESTAMP_FORMAT),
            level_name(*event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Append-only log file that rotates by size, keeping `path.1` .. `path.N` backups.
#[derive(Debug, Clone)]
pub struct RotatingFile {
    state: Arc<Mutex<RotatingState>>,
}

#[derive(Debug)]
struct RotatingState {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingFile {
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            state: Arc::new(Mutex::new(RotatingState {
                path,
                file,
                written,
                max_bytes,
                backup_count,
            })),
        })
    }

    pub fn with_defaults(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path, DEFAULT_MAX_BYTES, DEFAULT_BACKUP_COUNT)
    }

    fn lock(&self) -> MutexGuard<'_, RotatingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl RotatingState {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backup_count > 0 {
            for index in (1..self.backup_count).rev() {
                let from = backup_path(&self.path, index);
                if from.exists() {
                    fs::rename(&from, backup_path(&self.path, index + 1))?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        } else {
            fs::remove_file(&self.path)?;
        }
        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

/// Writer handed out per event; holds the file lock for the duration of one record.
pub struct RotatingWriter<'a> {
    state: MutexGuard<'a, RotatingState>,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let state = &mut *self.state;
        if state.max_bytes > 0
            && state.written > 0
            && state.written + buf.len() as u64 > state.max_bytes
        {
            state.rotate()?;
        }
        let n = state.file.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { state: self.lock() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("could not parse log level '{0}'")]
    InvalidLevel(String),
    #[error("failed to install the log subscriber: {0}")]
    Install(String),
}

/// Where log output goes.
#[derive(Debug, Default)]
pub struct LogOutputs {
    pub file: Option<RotatingFile>,
    pub stdout: bool,
}

/// Installs the global subscriber writing to the given outputs at `level`.
///
/// Noisy HTTP client internals are switched off regardless of the level.
pub fn init(level: &str, outputs: LogOutputs) -> Result<(), LoggingError> {
    let env_filter = format!("h2=off,hyper=off,hyper_util=off,rustls=off,{level}");
    let filter =
        EnvFilter::try_new(env_filter).map_err(|_| LoggingError::InvalidLevel(level.to_string()))?;

    let file_layer = outputs.file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(Formatter)
            .with_ansi(false)
            .with_writer(file)
    });
    let stdout_layer = outputs.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(Formatter)
            .with_ansi(false)
            .with_writer(io::stdout)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing::{info, warn};

    #[test]
    fn test_formatter_writes_preamble() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.log");
        let file = RotatingFile::with_defaults(&path).unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(file)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            info!("FINAL_STATUS | a | b");
            warn!("careful");
        });

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - FINAL_STATUS | a | b"));
        assert!(lines[1].ends_with(" - WARNING - careful"));
        assert_eq!(
            crate::preamble::strip_preamble(lines[0]),
            "FINAL_STATUS | a | b"
        );
    }

    #[test]
    fn test_rotation_renames_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotating.log");
        let file = RotatingFile::open(&path, 16, 2).unwrap();

        for line in ["0123456789\n", "abcdefghij\n", "ABCDEFGHIJ\n", "klmnopqrst\n"] {
            file.make_writer().write_all(line.as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "klmnopqrst\n");
        assert_eq!(
            fs::read_to_string(backup_path(&path, 1)).unwrap(),
            "ABCDEFGHIJ\n"
        );
        assert_eq!(
            fs::read_to_string(backup_path(&path, 2)).unwrap(),
            "abcdefghij\n"
        );
        assert!(!backup_path(&path, 3).exists());
    }

    #[test]
    fn test_existing_file_size_counts_towards_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.log");
        fs::write(&path, "already here\n").unwrap();

        let file = RotatingFile::open(&path, 16, 1).unwrap();
        file.make_writer().write_all(b"next line\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "next line\n");
        assert_eq!(
            fs::read_to_string(backup_path(&path, 1)).unwrap(),
            "already here\n"
        );
    }
}

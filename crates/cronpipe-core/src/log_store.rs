//! Append-only execution log shared by the daemon (sole writer) and the
//! control surfaces (readers, clear).
//!
//! Every access holds an `flock` on the log file for the duration of one
//! syscall-sized operation: appends and `clear` lock exclusively, reads lock
//! shared. A reader therefore sees either the whole file before a clear or
//! the empty file after it, never a half-truncated one.

use crate::error::Result;
use crate::io::lock_file;
use chrono::{DateTime, NaiveDateTime, Utc};
use nix::fcntl::FlockArg;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Render one log record: `[2025-01-31 09:15:02.113] message`.
/// Embedded newlines are flattened so a record is always exactly one line.
pub fn format_record(at: DateTime<Utc>, message: &str) -> String {
    let flat: String = message
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("[{}] {}", at.format(TIMESTAMP_FORMAT), flat)
}

/// Extract the timestamp of a record produced by [`format_record`].
pub fn record_timestamp(line: &str) -> Option<NaiveDateTime> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    NaiveDateTime::parse_from_str(&rest[..end], TIMESTAMP_FORMAT).ok()
}

/// Last `n` lines of `text`, newline-terminated, in original order.
pub fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    let mut out = String::new();
    for line in &lines[start..] {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped record. Returns the line as written.
    pub fn append(&self, message: &str) -> Result<String> {
        let line = format_record(Utc::now(), message);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut file = lock_file(file, FlockArg::LockExclusive)?;
        let mut buf = line.clone().into_bytes();
        buf.push(b'\n');
        file.write_all(&buf)?;
        Ok(line)
    }

    /// Full contents of the log. A missing log reads as empty.
    pub fn read_all(&self) -> Result<String> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        let mut file = lock_file(file, FlockArg::LockShared)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// At most the final `n` lines of the log.
    pub fn read_last(&self, n: usize) -> Result<String> {
        let all = self.read_all()?;
        Ok(last_lines(&all, n))
    }

    /// Text appended since byte `offset`, plus the offset to resume from.
    /// A log shorter than `offset` has been cleared; reading restarts at 0.
    pub fn read_from(&self, offset: u64) -> Result<(String, u64)> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((String::new(), 0)),
            Err(e) => return Err(e.into()),
        };
        let mut file = lock_file(file, FlockArg::LockShared)?;
        let start = if file.metadata()?.len() < offset {
            0
        } else {
            offset
        };
        file.seek(SeekFrom::Start(start))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let next = start + bytes.len() as u64;
        Ok((String::from_utf8_lossy(&bytes).into_owned(), next))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Truncate the log to empty. Returns false when there was no log file.
    pub fn clear(&self) -> Result<bool> {
        let file = match OpenOptions::new().write(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let file = lock_file(file, FlockArg::LockExclusive)?;
        file.set_len(0)?;
        file.sync_all()?;
        Ok(true)
    }
}

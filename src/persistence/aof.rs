//! Append-Only File
//!
//! Every mutating request is written to the log in its wire encoding, exactly
//! as the client sent it, and flushed to stable storage before the command
//! takes effect. On startup the log is replayed through the same codec to
//! rebuild the store.
//!
//! ## File Layout
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n ...
//! └──────────── record 1 ────────────────┘└──────── record 2 ──────┘
//! ```
//!
//! There is no header, checksum or index. Records are self-delimiting because
//! RESP frames are. A crash mid-write leaves at most one torn frame at the end,
//! which replay detects and `open_after_replay` cuts off.
//!
//! A write or sync that fails while the process keeps running is rolled back
//! to the end of the last complete record, so later records never sit behind
//! a torn one. If the rollback itself fails the log refuses further appends.

use crate::protocol::{parse_message, RespValue};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised while writing or reading the log.
#[derive(Debug, Error)]
pub enum AofError {
    #[error("append-only file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("append-only file {path} may hold a torn record and no longer accepts appends")]
    Poisoned { path: PathBuf },
}

impl AofError {
    fn io(path: &Path, source: io::Error) -> Self {
        AofError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type AofResult<T> = Result<T, AofError>;

/// Outcome of replaying a log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records decoded and handed to the apply callback
    pub commands_applied: u64,

    /// Length of the well-formed prefix of the file
    pub valid_bytes: u64,

    /// Bytes after the last complete record (torn or corrupt tail)
    pub discarded_bytes: u64,
}

impl ReplayReport {
    /// Whether the file ended in something other than a complete record.
    pub fn was_truncated(&self) -> bool {
        self.discarded_bytes > 0
    }
}

/// Handle to an open log file.
///
/// Appends are serialized by an internal mutex so records never interleave.
pub struct AppendOnlyLog {
    path: PathBuf,
    file: Mutex<LogFile>,
    records_appended: AtomicU64,
}

struct LogFile {
    file: File,
    /// End of the last complete record
    len: u64,
    /// Set when a failed write could not be rolled back
    poisoned: bool,
}

impl std::fmt::Debug for AppendOnlyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendOnlyLog")
            .field("path", &self.path)
            .field("records_appended", &self.records_appended())
            .finish()
    }
}

impl AppendOnlyLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> AofResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AofError::io(path, e))?;
        let len = file.metadata().map_err(|e| AofError::io(path, e))?.len();

        debug!(path = %path.display(), len, "Opened append-only file");

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(LogFile {
                file,
                len,
                poisoned: false,
            }),
            records_appended: AtomicU64::new(0),
        })
    }

    /// Opens the log after a replay, first cutting off any torn tail the
    /// replay reported so new records follow the last complete one.
    pub fn open_after_replay(path: impl AsRef<Path>, report: &ReplayReport) -> AofResult<Self> {
        let path = path.as_ref();

        if report.was_truncated() {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| AofError::io(path, e))?;
            file.set_len(report.valid_bytes)
                .and_then(|()| file.sync_all())
                .map_err(|e| AofError::io(path, e))?;

            warn!(
                path = %path.display(),
                valid_bytes = report.valid_bytes,
                discarded_bytes = report.discarded_bytes,
                "Truncated torn tail of append-only file"
            );
        }

        Self::open(path)
    }

    /// Writes one request and flushes it to disk.
    pub fn append(&self, request: &RespValue) -> AofResult<()> {
        let mut log = self.file.lock();
        self.write_record(&mut log, request)
    }

    /// Appends `request`, then runs `apply` while still holding the log lock.
    ///
    /// Holding the lock across both steps makes the order of records in the
    /// file the same as the order in which commands changed the store. If the
    /// append fails, `apply` is not run.
    pub fn append_then<R>(&self, request: &RespValue, apply: impl FnOnce() -> R) -> AofResult<R> {
        // The fsync runs on the calling (tokio worker) thread with the lock
        // held, so concurrent writers queue here and can tie up workers that
        // read-only connections would otherwise use.
        let mut log = self.file.lock();
        self.write_record(&mut log, request)?;
        Ok(apply())
    }

    fn write_record(&self, log: &mut LogFile, request: &RespValue) -> AofResult<()> {
        if log.poisoned {
            return Err(AofError::Poisoned {
                path: self.path.clone(),
            });
        }

        let record = request.serialize();
        let written = log
            .file
            .write_all(&record)
            .and_then(|()| log.file.sync_data());

        if let Err(e) = written {
            self.roll_back(log);
            return Err(AofError::io(&self.path, e));
        }

        log.len += record.len() as u64;
        self.records_appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Cuts the file back to the end of the last complete record.
    fn roll_back(&self, log: &mut LogFile) {
        match log.file.set_len(log.len).and_then(|()| log.file.sync_data()) {
            Ok(()) => warn!(
                path = %self.path.display(),
                len = log.len,
                "Rolled back failed append"
            ),
            Err(e) => {
                log.poisoned = true;
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Could not roll back failed append, refusing further appends"
                );
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written through this handle since it was opened.
    pub fn records_appended(&self) -> u64 {
        self.records_appended.load(Ordering::Relaxed)
    }
}

/// Decodes every complete record in `path`, in file order, and hands each to
/// `apply`.
///
/// A missing file is an empty log. Decoding stops at the first frame that is
/// incomplete or malformed; everything before it is applied and the rest is
/// reported as discarded.
pub fn replay<F>(path: impl AsRef<Path>, mut apply: F) -> AofResult<ReplayReport>
where
    F: FnMut(RespValue),
{
    let path = path.as_ref();
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No append-only file found, starting empty");
            return Ok(ReplayReport::default());
        }
        Err(e) => return Err(AofError::io(path, e)),
    };

    let mut report = ReplayReport::default();
    let mut offset = 0;

    while offset < data.len() {
        match parse_message(&data[offset..]) {
            Ok(Some((request, consumed))) => {
                apply(request);
                offset += consumed;
                report.commands_applied += 1;
            }
            Ok(None) => {
                warn!(
                    path = %path.display(),
                    offset,
                    "Append-only file ends with an incomplete record"
                );
                break;
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    offset,
                    error = %e,
                    "Append-only file contains a malformed record, ignoring the rest"
                );
                break;
            }
        }
    }

    report.valid_bytes = offset as u64;
    report.discarded_bytes = (data.len() - offset) as u64;

    info!(
        path = %path.display(),
        commands = report.commands_applied,
        bytes = report.valid_bytes,
        "Replayed append-only file"
    );

    Ok(report)
}

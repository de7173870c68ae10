//! AOF file handling
//!
//! Appending, replaying, syncing and closing the log file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::ProtocolLimits;
use crate::error::{KvError, Result};
use crate::protocol::{RespReader, Value};

/// Overall durability health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityStatus {
    /// Every append succeeded and the last fsync succeeded
    Healthy,

    /// Some appends were lost, or fsync keeps failing
    Degraded,
}

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of complete records handed to the callback
    pub records_replayed: u64,

    /// Bytes covered by those records
    pub bytes_replayed: u64,

    /// Whether a partially written trailing record was cut off
    pub truncated_tail: bool,

    /// Where the cut-off bytes were saved before truncating
    pub tail_saved_to: Option<PathBuf>,
}

struct LogFile {
    file: File,

    /// Length of the file up to the last complete record
    len: u64,

    /// A failed write left bytes past `len` that could not be removed yet
    needs_rollback: bool,
}

impl LogFile {
    /// Cut the file back to the last complete record
    fn rollback(&mut self) -> io::Result<()> {
        self.file.set_len(self.len)?;
        self.needs_rollback = false;
        Ok(())
    }

    fn write_record(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if self.needs_rollback {
            if let Err(e) = self.rollback() {
                tracing::error!(
                    "AOF {} still holds a partial record past {} bytes: {}",
                    path.display(),
                    self.len,
                    e
                );
                return Err(KvError::Io(e));
            }
            tracing::info!("AOF {} partial record removed", path.display());
        }

        if let Err(e) = self.file.write_all(bytes) {
            self.needs_rollback = true;
            if let Err(rollback) = self.rollback() {
                tracing::error!(
                    "AOF {} could not remove partial record past {} bytes: {}; retrying before next append",
                    path.display(),
                    self.len,
                    rollback
                );
            }
            return Err(KvError::Io(e));
        }

        self.len += bytes.len() as u64;
        Ok(())
    }
}

/// The append-only command log
pub struct Aof {
    path: PathBuf,
    limits: ProtocolLimits,

    /// `None` once closed
    inner: Mutex<Option<LogFile>>,

    append_failures: AtomicU64,
    sync_degraded: AtomicBool,
}

impl Aof {
    /// Open or create the log with default decoder limits
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_limits(path, ProtocolLimits::default())
    }

    pub fn open_with_limits(path: impl AsRef<Path>, limits: ProtocolLimits) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let len = file.metadata()?.len();

        tracing::debug!("Opened AOF {} ({} bytes)", path.display(), len);

        Ok(Self {
            path,
            limits,
            inner: Mutex::new(Some(LogFile {
                file,
                len,
                needs_rollback: false,
            })),
            append_failures: AtomicU64::new(0),
            sync_degraded: AtomicBool::new(false),
        })
    }

    /// Append one record
    ///
    /// The value is marshalled before the lock is taken. On a failed write the
    /// file is cut back to its previous length so no partial record remains;
    /// if that fails too, the cut is retried before the next write and
    /// appends fail until it succeeds.
    pub fn append(&self, value: &Value) -> Result<()> {
        let bytes = value.marshal();

        let mut guard = self.inner.lock();
        let result = match guard.as_mut() {
            Some(log) => log.write_record(&self.path, &bytes),
            None => Err(KvError::LogClosed),
        };
        drop(guard);

        if result.is_err() {
            self.append_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Read every complete record from the start of the log
    ///
    /// Clean end of file finishes the replay. A truncated final record (a
    /// crash in the middle of an append) also finishes it; the garbage tail is
    /// copied to `<path>.corrupt-<offset>` and then removed from the file so
    /// later appends start on a record boundary. A damaged length field can
    /// look the same as a torn tail, so nothing is discarded without that copy.
    /// Any other decode failure aborts the replay.
    ///
    /// The log lock is held while `callback` runs, so the callback must not
    /// append to this log.
    pub fn replay<F>(&self, mut callback: F) -> Result<ReplayStats>
    where
        F: FnMut(Value),
    {
        let mut guard = self.inner.lock();
        let log = guard.as_mut().ok_or(KvError::LogClosed)?;

        log.file.seek(SeekFrom::Start(0))?;
        let mut reader = RespReader::with_limits(BufReader::new(&log.file), self.limits);
        let mut stats = ReplayStats::default();

        loop {
            match reader.read_value() {
                Ok(value) => {
                    stats.records_replayed += 1;
                    callback(value);
                }
                Err(e) if e.is_clean_eof() => break,
                Err(KvError::IncompleteInput { partial: true }) => {
                    stats.truncated_tail = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        stats.bytes_replayed = reader.consumed();
        drop(reader);

        if stats.truncated_tail {
            let saved_to = self.save_tail(&mut log.file, stats.bytes_replayed)?;
            tracing::warn!(
                "AOF {} ends with a partial record; truncating {} bytes to {}, dropped bytes saved to {}",
                self.path.display(),
                log.file.metadata()?.len(),
                stats.bytes_replayed,
                saved_to.display()
            );
            log.file.set_len(stats.bytes_replayed)?;
            log.file.sync_all()?;
            log.needs_rollback = false;
            stats.tail_saved_to = Some(saved_to);
        }
        log.len = stats.bytes_replayed;

        Ok(stats)
    }

    /// Copy everything from `offset` to the end of the log into a new file
    /// next to it
    fn save_tail(&self, file: &mut File, offset: u64) -> Result<PathBuf> {
        let mut attempt = 0u32;
        let (target, mut out) = loop {
            let mut name = self.path.as_os_str().to_owned();
            name.push(format!(".corrupt-{}", offset));
            if attempt > 0 {
                name.push(format!(".{}", attempt));
            }
            let target = PathBuf::from(name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(out) => break (target, out),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(KvError::Io(e)),
            }
        };

        file.seek(SeekFrom::Start(offset))?;
        io::copy(file, &mut out)?;
        out.sync_all()?;
        Ok(target)
    }

    /// Force written records to stable storage
    pub fn sync(&self) -> Result<()> {
        let guard = self.inner.lock();
        let log = guard.as_ref().ok_or(KvError::LogClosed)?;
        log.file.sync_all()?;
        Ok(())
    }

    /// Sync and close. Later appends fail with `LogClosed`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        match guard.take() {
            Some(log) => {
                log.file.sync_all()?;
                tracing::debug!("Closed AOF {}", self.path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn status(&self) -> DurabilityStatus {
        if self.append_failures() > 0 || self.sync_degraded.load(Ordering::Relaxed) {
            DurabilityStatus::Degraded
        } else {
            DurabilityStatus::Healthy
        }
    }

    /// Number of appends that failed since the log was opened
    pub fn append_failures(&self) -> u64 {
        self.append_failures.load(Ordering::Relaxed)
    }

    /// Record the outcome of a background sync
    pub fn set_sync_healthy(&self, healthy: bool) {
        let was_degraded = self.sync_degraded.swap(!healthy, Ordering::Relaxed);
        match (was_degraded, healthy) {
            (false, false) => tracing::error!(
                "AOF {} durability degraded: fsync keeps failing",
                self.path.display()
            ),
            (true, true) => tracing::info!("AOF {} fsync recovered", self.path.display()),
            _ => {}
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Length of the log up to the last complete record
    pub fn len(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, |log| log.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! The commit log: an ordered set of segments addressed by offset.

use crate::config::Config;
use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::segment::{Segment, SegmentInfo};
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// A durable, append-only sequence of records split into segments.
///
/// # Offsets
///
/// Every append receives the next offset in one total order: no gaps, no
/// duplicates, never reused across restarts. Segment ranges are disjoint
/// and contiguous; a new segment's base offset is the previous segment's
/// final next offset.
///
/// # Thread Safety
///
/// Appends (rotation included) take the write lock, reads take the read
/// lock. An offset returned by `append` is readable by every later `read`.
///
/// # Example
///
/// ```rust
/// use seglog_core::{Config, Log};
///
/// let dir = tempfile::tempdir().unwrap();
/// let log = Log::open(dir.path(), Config::default()).unwrap();
///
/// assert_eq!(log.append(b"hello").unwrap(), 0);
/// assert_eq!(log.append(b"world").unwrap(), 1);
/// assert!(log.read(2).unwrap_err().is_out_of_range());
/// ```
pub struct Log {
    dir: LogDir,
    config: Config,
    inner: RwLock<LogInner>,
}

struct LogInner {
    /// Ascending by base offset; the last segment is the active one.
    segments: Vec<Segment>,
    closed: bool,
}

impl LogInner {
    fn active(&mut self) -> &mut Segment {
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }

    fn lowest(&self) -> u64 {
        self.segments[0].base_offset()
    }

    fn next(&self) -> u64 {
        self.segments[self.segments.len() - 1].next_offset()
    }

    /// Starts a new active segment at the next offset if the current one is
    /// maxed.
    fn rotate_if_maxed(&mut self, dir: &LogDir, config: &Config) -> CoreResult<()> {
        if !self.active().is_maxed() {
            return Ok(());
        }

        let base = self.next();
        let segment = Segment::open(dir.path(), base, config)?;
        self.segments.push(segment);
        dir.sync()?;
        info!(base_offset = base, "rotated to new segment");
        Ok(())
    }
}

impl Log {
    /// Opens the log stored in `dir`, creating it if needed.
    ///
    /// Existing `<base>.store`/`<base>.index` pairs are reopened in base
    /// offset order, each recovering its next offset from its index. An
    /// empty directory gets one segment at `config.initial_offset`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration fails validation
    /// - `LogLocked` if another handle owns the directory
    /// - `InvalidFormat` if segment ranges overlap or leave a gap
    /// - storage errors from reopening segments
    pub fn open(dir: &Path, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = LogDir::open(dir)?;

        let mut segments = Vec::new();
        for base in dir.segment_base_offsets()? {
            let segment = Segment::open(dir.path(), base, &config)?;
            if let Some(prev) = segments.last().map(Segment::next_offset) {
                if prev != base {
                    return Err(CoreError::invalid_format(format!(
                        "segment {base} does not follow previous segment ending at {prev}"
                    )));
                }
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            segments.push(Segment::open(dir.path(), config.initial_offset, &config)?);
            dir.sync()?;
        }

        let mut inner = LogInner {
            segments,
            closed: false,
        };
        // A crash or failed rotation can leave a full segment last.
        inner.rotate_if_maxed(&dir, &config)?;

        let log = Self {
            dir,
            config,
            inner: RwLock::new(inner),
        };

        {
            let inner = log.inner.read();
            info!(
                dir = %log.dir.path().display(),
                segments = inner.segments.len(),
                lowest = inner.lowest(),
                next = inner.next(),
                "opened log"
            );
        }

        Ok(log)
    }

    /// Appends a payload and returns its offset.
    ///
    /// If the active segment is maxed afterwards, a new segment starting at
    /// the next offset becomes active before the lock is released. A failed
    /// rotation does not fail the append that already committed; it is
    /// retried before the next append.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the segment, or from creating the next
    /// segment when the active one is still full. No offset is assigned
    /// when an error is returned.
    pub fn append(&self, value: &[u8]) -> CoreResult<u64> {
        let mut inner = self.inner.write();
        Self::ensure_open(&inner)?;

        inner.rotate_if_maxed(&self.dir, &self.config)?;
        let offset = inner.active().append(value)?;

        if let Err(e) = inner.rotate_if_maxed(&self.dir, &self.config) {
            warn!(offset, error = %e, "rotation failed, retrying on next append");
        }

        Ok(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OffsetOutOfRange` if no segment covers `offset`: either it
    /// was never written or its segment was truncated away.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let inner = self.inner.read();
        Self::ensure_open(&inner)?;

        let idx = inner
            .segments
            .partition_point(|s| s.base_offset() <= offset);

        match idx.checked_sub(1).map(|i| &inner.segments[i]) {
            Some(segment) if segment.contains(offset) => segment.read(offset),
            _ => Err(CoreError::OffsetOutOfRange {
                offset,
                lowest: inner.lowest(),
                next: inner.next(),
            }),
        }
    }

    /// Returns the lowest offset still held, the oldest segment's base.
    #[must_use]
    pub fn lowest_offset(&self) -> u64 {
        self.inner.read().lowest()
    }

    /// Returns the offset of the last appended record, or `None` if the
    /// log holds no records.
    #[must_use]
    pub fn highest_offset(&self) -> Option<u64> {
        let inner = self.inner.read();
        let next = inner.next();
        (next > inner.lowest()).then(|| next - 1)
    }

    /// Returns the offset the next append will receive.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.inner.read().next()
    }

    /// Removes every segment whose records all lie below `lowest`.
    ///
    /// The active segment is never removed, so the log always has somewhere
    /// to append. Returns the number of segments removed.
    ///
    /// # Errors
    ///
    /// Returns the first error from removing a segment's files. Segments
    /// are removed oldest first and removal stops at the failing one, so
    /// every segment still listed keeps its files.
    pub fn truncate(&self, lowest: u64) -> CoreResult<usize> {
        let mut inner = self.inner.write();
        Self::ensure_open(&inner)?;

        let removable = inner.segments[..inner.segments.len() - 1]
            .iter()
            .take_while(|s| s.next_offset() <= lowest)
            .count();

        let mut removed = 0;
        let mut result = Ok(());
        while removed < removable {
            let segment = inner.segments.remove(0);
            let base_offset = segment.base_offset();
            if let Err(e) = segment.remove() {
                warn!(base_offset, error = %e, "failed to remove segment");
                result = Err(e);
                break;
            }
            removed += 1;
        }

        if removed > 0 || result.is_err() {
            self.dir.sync()?;
        }
        if removed > 0 {
            info!(lowest, removed, "truncated log");
        }

        result.map(|()| removed)
    }

    /// Returns a snapshot of every segment, oldest first.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.inner.read().segments.iter().map(Segment::info).collect()
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes every segment.
    ///
    /// All segments are attempted; the first error is returned. Later
    /// appends and reads fail with a closed storage error. The directory
    /// lock is held until the log is dropped.
    pub fn close(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        let mut first_err = None;
        for segment in &mut inner.segments {
            if let Err(e) = segment.close() {
                first_err.get_or_insert(e);
            }
        }

        debug!(dir = %self.dir.path().display(), "closed log");
        first_err.map_or(Ok(()), Err)
    }

    /// Closes the log and deletes its directory.
    pub fn remove(self) -> CoreResult<()> {
        self.close()?;
        let path = self.dir.path().to_path_buf();
        drop(self);
        fs::remove_dir_all(&path)?;
        info!(dir = %path.display(), "removed log");
        Ok(())
    }

    fn ensure_open(inner: &LogInner) -> CoreResult<()> {
        if inner.closed {
            return Err(seglog_storage::StorageError::Closed.into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("dir", &self.dir.path())
            .field("config", &self.config)
            .field("segments", &self.inner.read().segments.len())
            .finish_non_exhaustive()
    }
}

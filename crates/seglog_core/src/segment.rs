//! Segments: one store and one index sharing a base offset.

use crate::config::Config;
use crate::dir::{index_path, store_path};
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use seglog_storage::{Index, StorageError, Store};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A bounded range of offsets backed by `<base>.store` and `<base>.index`.
///
/// # Invariants
///
/// - Every record in the segment has `base_offset <= offset < next_offset`
/// - Index entry `n` describes offset `base_offset + n`
/// - `next_offset` is recomputed from the last index entry on open
pub struct Segment {
    dir: PathBuf,
    store: Store,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: Config,
}

/// A snapshot of one segment's bounds and file sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// First offset the segment may contain.
    pub base_offset: u64,
    /// Offset the next append to this segment would receive.
    pub next_offset: u64,
    /// Bytes written to the store.
    pub store_bytes: u64,
    /// Bytes used in the index.
    pub index_bytes: u64,
}

impl SegmentInfo {
    /// Returns the number of records in the segment.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.next_offset - self.base_offset
    }
}

impl Segment {
    /// Opens or creates the segment with `base_offset` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened. A store opened
    /// before a failing index is closed again.
    pub fn open(dir: &Path, base_offset: u64, config: &Config) -> CoreResult<Self> {
        let store = Store::open(&store_path(dir, base_offset))?;

        let index = match Index::open(
            &index_path(dir, base_offset),
            config.max_index_bytes,
            config.entry_width,
        ) {
            Ok(index) => index,
            Err(e) => {
                let _ = store.close();
                return Err(e.into());
            }
        };

        let next_offset = match index.read_last()? {
            Some(last) => base_offset + u64::from(last.relative_offset) + 1,
            None => base_offset,
        };

        debug!(base_offset, next_offset, "opened segment");

        Ok(Self {
            dir: dir.to_path_buf(),
            store,
            index,
            base_offset,
            next_offset,
            config: config.clone(),
        })
    }

    /// Appends a payload and returns the offset assigned to it.
    ///
    /// The caller holds `&mut self`, so offset assignment and both writes
    /// happen without another append on this segment in between.
    ///
    /// # Errors
    ///
    /// Returns store or index errors unchanged. On an index error the store
    /// already holds the payload but no offset was assigned.
    pub fn append(&mut self, value: &[u8]) -> CoreResult<u64> {
        let offset = self.next_offset;
        let relative = u32::try_from(offset - self.base_offset).map_err(|_| {
            StorageError::IndexFull {
                capacity: self.index.capacity(),
            }
        })?;

        let position = self.store.append(value)?;
        self.index.write(relative, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Reads the record at absolute `offset`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` (as a storage error) if `offset` is outside
    /// `[base_offset, next_offset)`.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let Some(relative) = offset.checked_sub(self.base_offset) else {
            return Err(StorageError::IndexOutOfRange {
                entry: 0,
                entries: self.index.len(),
            }
            .into());
        };

        let entry = self.index.read(relative)?;
        let value = self.store.read(entry.position)?;
        Ok(Record::new(value, offset))
    }

    /// Returns true once the store or index has reached its maximum.
    #[must_use]
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes || self.index.is_full()
    }

    /// Returns true if `offset` is in `[base_offset, next_offset)`.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    /// Returns the first offset this segment may contain.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Returns the offset the next append will receive.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Returns a snapshot of bounds and sizes.
    #[must_use]
    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            base_offset: self.base_offset,
            next_offset: self.next_offset,
            store_bytes: self.store.size(),
            index_bytes: self.index.size(),
        }
    }

    /// Closes the store, then the index.
    ///
    /// Both are attempted; the first error is returned.
    pub fn close(&mut self) -> CoreResult<()> {
        let store = self.store.close();
        let index = self.index.close();
        store?;
        index?;
        Ok(())
    }

    /// Closes the segment and deletes its own store and index files.
    ///
    /// # Errors
    ///
    /// Returns the first close or delete error. Deletion is attempted even
    /// if closing failed.
    pub fn remove(mut self) -> CoreResult<()> {
        let closed = self.close();

        let store_file = store_path(&self.dir, self.base_offset);
        let index_file = index_path(&self.dir, self.base_offset);
        let store_removed = fs::remove_file(&store_file);
        let index_removed = fs::remove_file(&index_file);

        debug!(base_offset = self.base_offset, "removed segment");

        closed?;
        store_removed.map_err(CoreError::from)?;
        index_removed.map_err(CoreError::from)?;
        Ok(())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("dir", &self.dir)
            .field("base_offset", &self.base_offset)
            .field("next_offset", &self.next_offset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_storage::{ENTRY_WIDTH, LEN_WIDTH};
    use tempfile::tempdir;

    const PAYLOAD: &[u8] = b"hello world";

    #[test]
    fn append_and_read() {
        let dir = tempdir().unwrap();
        let config = Config::new()
            .max_store_bytes(1024)
            .max_index_bytes(ENTRY_WIDTH * 3);
        let mut segment = Segment::open(dir.path(), 16, &config).unwrap();
        assert_eq!(segment.next_offset(), 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let offset = segment.append(PAYLOAD).unwrap();
            assert_eq!(offset, 16 + i);

            let record = segment.read(offset).unwrap();
            assert_eq!(record.value, PAYLOAD);
            assert_eq!(record.offset, offset);
        }

        // Index holds exactly three entries.
        assert!(segment.is_maxed());
        let result = segment.append(PAYLOAD);
        assert!(matches!(
            result,
            Err(CoreError::Storage(StorageError::IndexFull { .. }))
        ));
    }

    #[test]
    fn maxed_by_store_size() {
        let dir = tempdir().unwrap();
        let record_bytes = LEN_WIDTH + PAYLOAD.len() as u64;
        let config = Config::new()
            .max_store_bytes(record_bytes * 3)
            .max_index_bytes(1024);
        let mut segment = Segment::open(dir.path(), 0, &config).unwrap();

        segment.append(PAYLOAD).unwrap();
        segment.append(PAYLOAD).unwrap();
        assert!(!segment.is_maxed());
        segment.append(PAYLOAD).unwrap();
        assert!(segment.is_maxed());
    }

    #[test]
    fn read_outside_range_fails() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 10, &Config::default()).unwrap();
        segment.append(PAYLOAD).unwrap();

        for offset in [9u64, 11, 100] {
            let err = segment.read(offset).unwrap_err();
            assert!(matches!(
                err,
                CoreError::Storage(StorageError::IndexOutOfRange { .. })
            ));
            assert!(!err.is_out_of_range());
        }
    }

    #[test]
    fn reopen_restores_next_offset() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        {
            let mut segment = Segment::open(dir.path(), 16, &config).unwrap();
            for _ in 0..4 {
                segment.append(PAYLOAD).unwrap();
            }
            segment.close().unwrap();
        }

        let mut segment = Segment::open(dir.path(), 16, &config).unwrap();
        assert_eq!(segment.next_offset(), 20);
        assert_eq!(segment.read(19).unwrap().value, PAYLOAD);
        assert_eq!(segment.append(b"next").unwrap(), 20);
    }

    #[test]
    fn remove_deletes_own_files() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        let mut keep = Segment::open(dir.path(), 0, &config).unwrap();
        keep.append(PAYLOAD).unwrap();
        let mut gone = Segment::open(dir.path(), 1, &config).unwrap();
        gone.append(PAYLOAD).unwrap();

        gone.remove().unwrap();

        assert!(!dir.path().join("1.store").exists());
        assert!(!dir.path().join("1.index").exists());
        assert!(dir.path().join("0.store").exists());
        assert!(dir.path().join("0.index").exists());
        assert_eq!(keep.read(0).unwrap().value, PAYLOAD);
    }

    #[test]
    fn close_truncates_index() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 0, &Config::default()).unwrap();
        segment.append(PAYLOAD).unwrap();
        segment.append(PAYLOAD).unwrap();
        segment.close().unwrap();

        let len = fs::metadata(dir.path().join("0.index")).unwrap().len();
        assert_eq!(len, 2 * ENTRY_WIDTH);
    }

    #[test]
    fn info_reports_sizes() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::open(dir.path(), 5, &Config::default()).unwrap();
        segment.append(PAYLOAD).unwrap();

        let info = segment.info();
        assert_eq!(info.base_offset, 5);
        assert_eq!(info.next_offset, 6);
        assert_eq!(info.record_count(), 1);
        assert_eq!(info.store_bytes, LEN_WIDTH + PAYLOAD.len() as u64);
        assert_eq!(info.index_bytes, ENTRY_WIDTH);
    }
}

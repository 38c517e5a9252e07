//! Fixed-width offset index.

use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Width of the relative offset field.
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;

/// Minimum (and default) width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// One index entry: where a record lives in its segment's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset of the record relative to the segment's base offset.
    pub relative_offset: u32,
    /// Byte position of the record's length prefix in the store.
    pub position: u64,
}

impl IndexEntry {
    fn encode_into(self, slot: &mut [u8]) {
        let (off, rest) = slot.split_at_mut(OFFSET_WIDTH as usize);
        off.copy_from_slice(&self.relative_offset.to_be_bytes());
        let (pos, padding) = rest.split_at_mut(POSITION_WIDTH as usize);
        pos.copy_from_slice(&self.position.to_be_bytes());
        padding.fill(0);
    }

    fn decode(slot: &[u8]) -> Self {
        let mut off = [0u8; OFFSET_WIDTH as usize];
        off.copy_from_slice(&slot[..OFFSET_WIDTH as usize]);
        let mut pos = [0u8; POSITION_WIDTH as usize];
        pos.copy_from_slice(&slot[OFFSET_WIDTH as usize..ENTRY_WIDTH as usize]);
        Self {
            relative_offset: u32::from_be_bytes(off),
            position: u64::from_be_bytes(pos),
        }
    }
}

/// A fixed-capacity table of [`IndexEntry`] values backed by one file.
///
/// The table lives in an in-memory arena sized to the configured maximum at
/// open time; the file is grown to the same capacity. Every write lands in
/// the arena and is written through to the file at the same offset.
///
/// # Invariants
///
/// - Entries are appended in order and never rewritten
/// - `size` counts used bytes and is always a multiple of the entry width
/// - After `close` the file length equals `size`, never the capacity
///
/// The last point matters: on reopen the used size is taken from the file
/// length, and the last entry is what the segment uses to recover its next
/// offset. Dropping an open index closes it for the same reason.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    /// `None` once the index is closed.
    file: Option<File>,
    arena: Vec<u8>,
    size: u64,
    entry_width: u64,
}

impl Index {
    /// Opens or creates the index file at `path`.
    ///
    /// `max_bytes` is rounded down to a whole number of entries. An existing
    /// file larger than that keeps its entries readable and is simply full.
    ///
    /// # Errors
    ///
    /// Returns an error if `entry_width` is below [`ENTRY_WIDTH`], if the
    /// file length is not a whole number of entries, or on I/O failure.
    pub fn open(path: &Path, max_bytes: u64, entry_width: u64) -> StorageResult<Self> {
        if entry_width < ENTRY_WIDTH {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("index entry width {entry_width} is below the minimum {ENTRY_WIDTH}"),
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();
        if size % entry_width != 0 {
            return Err(StorageError::Corrupted(format!(
                "index {} has {size} bytes, not a multiple of entry width {entry_width}",
                path.display()
            )));
        }

        let capacity = (max_bytes - max_bytes % entry_width).max(size);
        let arena_len = usize::try_from(capacity).map_err(|_| {
            StorageError::Corrupted(format!("index capacity {capacity} too large"))
        })?;

        let mut arena = Vec::with_capacity(arena_len);
        file.read_to_end(&mut arena)?;
        arena.resize(arena_len, 0);

        if capacity > size {
            file.set_len(capacity)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            arena,
            size,
            entry_width,
        })
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if the index cannot hold a single entry
    /// - `IndexFull` if the entry would exceed the capacity
    /// - `Closed` or I/O errors from the write-through
    pub fn write(&mut self, relative_offset: u32, position: u64) -> StorageResult<()> {
        let capacity = self.capacity();
        if capacity < self.entry_width {
            return Err(StorageError::NotInitialized);
        }
        if self.size + self.entry_width > capacity {
            return Err(StorageError::IndexFull { capacity });
        }

        let start = self.size as usize;
        let slot = &mut self.arena[start..start + self.entry_width as usize];
        IndexEntry {
            relative_offset,
            position,
        }
        .encode_into(slot);

        let file = self.file.as_mut().ok_or(StorageError::Closed)?;
        file.seek(SeekFrom::Start(self.size))?;
        file.write_all(slot)?;

        self.size += self.entry_width;
        Ok(())
    }

    /// Reads the `n`-th entry (zero-based).
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if the index cannot hold a single entry
    /// - `IndexOutOfRange` if fewer than `n + 1` entries were written
    pub fn read(&self, n: u64) -> StorageResult<IndexEntry> {
        if self.capacity() < self.entry_width {
            return Err(StorageError::NotInitialized);
        }

        let entries = self.len();
        if n >= entries {
            return Err(StorageError::IndexOutOfRange { entry: n, entries });
        }

        let start = (n * self.entry_width) as usize;
        Ok(IndexEntry::decode(
            &self.arena[start..start + self.entry_width as usize],
        ))
    }

    /// Reads the last written entry, or `None` for an empty index.
    ///
    /// The bound comes from the used size, not the capacity.
    pub fn read_last(&self) -> StorageResult<Option<IndexEntry>> {
        match self.len() {
            0 => Ok(None),
            n => self.read(n - 1).map(Some),
        }
    }

    /// Returns the number of entries written.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size / self.entry_width
    }

    /// Returns true if no entries have been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the used size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the pre-sized capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.arena.len() as u64
    }

    /// Returns true if another entry would not fit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size + self.entry_width > self.capacity()
    }

    /// Returns the width of one entry in bytes.
    #[must_use]
    pub fn entry_width(&self) -> u64 {
        self.entry_width
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs written entries to durable storage.
    pub fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.as_mut().ok_or(StorageError::Closed)?;
        file.sync_data()?;
        Ok(())
    }

    /// Shrinks the file to the used size, syncs it, and releases the handle.
    ///
    /// Closing an already closed index is a no-op.
    pub fn close(&mut self) -> StorageResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.set_len(self.size)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        // Errors cannot be reported from drop; an explicit close surfaces them.
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_index() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("0.index"), 1024, ENTRY_WIDTH).unwrap();

        assert!(index.is_empty());
        assert_eq!(index.read_last().unwrap(), None);
        assert!(matches!(
            index.read(0),
            Err(StorageError::IndexOutOfRange {
                entry: 0,
                entries: 0
            })
        ));
    }

    #[test]
    fn open_presizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        let index = Index::open(&path, 1024, ENTRY_WIDTH).unwrap();

        // 1024 rounded down to 85 entries of 12 bytes.
        assert_eq!(index.capacity(), 1020);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1020);
    }

    #[test]
    fn write_and_read() {
        let dir = tempdir().unwrap();
        let mut index = Index::open(&dir.path().join("0.index"), 1024, ENTRY_WIDTH).unwrap();

        let entries = [(0u32, 0u64), (1, 10), (2, 27)];
        for (off, pos) in entries {
            index.write(off, pos).unwrap();
        }

        for (n, (off, pos)) in entries.iter().enumerate() {
            let entry = index.read(n as u64).unwrap();
            assert_eq!(entry.relative_offset, *off);
            assert_eq!(entry.position, *pos);
        }

        let last = index.read_last().unwrap().unwrap();
        assert_eq!(last.relative_offset, 2);
        assert!(index.read(3).unwrap_err().is_out_of_range());
    }

    #[test]
    fn write_past_capacity_fails() {
        let dir = tempdir().unwrap();
        let mut index =
            Index::open(&dir.path().join("0.index"), ENTRY_WIDTH * 2, ENTRY_WIDTH).unwrap();

        index.write(0, 0).unwrap();
        assert!(!index.is_full());
        index.write(1, 16).unwrap();
        assert!(index.is_full());

        let result = index.write(2, 32);
        assert!(matches!(result, Err(StorageError::IndexFull { capacity: 24 })));
    }

    #[test]
    fn zero_capacity_is_not_initialized() {
        let dir = tempdir().unwrap();
        let mut index = Index::open(&dir.path().join("0.index"), 4, ENTRY_WIDTH).unwrap();

        assert!(matches!(index.write(0, 0), Err(StorageError::NotInitialized)));
        assert!(matches!(index.read(0), Err(StorageError::NotInitialized)));
    }

    #[test]
    fn close_truncates_to_used_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        let mut index = Index::open(&path, 1024, ENTRY_WIDTH).unwrap();

        index.write(0, 0).unwrap();
        index.write(1, 13).unwrap();
        index.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * ENTRY_WIDTH);
    }

    #[test]
    fn drop_truncates_to_used_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        {
            let mut index = Index::open(&path, 1024, ENTRY_WIDTH).unwrap();
            index.write(0, 0).unwrap();
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), ENTRY_WIDTH);
    }

    #[test]
    fn reopen_recovers_last_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        {
            let mut index = Index::open(&path, 1024, ENTRY_WIDTH).unwrap();
            for i in 0..5u32 {
                index.write(i, u64::from(i) * 20).unwrap();
            }
            index.close().unwrap();
        }

        let mut index = Index::open(&path, 1024, ENTRY_WIDTH).unwrap();
        assert_eq!(index.len(), 5);
        let last = index.read_last().unwrap().unwrap();
        assert_eq!(last.relative_offset, 4);
        assert_eq!(last.position, 80);

        index.write(5, 100).unwrap();
        assert_eq!(index.read(5).unwrap().position, 100);
    }

    #[test]
    fn wide_entries_are_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        {
            let mut index = Index::open(&path, 64, 16).unwrap();
            index.write(7, 0x0102).unwrap();
            index.write(8, 0x0304).unwrap();
            assert_eq!(index.read(1).unwrap().relative_offset, 8);
        }

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 32);
        assert_eq!(&raw[..4], &[0, 0, 0, 7]);
        assert_eq!(&raw[4..12], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&raw[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn narrow_width_rejected() {
        let dir = tempdir().unwrap();
        let result = Index::open(&dir.path().join("0.index"), 1024, 8);
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn partial_entry_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.index");
        std::fs::write(&path, [0u8; 13]).unwrap();

        let result = Index::open(&path, 1024, ENTRY_WIDTH);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}

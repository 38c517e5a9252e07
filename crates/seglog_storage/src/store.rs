//! Append-only store of length-prefixed payloads.

use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Width of the big-endian length prefix written before every payload.
pub const LEN_WIDTH: u64 = 8;

/// An append-only file of `(length, payload)` entries.
///
/// Writes go through a buffer that is flushed before `append` returns, so an
/// acknowledged append is visible to every later read. Existing entries are
/// never rewritten; the only destructive operation is deleting the file,
/// which the owning segment does.
///
/// # Thread Safety
///
/// All operations take one internal lock, so `append`, `read_at` and `close`
/// never interleave.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// `None` once the store is closed.
    writer: Option<BufWriter<File>>,
    size: u64,
}

impl StoreInner {
    fn writer(&mut self) -> StorageResult<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or(StorageError::Closed)
    }

    fn read_exact_at(&mut self, buf: &mut [u8], position: u64) -> StorageResult<()> {
        let writer = self.writer()?;
        writer.flush()?;
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

impl Store {
    /// Opens or creates the store file at `path`.
    ///
    /// The size counter starts at the current file length, so reopening a
    /// store continues after its last entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                writer: Some(BufWriter::new(file)),
                size,
            }),
        })
    }

    /// Appends one payload and returns the position of its length prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the write fails.
    pub fn append(&self, payload: &[u8]) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        let position = inner.size;

        let writer = inner.writer()?;
        writer.write_all(&(payload.len() as u64).to_be_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;

        inner.size += LEN_WIDTH + payload.len() as u64;
        Ok(position)
    }

    /// Reads the payload whose length prefix starts at `position`.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the entry extends past the end of the file.
    pub fn read(&self, position: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;

        if position.saturating_add(LEN_WIDTH) > size {
            return Err(StorageError::Corrupted(format!(
                "length prefix at {position} beyond store size {size}"
            )));
        }

        let mut len_bytes = [0u8; LEN_WIDTH as usize];
        inner.read_exact_at(&mut len_bytes, position)?;
        let len = u64::from_be_bytes(len_bytes);

        let start = position + LEN_WIDTH;
        if start.saturating_add(len) > size {
            return Err(StorageError::Corrupted(format!(
                "entry at {position} of {len} bytes extends beyond store size {size}"
            )));
        }

        let len = usize::try_from(len)
            .map_err(|_| StorageError::Corrupted(format!("entry length {len} too large")))?;
        let mut payload = vec![0u8; len];
        inner.read_exact_at(&mut payload, start)?;
        Ok(payload)
    }

    /// Fills `buf` with the bytes starting at `position`.
    ///
    /// Pending buffered writes are flushed first. Returns the number of
    /// bytes read, which is always `buf.len()` on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the range is not in the file.
    pub fn read_at(&self, buf: &mut [u8], position: u64) -> StorageResult<usize> {
        let mut inner = self.inner.lock();
        inner.read_exact_at(buf, position)?;
        Ok(buf.len())
    }

    /// Reads every entry from the start of the file.
    ///
    /// Returns `(position, payload)` pairs in append order. A trailing
    /// partial entry is reported as `Corrupted`.
    pub fn scan(&self) -> StorageResult<Vec<(u64, Vec<u8>)>> {
        let size = self.size();
        let mut entries = Vec::new();
        let mut position = 0u64;

        while position < size {
            let payload = self.read(position)?;
            let next = position + LEN_WIDTH + payload.len() as u64;
            entries.push((position, payload));
            position = next;
        }

        Ok(entries)
    }

    /// Returns the total number of bytes written, prefixes included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().writer.is_none()
    }

    /// Flushes pending writes, syncs the file, and releases the handle.
    ///
    /// Closing an already closed store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails. The handle is released
    /// either way.
    pub fn close(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let Some(mut writer) = inner.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

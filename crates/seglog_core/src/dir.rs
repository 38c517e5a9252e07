//! Log directory management.
//!
//! One directory holds one log:
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ <base>.store      # One pair per segment
//! └─ <base>.index
//! ```
//!
//! The LOCK file ensures only one process appends to the log at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

const LOCK_FILE: &str = "LOCK";

/// Extension of segment store files.
pub(crate) const STORE_EXT: &str = "store";

/// Extension of segment index files.
pub(crate) const INDEX_EXT: &str = "index";

/// Returns the store path for the segment at `base_offset` in `dir`.
pub(crate) fn store_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{base_offset}.{STORE_EXT}"))
}

/// Returns the index path for the segment at `base_offset` in `dir`.
pub(crate) fn index_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{base_offset}.{INDEX_EXT}"))
}

/// An opened, exclusively locked log directory.
#[derive(Debug)]
pub(crate) struct LogDir {
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl LogDir {
    /// Opens or creates a log directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the path exists but is not a directory
    /// - `LogLocked` if another handle holds the lock
    pub(crate) fn open(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::LogLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the base offsets of every segment file pair, ascending.
    ///
    /// A base offset appears once even though two files carry it. Entries
    /// that are not regular `<u64>.store` or `<u64>.index` files are
    /// skipped.
    pub(crate) fn segment_base_offsets(&self) -> CoreResult<Vec<u64>> {
        let mut bases = BTreeSet::new();

        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if ext != Some(STORE_EXT) && ext != Some(INDEX_EXT) {
                continue;
            }

            if !path.is_file() {
                warn!(path = %path.display(), "skipping segment name that is not a file");
                continue;
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            match stem.parse::<u64>() {
                Ok(base) => {
                    bases.insert(base);
                }
                Err(_) => warn!(path = %path.display(), "skipping unrecognized segment file"),
            }
        }

        Ok(bases.into_iter().collect())
    }

    /// Syncs the directory so file creations and deletions are durable.
    #[cfg(unix)]
    pub(crate) fn sync(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub(crate) fn sync(&self) -> CoreResult<()> {
        // NTFS journals metadata; directories cannot be fsynced.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("log");

        let dir = LogDir::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _first = LogDir::open(temp.path()).unwrap();

        let result = LogDir::open(temp.path());
        assert!(matches!(result, Err(CoreError::LogLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _dir = LogDir::open(temp.path()).unwrap();
        }
        let _again = LogDir::open(temp.path()).unwrap();
    }

    #[test]
    fn file_is_not_a_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plain");
        fs::write(&path, b"x").unwrap();

        let result = LogDir::open(&path);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn base_offsets_sorted_and_deduplicated() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path()).unwrap();

        for base in [16u64, 0, 1024] {
            fs::write(store_path(temp.path(), base), b"").unwrap();
            fs::write(index_path(temp.path(), base), b"").unwrap();
        }
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(temp.path().join("junk.store"), b"").unwrap();

        assert_eq!(dir.segment_base_offsets().unwrap(), vec![0, 16, 1024]);
    }

    #[test]
    fn base_offsets_skip_non_files() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path()).unwrap();

        fs::write(store_path(temp.path(), 0), b"").unwrap();
        fs::write(index_path(temp.path(), 0), b"").unwrap();
        fs::create_dir(store_path(temp.path(), 3)).unwrap();

        assert_eq!(dir.segment_base_offsets().unwrap(), vec![0]);
    }

    #[test]
    fn segment_paths() {
        let dir = Path::new("/data/log");
        assert_eq!(store_path(dir, 42), PathBuf::from("/data/log/42.store"));
        assert_eq!(index_path(dir, 42), PathBuf::from("/data/log/42.index"));
    }
}

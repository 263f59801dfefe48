//! File-backed storage.
//!
//! Thin positional-I/O wrapper over `std::fs::File`. The length is
//! tracked in memory and only re-read from the filesystem on open, so
//! every [`Storage::len`] call is free. This backend is almost always
//! wrapped in a [`CacheStorage`](super::CacheStorage), which turns the
//! trie's scattered small writes into page-sized ones.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use super::Storage;

/// Storage over a single regular file, created on first open.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    len: u64,
    path: PathBuf,
}

impl FileStorage {
    /// Opens `path` for reading and writing, creating it when absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open {}", path.display()))?;
        let len = file.metadata()?.len();
        tracing::debug!(path = %path.display(), len, "opened file storage");
        Ok(Self { file, len, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn len(&self) -> u64 {
        self.len
    }

    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        if offset >= self.len {
            out.fill(0);
            return Ok(());
        }
        let avail = ((self.len - offset) as usize).min(out.len());
        self.file.seek(SeekFrom::Start(offset))?;
        self.file
            .read_exact(&mut out[..avail])
            .wrap_err_with(|| format!("short read at offset {offset}"))?;
        out[avail..].fill(0);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file
            .write_all(data)
            .wrap_err_with(|| format!("failed write at offset {offset}"))?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    fn resize(&mut self, new_len: u64) -> Result<()> {
        self.file.set_len(new_len)?;
        self.len = new_len;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data().wrap_err("fsync failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageExt;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.trie");
        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.write_to_end(b"hello").unwrap();
            storage.flush().unwrap();
        }
        let mut storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.len(), 5);
        let mut out = [0u8; 8];
        storage.read(0, &mut out).unwrap();
        assert_eq!(&out, b"hello\0\0\0");
    }

    #[test]
    fn truncate_then_read_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::open(dir.path().join("t.trie")).unwrap();
        storage.write(0, &[7; 16]).unwrap();
        storage.resize(4).unwrap();
        let mut out = [0xFFu8; 8];
        storage.read(0, &mut out).unwrap();
        assert_eq!(out, [7, 7, 7, 7, 0, 0, 0, 0]);
    }
}

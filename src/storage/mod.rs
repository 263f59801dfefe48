//! # Storage Layer
//!
//! Byte-addressed storage abstraction beneath the trie. Everything above
//! this module reads and writes flat byte ranges at absolute offsets; this
//! module decides where those bytes live.
//!
//! ```text
//!   Trie
//!    |
//!    v
//!   CacheStorage<S>     buffered pages, LRU eviction, flush boundary
//!    |
//!    v
//!   FileStorage / MemStorage
//! ```
//!
//! ## Why
//!
//! The trie mutates the file in small scattered writes (7-byte slots,
//! 5-byte pointers). Issuing those straight to disk would be both slow and
//! unsafe, since a crash mid-operation must not expose a half-written
//! structure to readers. Routing everything through [`CacheStorage`]
//! batches the scatter into page-sized writes and gives the engine a
//! single commit point: nothing reaches the backing file until
//! [`Storage::flush`].
//!
//! [`Storage::read`] has zero-fill semantics: a read past the end of the
//! storage yields zero bytes rather than an error. The trie relies on this
//! when probing value records near the end of the file.

mod cache;
mod file;
mod memory;
mod pool;

pub use cache::CacheStorage;
pub use file::FileStorage;
pub use memory::MemStorage;
pub use pool::{NoPageAvailableError, PagePool};

use eyre::Result;

/// Byte-addressed storage with explicit length and flush.
pub trait Storage {
    /// Current length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `out.len()` bytes starting at `offset`. The portion of the
    /// range past the end of the storage is filled with zeroes.
    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Writes `data` at `offset`, extending the storage when the range
    /// ends past the current length.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Grows or truncates the storage to `new_len` bytes.
    fn resize(&mut self, new_len: u64) -> Result<()>;

    /// Makes all prior writes durable on the backing medium.
    fn flush(&mut self) -> Result<()>;

    /// Borrows `len` bytes at `offset` without copying, when the range is
    /// contiguously resident. Implementations that cannot lend a stable
    /// slice return `None` and callers fall back to [`Storage::read`].
    fn try_direct_read(&mut self, offset: u64, len: usize) -> Option<&[u8]> {
        let _ = (offset, len);
        None
    }
}

/// Extension helpers shared by every [`Storage`] implementation.
pub trait StorageExt: Storage {
    /// Appends `data` at the current end and returns the offset it was
    /// written at.
    fn write_to_end(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.len();
        self.write(offset, data)?;
        Ok(offset)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

//! # triedb
//!
//! Embedded key/value storage engine: one table per file, keys ordered
//! and prefix-searchable, backed by a disk-resident byte-granular radix
//! trie with a buffered page cache.
//!
//! ```no_run
//! use triedb::{CacheSettings, CacheStorage, EnumerationOrder, FileStorage, Trie};
//!
//! # fn main() -> eyre::Result<()> {
//! let file = FileStorage::open("table.trie")?;
//! let cache = CacheStorage::new(file, CacheSettings::default());
//! let mut trie = Trie::open_or_init(cache)?;
//!
//! trie.insert(b"key/1", b"hello")?;
//! trie.insert(b"key/2", b"world")?;
//! for row in trie.scan_prefix(b"key/", EnumerationOrder::Ordered)? {
//!     let row = row?;
//!     println!("{:?} = {:?}", row.key, row.value);
//! }
//! trie.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! Lookups cost O(key length) regardless of table size. Mutations are
//! append-mostly and stay buffered in the page cache until
//! [`Trie::flush`]; a crash before the flush leaves the previous state
//! intact. Dead space left behind by updates is reclaimed with
//! [`Trie::defragment`].
//!
//! The on-disk format is byte-compatible with the DBreeze/DBTrie file
//! layout, down to its `"dbreeze.tiesky.com"` magic.

pub mod config;
pub(crate) mod macros;
pub mod storage;
pub mod trie;

pub use config::CacheSettings;
pub use storage::{
    CacheStorage, FileStorage, MemStorage, NoPageAvailableError, PagePool, Storage, StorageExt,
};
pub use trie::{CancelToken, EnumerationOrder, FormatError, PrefixScan, Row, Trie};

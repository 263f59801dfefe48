//! # Trie Engine
//!
//! One table, one file. The engine stores key/value pairs in a
//! byte-granular radix trie laid out directly in a
//! [`Storage`](crate::storage::Storage): a 64-byte header anchors a tree of
//! variable-length nodes and append-only value records, all linked by
//! 5-byte big-endian pointers.
//!
//! The module split follows the on-disk structures: [`header`] for the
//! file header, [`node`] and [`value`] for the two record kinds,
//! [`tree`] for the mutation and lookup algorithms, [`enumerate`] for
//! prefix scans, and [`defrag`] for compaction.

pub(crate) mod cache;
pub mod defrag;
pub mod enumerate;
pub mod header;
pub(crate) mod io;
pub(crate) mod node;
pub mod tree;
pub mod value;

pub use defrag::CancelToken;
pub use enumerate::{EnumerationOrder, PrefixScan};
pub use header::{FormatError, MAGIC};
pub use tree::Trie;
pub use value::Row;

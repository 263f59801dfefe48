//! Fixed sizes of the on-disk format.
//!
//! Every offset stored in the file is a 5-byte big-endian pointer, which
//! caps the addressable file size at 1 TiB. Node lines and value records
//! are described in terms of these constants; changing any of them breaks
//! compatibility with existing files.

/// Width of an on-disk pointer in bytes (40-bit big-endian).
pub const POINTER_LEN: usize = 5;

/// Width of a node slot: label byte, kind byte, pointer.
pub const SLOT_LEN: usize = 2 + POINTER_LEN;

/// Size of the root header at offset 0.
pub const ROOT_SIZE: usize = 64;

/// A node can carry at most one slot per possible label byte.
pub const MAX_SLOT_COUNT: usize = 256;

/// Smallest possible node: length prefix, internal pointer, one slot.
pub const NODE_MIN_SIZE: usize = 2 + POINTER_LEN + SLOT_LEN;

/// Largest possible node: length prefix, internal pointer, 256 slots.
pub const MAX_NODE_SIZE: usize = 2 + POINTER_LEN + MAX_SLOT_COUNT * SLOT_LEN;

/// Largest value representable by a 5-byte pointer.
pub const MAX_POINTER: u64 = (1 << (POINTER_LEN as u64 * 8)) - 1;

/// Keys are length-prefixed with a u16.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Value lengths are stored in 31 bits; the top bit is the null marker.
pub const MAX_VALUE_LEN: usize = 0x7FFF_FFFF;

/// Top bit of the stored value length, marking an absent payload.
pub const NULL_VALUE_BIT: u32 = 0x8000_0000;

/// First read issued when decoding a value record. Covers the header and
/// the whole key for all but unusually long keys.
pub const VALUE_PROBE_LEN: usize = 256;

/// Default page size of the buffering storage layer.
pub const DEFAULT_PAGE_SIZE: usize = 8192;

const _: () = assert!(NODE_MIN_SIZE == 14);
const _: () = assert!(MAX_NODE_SIZE == 1799);
const _: () = assert!(MAX_NODE_SIZE < DEFAULT_PAGE_SIZE);
const _: () = assert!(VALUE_PROBE_LEN > ROOT_SIZE);

//! Root header of a trie file.
//!
//! The first 64 bytes of every file identify the format and anchor the
//! structure:
//!
//! ```text
//!   offset  size  field
//!        0     2  format markers, both 0x01
//!        2     5  root node pointer (big-endian)
//!        7     8  record count (big-endian u64)
//!       15    18  magic "dbreeze.tiesky.com"
//!       33    31  reserved, zero
//! ```
//!
//! The root pointer and record count are patched in place on every
//! mutation; the rest of the header is written once at initialization.

use std::fmt;

use zerocopy::big_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::constants::{MAX_POINTER, POINTER_LEN, ROOT_SIZE};
use crate::macros::be_accessors;
use crate::trie::io::{encode_u40, read_u40};

/// Wire-compatibility magic carried by every trie file.
pub const MAGIC: &[u8; 18] = b"dbreeze.tiesky.com";

/// Expected value of both format marker bytes.
pub const FORMAT_MARKER: u8 = 1;

/// File offset of the root node pointer inside the header.
pub(crate) const ROOT_POINTER_OFFSET: u64 = 2;

/// File offset of the record count inside the header.
pub(crate) const RECORD_COUNT_OFFSET: u64 = 7;

/// The file is not a trie file or uses an unknown layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatError {
    reason: &'static str,
}

impl FormatError {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid trie file: {}", self.reason)
    }
}

impl std::error::Error for FormatError {}

/// Fixed-layout view of the 64-byte root header.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Clone, Copy)]
#[repr(C)]
pub struct RootHeader {
    markers: [u8; 2],
    root_pointer: [u8; POINTER_LEN],
    record_count: U64,
    magic: [u8; 18],
    reserved: [u8; 31],
}

const _: () = assert!(std::mem::size_of::<RootHeader>() == ROOT_SIZE);

impl RootHeader {
    /// Header of a freshly initialized file.
    pub fn new(root_pointer: u64) -> Self {
        let mut header = Self {
            markers: [FORMAT_MARKER; 2],
            root_pointer: [0; POINTER_LEN],
            record_count: U64::new(0),
            magic: *MAGIC,
            reserved: [0; 31],
        };
        header.set_root_pointer(root_pointer);
        header
    }

    /// Parses and validates the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < ROOT_SIZE {
            return Err(FormatError::new("file shorter than the root header"));
        }
        let header = Self::read_from_bytes(&bytes[..ROOT_SIZE])
            .map_err(|_| FormatError::new("malformed root header"))?;
        if header.markers != [FORMAT_MARKER; 2] {
            return Err(FormatError::new("unknown format marker"));
        }
        if header.magic != *MAGIC {
            return Err(FormatError::new("magic mismatch"));
        }
        if header.root_pointer() < ROOT_SIZE as u64 {
            return Err(FormatError::new("root pointer inside the header"));
        }
        Ok(header)
    }

    pub fn root_pointer(&self) -> u64 {
        read_u40(&self.root_pointer)
    }

    pub fn set_root_pointer(&mut self, pointer: u64) {
        debug_assert!(pointer <= MAX_POINTER);
        encode_u40(&mut self.root_pointer, pointer);
    }

    be_accessors! {
        /// Number of live records in the file.
        record_count: u64,
    }
}

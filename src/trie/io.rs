//! Pointer and slot codecs.
//!
//! Everything the trie stores is addressed by a 5-byte big-endian
//! pointer. A slot is a 7-byte cell `[label, kind, pointer]` where kind 0
//! links to a child node and kind 1 to a value record; an all-zero slot
//! is free.

use eyre::{ensure, Result};

use crate::config::constants::{MAX_POINTER, POINTER_LEN, SLOT_LEN};
use crate::storage::Storage;

pub(crate) const KIND_NODE: u8 = 0;
pub(crate) const KIND_VALUE: u8 = 1;

/// Decodes a 5-byte big-endian pointer.
pub(crate) fn read_u40(bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() >= POINTER_LEN);
    let mut value = 0u64;
    for &b in &bytes[..POINTER_LEN] {
        value = (value << 8) | b as u64;
    }
    value
}

/// Encodes `value` as a 5-byte big-endian pointer.
pub(crate) fn encode_u40(out: &mut [u8], value: u64) {
    debug_assert!(out.len() >= POINTER_LEN);
    debug_assert!(value <= MAX_POINTER);
    for (i, slot) in out[..POINTER_LEN].iter_mut().enumerate() {
        *slot = (value >> ((POINTER_LEN - 1 - i) * 8)) as u8;
    }
}

/// Writes a pointer cell at `offset`.
pub(crate) fn write_pointer<S: Storage>(storage: &mut S, offset: u64, value: u64) -> Result<()> {
    ensure!(value <= MAX_POINTER, "pointer {value:#x} exceeds 5-byte range");
    let mut buf = [0u8; POINTER_LEN];
    encode_u40(&mut buf, value);
    storage.write(offset, &buf)
}

/// Reads a pointer cell at `offset`.
pub(crate) fn read_pointer<S: Storage>(storage: &mut S, offset: u64) -> Result<u64> {
    let mut buf = [0u8; POINTER_LEN];
    storage.read(offset, &mut buf)?;
    Ok(read_u40(&buf))
}

/// Writes a full slot at `offset`.
pub(crate) fn write_slot<S: Storage>(
    storage: &mut S,
    offset: u64,
    label: u8,
    links_to_node: bool,
    pointer: u64,
) -> Result<()> {
    ensure!(pointer <= MAX_POINTER, "pointer {pointer:#x} exceeds 5-byte range");
    let mut buf = [0u8; SLOT_LEN];
    buf[0] = label;
    buf[1] = if links_to_node { KIND_NODE } else { KIND_VALUE };
    encode_u40(&mut buf[2..], pointer);
    storage.write(offset, &buf)
}

/// Zeroes the slot at `offset`, marking it free.
pub(crate) fn clear_slot<S: Storage>(storage: &mut S, offset: u64) -> Result<()> {
    storage.write(offset, &[0u8; SLOT_LEN])
}

/// Writes a big-endian u64 at `offset`.
pub(crate) fn write_u64<S: Storage>(storage: &mut S, offset: u64, value: u64) -> Result<()> {
    storage.write(offset, &value.to_be_bytes())
}

//! Value records.
//!
//! A value record stores one key/value pair contiguously:
//!
//! ```text
//!   [protocol u8][key_len u16][value_len u32][max_len u32?][key][value]
//! ```
//!
//! Protocol 0 has the 7-byte header and no slack: the payload occupies
//! exactly `value_len` bytes. Protocol 1 adds a 4-byte `max_len` field
//! recording the slack reserved for in-place overwrites; it only ever
//! appears when an existing record is rewritten with a shorter value, so
//! the record's footprint in the file never changes after it is written.
//! The top bit of `value_len` marks an absent payload; this decoder
//! accepts it but the engine never writes it.

use eyre::{ensure, Result};

use crate::config::constants::{NULL_VALUE_BIT, VALUE_PROBE_LEN};
use crate::trie::header::FormatError;

/// One key/value pair returned by lookups and scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Row {
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }
}

/// Decoded value record header plus key; the payload stays on disk.
#[derive(Debug, Clone)]
pub(crate) struct ValueRecord {
    /// File offset of the record.
    pub pointer: u64,
    pub key: Vec<u8>,
    /// Length of the live payload.
    pub value_len: usize,
    /// Reserved payload capacity; equals `value_len` for protocol 0.
    pub value_max_len: usize,
    /// File offset of the payload.
    pub value_pointer: u64,
    pub is_null: bool,
}

impl ValueRecord {
    pub fn header_len(protocol: u8) -> usize {
        if protocol == 0 {
            7
        } else {
            11
        }
    }

    /// Bytes the record occupies in the file, counting reserved slack.
    pub fn footprint(&self) -> u64 {
        (Self::header_len(0) + self.key.len() + self.value_max_len) as u64
    }

    /// Decodes the record at `pointer` from `buf`, which must start at
    /// the record and cover its header and key.
    pub fn parse(pointer: u64, buf: &[u8]) -> Result<Self> {
        ensure!(buf.len() >= 7, FormatError::new("truncated value record"));
        let protocol = buf[0];
        ensure!(protocol <= 1, FormatError::new("unknown value record protocol"));
        let key_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        let header_len = Self::header_len(protocol);
        ensure!(
            buf.len() >= header_len + key_len,
            FormatError::new("value record key out of bounds")
        );
        let raw_len = u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]);
        let is_null = raw_len & NULL_VALUE_BIT != 0;
        let value_len = if is_null { 0 } else { raw_len as usize };
        let value_max_len = if protocol == 0 {
            value_len
        } else {
            u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize
        };
        ensure!(
            value_len <= value_max_len,
            FormatError::new("value length exceeds its reservation")
        );
        let key = buf[header_len..header_len + key_len].to_vec();
        Ok(Self {
            pointer,
            key,
            value_len,
            value_max_len,
            value_pointer: pointer + (header_len + key_len) as u64,
            is_null,
        })
    }

    /// Number of bytes [`ValueRecord::parse`] needs, learnable from the
    /// first [`VALUE_PROBE_LEN`] bytes.
    pub fn required_len(buf: &[u8]) -> Result<usize> {
        ensure!(buf.len() >= 3, FormatError::new("truncated value record"));
        let protocol = buf[0];
        ensure!(protocol <= 1, FormatError::new("unknown value record protocol"));
        let key_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        Ok(Self::header_len(protocol) + key_len)
    }

    /// Encodes a fresh record. New records are always protocol 0.
    pub fn encode_new(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(7 + key.len() + value.len());
        out.push(0);
        out.extend_from_slice(&(key.len() as u16).to_be_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(value);
        out
    }

    /// Encodes an in-place overwrite of this record with `value`, which
    /// must fit in the reserved capacity. The encoding switches to
    /// protocol 0 when the 4-byte `max_len` field no longer fits in
    /// front of the shrunken payload, so the rewrite never grows the
    /// record past its original footprint.
    pub fn encode_overwrite(&self, value: &[u8]) -> Vec<u8> {
        debug_assert!(value.len() <= self.value_max_len);
        let protocol: u8 = if self.value_max_len < value.len() + 4 { 0 } else { 1 };
        let mut out = Vec::with_capacity(Self::header_len(protocol) + self.key.len() + value.len());
        out.push(protocol);
        out.extend_from_slice(&(self.key.len() as u16).to_be_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        if protocol == 1 {
            out.extend_from_slice(&(self.value_max_len as u32).to_be_bytes());
        }
        out.extend_from_slice(&self.key);
        out.extend_from_slice(value);
        out
    }
}

const _: () = assert!(VALUE_PROBE_LEN >= 11);

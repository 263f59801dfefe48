//! Trie nodes.
//!
//! A node is a variable-length line of slots:
//!
//! ```text
//!   [line_len u16][internal ptr 5B][slot 7B] ... [slot 7B]
//! ```
//!
//! `line_len` counts everything after the length prefix, so a node with
//! `n` reserved slots occupies `2 + 5 + 7n` bytes. The internal pointer,
//! when non-zero, addresses the value record whose key ends exactly at
//! this node's depth. Slots with a zero pointer are free; they are
//! reserved ahead of need so that adding a child rarely forces the node
//! to move.
//!
//! Two representations exist. [`NodeLine`] is a read-only view over the
//! raw line, cheap enough to build on every traversal step. [`Node`] is
//! the materialized form used while mutating: it indexes links by label,
//! tracks free slots, and can serialize itself for relocation.

use std::collections::{BTreeMap, VecDeque};

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::constants::{MAX_NODE_SIZE, MAX_SLOT_COUNT, POINTER_LEN, SLOT_LEN};
use crate::trie::header::FormatError;
use crate::trie::io::{encode_u40, read_u40, KIND_NODE};

/// Slots reserved for a node that must hold `needed` links.
///
/// Doubling schedule; over-reserving trades file space for fewer node
/// relocations as a node's fanout grows.
pub(crate) fn slot_reservation(needed: usize) -> usize {
    debug_assert!(needed <= MAX_SLOT_COUNT);
    match needed {
        0..=1 => 1,
        2 => 2,
        3..=4 => 4,
        5..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        33..=64 => 64,
        65..=128 => 128,
        _ => 256,
    }
}

/// An outgoing edge of a node.
///
/// `label` is `None` for the internal link (key ends at this node) and
/// `Some` for a labeled slot. `own_pointer` is where the edge itself is
/// stored: the slot offset, or `node + 2` for the internal link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub label: Option<u8>,
    pub pointer: u64,
    pub own_pointer: u64,
    pub links_to_node: bool,
}

/// An occupied slot as read straight off the line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotView {
    pub own_pointer: u64,
    pub label: u8,
    pub links_to_node: bool,
    pub pointer: u64,
}

impl SlotView {
    pub fn to_link(self) -> Link {
        Link {
            label: Some(self.label),
            pointer: self.pointer,
            own_pointer: self.own_pointer,
            links_to_node: self.links_to_node,
        }
    }
}

/// Raw bytes of one node line, owned inline for typical small nodes.
#[derive(Debug)]
pub(crate) struct NodeLine {
    pub pointer: u64,
    buf: SmallVec<[u8; 64]>,
}

impl NodeLine {
    pub fn new(pointer: u64, buf: SmallVec<[u8; 64]>) -> Result<Self> {
        ensure!(buf.len() >= 2, FormatError::new("truncated node line"));
        let line_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        ensure!(
            line_len >= POINTER_LEN
                && (line_len - POINTER_LEN) % SLOT_LEN == 0
                && 2 + line_len <= MAX_NODE_SIZE,
            FormatError::new("invalid node line length")
        );
        ensure!(buf.len() == 2 + line_len, FormatError::new("truncated node line"));
        Ok(Self { pointer, buf })
    }

    /// Bytes after the 2-byte length prefix.
    pub fn line_length(&self) -> usize {
        self.buf.len() - 2
    }

    pub fn slot_capacity(&self) -> usize {
        (self.line_length() - POINTER_LEN) / SLOT_LEN
    }

    pub fn internal_link_pointer(&self) -> u64 {
        read_u40(&self.buf[2..])
    }

    pub fn internal_link(&self) -> Option<Link> {
        let pointer = self.internal_link_pointer();
        (pointer != 0).then(|| Link {
            label: None,
            pointer,
            own_pointer: self.pointer + 2,
            links_to_node: false,
        })
    }

    fn raw_slot(&self, index: usize) -> (u64, SlotView) {
        let at = 2 + POINTER_LEN + index * SLOT_LEN;
        let cell = &self.buf[at..at + SLOT_LEN];
        let own_pointer = self.pointer + at as u64;
        let view = SlotView {
            own_pointer,
            label: cell[0],
            links_to_node: cell[1] == KIND_NODE,
            pointer: read_u40(&cell[2..]),
        };
        (own_pointer, view)
    }

    /// Occupied slots in physical order.
    pub fn slots(&self) -> impl Iterator<Item = SlotView> + '_ {
        (0..self.slot_capacity())
            .map(|i| self.raw_slot(i).1)
            .filter(|slot| slot.pointer != 0)
    }

    /// First occupied slot carrying `label`.
    pub fn find_label(&self, label: u8) -> Option<SlotView> {
        self.slots().find(|slot| slot.label == label)
    }
}

/// Materialized node used during mutation.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub own_pointer: u64,
    /// Depth of this node: length of the key prefix leading to it.
    pub min_key_length: usize,
    pub line_length: usize,
    pub internal_link: Option<Link>,
    links: BTreeMap<u8, Link>,
    pub free_slots: VecDeque<u64>,
}

impl Node {
    /// Builds a node from its raw line.
    ///
    /// A slot whose label duplicates an earlier one is unreachable
    /// (lookups take the first match) and is treated as free.
    pub fn from_line(line: &NodeLine, min_key_length: usize) -> Self {
        let mut links = BTreeMap::new();
        let mut free_slots = VecDeque::new();
        for i in 0..line.slot_capacity() {
            let (own_pointer, slot) = line.raw_slot(i);
            if slot.pointer == 0 || links.contains_key(&slot.label) {
                free_slots.push_back(own_pointer);
            } else {
                links.insert(slot.label, slot.to_link());
            }
        }
        Self {
            own_pointer: line.pointer,
            min_key_length,
            line_length: line.line_length(),
            internal_link: line.internal_link(),
            links,
            free_slots,
        }
    }

    /// Raw bytes of a fresh empty node with `reserved` free slots.
    pub fn encode_empty(reserved: usize) -> Vec<u8> {
        let line_len = POINTER_LEN + reserved * SLOT_LEN;
        let mut out = vec![0u8; 2 + line_len];
        out[..2].copy_from_slice(&(line_len as u16).to_be_bytes());
        out
    }

    pub fn link(&self, label: u8) -> Option<&Link> {
        self.links.get(&label)
    }

    pub fn link_mut(&mut self, label: u8) -> Option<&mut Link> {
        self.links.get_mut(&label)
    }

    pub fn insert_link(&mut self, link: Link) {
        let label = link.label.expect("labeled link");
        let prev = self.links.insert(label, link);
        debug_assert!(prev.is_none(), "label already linked");
    }

    pub fn remove_link(&mut self, label: u8) -> Option<Link> {
        self.links.remove(&label)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Label of the slot pointing at `pointer`, used to find the edge a
    /// parent holds to a child node.
    pub fn label_of_pointer(&self, pointer: u64) -> Option<u8> {
        self.links
            .values()
            .find(|link| link.links_to_node && link.pointer == pointer)
            .and_then(|link| link.label)
    }

    /// The one remaining value link, when this node has exactly one slot
    /// link left, it links to a value, and no internal link exists. The
    /// node is then collapsible.
    pub fn remaining_single_value_link(&self) -> Option<Link> {
        if self.internal_link.is_some() || self.links.len() != 1 {
            return None;
        }
        self.links
            .values()
            .next()
            .filter(|link| !link.links_to_node)
            .cloned()
    }

    /// Serializes the node into a fresh line with `reserved` slots,
    /// keeping every live link at its current relative offset. Callers
    /// only grow full nodes, so live slots are contiguous and the new
    /// free slots all land after them.
    pub fn serialize(&self, reserved: usize) -> Vec<u8> {
        debug_assert!(reserved >= self.links.len());
        let line_len = POINTER_LEN + reserved * SLOT_LEN;
        let mut out = vec![0u8; 2 + line_len];
        out[..2].copy_from_slice(&(line_len as u16).to_be_bytes());
        if let Some(internal) = &self.internal_link {
            encode_u40(&mut out[2..], internal.pointer);
        }
        let mut ordered: Vec<&Link> = self.links.values().collect();
        ordered.sort_unstable_by_key(|link| link.own_pointer);
        let base = self.own_pointer + 2 + POINTER_LEN as u64;
        for link in ordered {
            debug_assert!(link.own_pointer >= base);
            let at = 2 + POINTER_LEN + (link.own_pointer - base) as usize;
            let label = link.label.expect("labeled link");
            out[at] = label;
            out[at + 1] = if link.links_to_node { 0 } else { 1 };
            encode_u40(&mut out[at + 2..], link.pointer);
        }
        out
    }

    /// Structural equality ignoring free-slot ordering, which mutation
    /// reshuffles relative to a fresh parse of the same line.
    pub fn same_shape(&self, other: &Node) -> bool {
        let mut ours: Vec<u64> = self.free_slots.iter().copied().collect();
        let mut theirs: Vec<u64> = other.free_slots.iter().copied().collect();
        ours.sort_unstable();
        theirs.sort_unstable();
        self.own_pointer == other.own_pointer
            && self.min_key_length == other.min_key_length
            && self.line_length == other.line_length
            && self.internal_link == other.internal_link
            && self.links == other.links
            && ours == theirs
    }

    /// Rebinds the in-memory node to its new location after the line was
    /// rewritten at `new_pointer` with `new_line_length` bytes. Live
    /// links keep their relative offsets; the grown tail becomes free
    /// slots.
    pub fn relocate(&mut self, new_pointer: u64, new_line_length: usize) {
        let shift = new_pointer - self.own_pointer;
        if let Some(internal) = &mut self.internal_link {
            internal.own_pointer = new_pointer + 2;
        }
        for link in self.links.values_mut() {
            link.own_pointer += shift;
        }
        for slot in &mut self.free_slots {
            *slot += shift;
        }
        let old_end = new_pointer + 2 + self.line_length as u64;
        let new_end = new_pointer + 2 + new_line_length as u64;
        let mut at = old_end;
        while at < new_end {
            self.free_slots.push_back(at);
            at += SLOT_LEN as u64;
        }
        self.own_pointer = new_pointer;
        self.line_length = new_line_length;
    }
}

//! # Radix Trie Engine
//!
//! Disk-resident byte-granular radix trie. Keys branch one byte at a
//! time: a node at depth `d` covers every stored key sharing a given
//! `d`-byte prefix, its labeled slots lead to deeper nodes or directly
//! to value records, and its internal link holds the record whose key is
//! exactly the prefix.
//!
//! ```text
//!   header ── root node ──'a'──> node(depth 1) ──internal──> rec "a"
//!                                    │
//!                                   'b'──> rec "ab..."
//! ```
//!
//! ## Why
//!
//! Lookup cost is bounded by key length, never by table size, and keys
//! sharing prefixes share their path. All structures are append-mostly:
//! new nodes and records go to the end of the file, existing ones are
//! patched through fixed-size pointer cells. The one exception is a node
//! that ran out of slots, which is rewritten at the end of the file and
//! its single incoming pointer repointed, so a torn write can orphan
//! space but never corrupt the reachable structure. Orphaned space is
//! reclaimed by [`Trie::defragment`](crate::trie::defrag).
//!
//! Mutations never reach the backing file until the storage is flushed;
//! see [`CacheStorage`](crate::storage::CacheStorage).

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::constants::{
    MAX_KEY_LEN, MAX_VALUE_LEN, NODE_MIN_SIZE, POINTER_LEN, ROOT_SIZE, VALUE_PROBE_LEN,
};
use crate::storage::{Storage, StorageExt};
use crate::trie::cache::NodeCache;
use crate::trie::header::{FormatError, RootHeader, RECORD_COUNT_OFFSET, ROOT_POINTER_OFFSET};
use crate::trie::io;
use crate::trie::node::{slot_reservation, Link, Node, NodeLine};
use crate::trie::value::{Row, ValueRecord};
use zerocopy::IntoBytes;

/// Where a key's walk down the trie stopped.
#[derive(Debug)]
pub(crate) struct Seek {
    /// Deepest node reached.
    pub best_pointer: u64,
    /// Depth of the best node.
    pub best_depth: usize,
    /// Parent of the best node, absent at the root.
    pub parent_pointer: Option<u64>,
    /// Value link that ended the walk: the slot hit mid-key, or the
    /// best node's internal link when the key was exhausted.
    pub value_link: Option<Link>,
    /// Label with no slot in the best node, when the walk fell off.
    pub missing_label: Option<u8>,
}

/// [`Seek`] with its nodes materialized for mutation.
pub(crate) struct MatchResult {
    pub best: Node,
    pub parent: Option<Node>,
    pub value_link: Option<Link>,
    pub missing_label: Option<u8>,
}

/// A key/value table stored in a single [`Storage`].
#[derive(Debug)]
pub struct Trie<S: Storage> {
    storage: S,
    root_pointer: u64,
    record_count: u64,
    node_cache: Option<NodeCache>,
    consistency_check: bool,
}

impl<S: Storage> Trie<S> {
    /// Opens an existing trie, failing with [`FormatError`] when the
    /// storage does not hold one.
    pub fn open(mut storage: S) -> Result<Self> {
        let mut buf = [0u8; ROOT_SIZE];
        storage.read(0, &mut buf)?;
        let header = RootHeader::parse(&buf).map_err(eyre::Report::new)?;
        tracing::debug!(
            root = header.root_pointer(),
            records = header.record_count(),
            "opened trie"
        );
        Ok(Self {
            storage,
            root_pointer: header.root_pointer(),
            record_count: header.record_count(),
            node_cache: None,
            consistency_check: false,
        })
    }

    /// Initializes an empty trie, overwriting whatever the storage held.
    pub fn init(mut storage: S) -> Result<Self> {
        let header = RootHeader::new(ROOT_SIZE as u64);
        let empty_root = Node::encode_empty(1);
        let mut bytes = Vec::with_capacity(ROOT_SIZE + empty_root.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&empty_root);
        if storage.len() > bytes.len() as u64 {
            storage.resize(bytes.len() as u64)?;
        }
        storage.write(0, &bytes)?;
        storage.flush()?;
        tracing::debug!("initialized empty trie");
        Ok(Self {
            storage,
            root_pointer: ROOT_SIZE as u64,
            record_count: 0,
            node_cache: None,
            consistency_check: false,
        })
    }

    /// Opens the trie when the storage holds one, initializes a fresh
    /// one when it is empty or unrecognizable.
    pub fn open_or_init(mut storage: S) -> Result<Self> {
        let mut buf = [0u8; ROOT_SIZE];
        storage.read(0, &mut buf)?;
        match RootHeader::parse(&buf) {
            Ok(_) => Self::open(storage),
            Err(err) => {
                tracing::debug!(%err, "storage holds no trie, initializing");
                Self::init(storage)
            }
        }
    }

    /// Number of live records.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub(crate) fn root_pointer(&self) -> u64 {
        self.root_pointer
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Flushes buffered writes down to the backing medium.
    pub fn flush(&mut self) -> Result<()> {
        self.storage.flush()
    }

    /// Keeps materialized nodes across operations. Worth it for hot
    /// tables; the cache is dropped wholesale by defragmentation.
    pub fn activate_node_cache(&mut self) {
        if self.node_cache.is_none() {
            self.node_cache = Some(NodeCache::new());
        }
    }

    /// Number of nodes currently held by the node cache.
    pub fn node_cache_len(&self) -> usize {
        self.node_cache.as_ref().map_or(0, NodeCache::len)
    }

    /// Re-reads every touched node from storage after each mutation and
    /// panics on divergence. Debugging aid, not for production use.
    pub fn set_consistency_check(&mut self, enable: bool) {
        self.consistency_check = enable;
    }

    // ------------------------------------------------------------------
    // Reads

    /// Looks up `key`, returning its value.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.get_row(key)?.map(|row| row.value))
    }

    /// Looks up `key`, returning the full row.
    pub fn get_row(&mut self, key: &[u8]) -> Result<Option<Row>> {
        if !key_storable(key) {
            return Ok(None);
        }
        let seek = self.seek(key)?;
        let Some(link) = seek.value_link else {
            return Ok(None);
        };
        let record = self.read_value(link.pointer)?;
        if record.key != key {
            return Ok(None);
        }
        let value = self.read_value_payload(&record)?;
        Ok(Some(Row {
            key: record.key,
            value,
        }))
    }

    pub fn contains_key(&mut self, key: &[u8]) -> Result<bool> {
        if !key_storable(key) {
            return Ok(false);
        }
        let seek = self.seek(key)?;
        match seek.value_link {
            Some(link) => Ok(self.read_value(link.pointer)?.key == key),
            None => Ok(false),
        }
    }

    /// Walks the trie along `key` without materializing nodes.
    pub(crate) fn seek(&mut self, key: &[u8]) -> Result<Seek> {
        let mut line = self.read_node_line(self.root_pointer)?;
        let mut parent_pointer = None;
        for (i, &label) in key.iter().enumerate() {
            match line.find_label(label) {
                None => {
                    return Ok(Seek {
                        best_pointer: line.pointer,
                        best_depth: i,
                        parent_pointer,
                        value_link: None,
                        missing_label: Some(label),
                    });
                }
                Some(slot) if !slot.links_to_node => {
                    return Ok(Seek {
                        best_pointer: line.pointer,
                        best_depth: i,
                        parent_pointer,
                        value_link: Some(slot.to_link()),
                        missing_label: None,
                    });
                }
                Some(slot) => {
                    parent_pointer = Some(line.pointer);
                    line = self.read_node_line(slot.pointer)?;
                }
            }
        }
        Ok(Seek {
            best_pointer: line.pointer,
            best_depth: key.len(),
            parent_pointer,
            value_link: line.internal_link(),
            missing_label: None,
        })
    }

    pub(crate) fn find_best_match(&mut self, key: &[u8]) -> Result<MatchResult> {
        let seek = self.seek(key)?;
        let best = self.read_node(seek.best_pointer, seek.best_depth)?;
        let parent = match seek.parent_pointer {
            Some(pointer) => Some(self.read_node(pointer, seek.best_depth - 1)?),
            None => None,
        };
        Ok(MatchResult {
            best,
            parent,
            value_link: seek.value_link,
            missing_label: seek.missing_label,
        })
    }

    /// Reads the raw line of the node at `pointer`.
    pub(crate) fn read_node_line(&mut self, pointer: u64) -> Result<NodeLine> {
        ensure!(
            pointer >= ROOT_SIZE as u64,
            FormatError::new("node pointer inside the header")
        );
        let mut head = [0u8; 2];
        if let Some(bytes) = self.storage.try_direct_read(pointer, NODE_MIN_SIZE) {
            head.copy_from_slice(&bytes[..2]);
        } else {
            self.storage.read(pointer, &mut head)?;
        }
        let line_len = u16::from_be_bytes(head) as usize;
        let total = 2 + line_len;
        let mut buf = SmallVec::new();
        if let Some(bytes) = self.storage.try_direct_read(pointer, total) {
            buf.extend_from_slice(bytes);
        } else {
            buf.resize(total, 0);
            self.storage.read(pointer, &mut buf)?;
        }
        NodeLine::new(pointer, buf)
    }

    /// Materializes the node at `pointer`, through the cache when one is
    /// active.
    pub(crate) fn read_node(&mut self, pointer: u64, min_key_length: usize) -> Result<Node> {
        let cached = self
            .node_cache
            .as_ref()
            .and_then(|cache| cache.get(pointer).cloned());
        if let Some(node) = cached {
            assert_eq!(
                node.min_key_length, min_key_length,
                "node cache out of sync: depth mismatch at {pointer:#x}"
            );
            if self.consistency_check {
                self.check_node(&node)?;
            }
            return Ok(node);
        }
        let line = self.read_node_line(pointer)?;
        let node = Node::from_line(&line, min_key_length);
        self.cache_put(&node);
        Ok(node)
    }

    fn cache_put(&mut self, node: &Node) {
        if let Some(cache) = self.node_cache.as_mut() {
            cache.insert(node.clone());
        }
    }

    fn check_node(&mut self, node: &Node) -> Result<()> {
        let line = self.read_node_line(node.own_pointer)?;
        let fresh = Node::from_line(&line, node.min_key_length);
        assert!(
            node.same_shape(&fresh),
            "in-memory node at {:#x} diverged from storage",
            node.own_pointer
        );
        Ok(())
    }

    /// Decodes the value record at `pointer`, leaving the payload on
    /// disk. The fixed-size probe covers the whole record head for all
    /// but unusually long keys; past-end reads zero-fill, and a zero
    /// protocol byte with zero key length parses into an empty record
    /// rather than tripping bounds checks.
    pub(crate) fn read_value(&mut self, pointer: u64) -> Result<ValueRecord> {
        let mut probe = [0u8; VALUE_PROBE_LEN];
        self.storage.read(pointer, &mut probe)?;
        let required = ValueRecord::required_len(&probe)?;
        if required <= probe.len() {
            return ValueRecord::parse(pointer, &probe);
        }
        let mut buf = vec![0u8; required];
        self.storage.read(pointer, &mut buf)?;
        ValueRecord::parse(pointer, &buf)
    }

    pub(crate) fn read_value_payload(&mut self, record: &ValueRecord) -> Result<Vec<u8>> {
        if record.is_null || record.value_len == 0 {
            return Ok(Vec::new());
        }
        let mut value = vec![0u8; record.value_len];
        self.storage.read(record.value_pointer, &mut value)?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Writes

    /// Stores `key` -> `value`, overwriting any existing value. Returns
    /// whether a new record was created.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        ensure!(
            !key.is_empty() && key.len() <= MAX_KEY_LEN,
            "key length must be 1..={MAX_KEY_LEN} bytes"
        );
        ensure!(
            value.len() <= MAX_VALUE_LEN,
            "value exceeds {MAX_VALUE_LEN} bytes"
        );
        let mut res = self.find_best_match(key)?;
        let inserted = match res.value_link.take() {
            None => {
                let old_pointer = res.best.own_pointer;
                match res.missing_label {
                    Some(label) => {
                        let relocated =
                            self.insert_external_value(&mut res.best, label, key, value)?;
                        if relocated {
                            self.repoint_incoming(
                                res.parent.as_mut(),
                                old_pointer,
                                res.best.own_pointer,
                            )?;
                        }
                    }
                    // The walk consumed the whole key: the record hangs
                    // off the best node's internal link.
                    None => self.set_internal_value(&mut res.best, key, value)?,
                }
                if self.consistency_check {
                    self.check_node(&res.best)?;
                    if let Some(parent) = &res.parent {
                        self.check_node(parent)?;
                    }
                }
                true
            }
            Some(_) if res.best.min_key_length == key.len() => {
                // Internal link of the best node: same key, overwrite.
                self.set_internal_value(&mut res.best, key, value)?;
                if self.consistency_check {
                    self.check_node(&res.best)?;
                }
                false
            }
            Some(link) => {
                let record = self.read_value(link.pointer)?;
                if record.key == key {
                    let label = link.label.expect("external value link carries a label");
                    self.replace_external_value(&mut res.best, label, key, value)?;
                    if self.consistency_check {
                        self.check_node(&res.best)?;
                    }
                    false
                } else {
                    self.split_leaf(res.best, record, key, value)?;
                    true
                }
            }
        };
        if inserted {
            self.set_record_count(self.record_count + 1)?;
        }
        Ok(inserted)
    }

    /// Deletes `key`. Returns whether it existed.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        if !key_storable(key) {
            return Ok(false);
        }
        let mut res = self.find_best_match(key)?;
        let Some(link) = res.value_link.take() else {
            return Ok(false);
        };
        match link.label {
            Some(label) => {
                // The slot stores a whole key suffix; confirm it is ours.
                let record = self.read_value(link.pointer)?;
                if record.key != key {
                    return Ok(false);
                }
                self.clear_external_link(&mut res.best, label)?;
            }
            None => self.clear_internal_link(&mut res.best)?,
        }
        let collapsed = match res.parent.as_mut() {
            Some(parent) => self.collapse_if_degenerate(parent, &res.best)?,
            None => false,
        };
        self.set_record_count(self.record_count - 1)?;
        if collapsed {
            if let Some(cache) = self.node_cache.as_mut() {
                cache.remove(res.best.own_pointer);
            }
        }
        if self.consistency_check {
            if !collapsed {
                self.check_node(&res.best)?;
            }
            if let Some(parent) = &res.parent {
                self.check_node(parent)?;
            }
        }
        Ok(true)
    }

    /// Converts the chain of shared key bytes between `record` and the
    /// new `key` into nodes, then attaches the new record where the two
    /// keys diverge. Freshly created nodes always have a free slot, so
    /// this path never relocates.
    fn split_leaf(
        &mut self,
        mut node: Node,
        record: ValueRecord,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let shared_max = key.len().min(record.key.len());
        let mut depth = node.min_key_length;
        while depth < shared_max && key[depth] == record.key[depth] {
            let child = self.convert_value_to_node(&mut node, key[depth], &record)?;
            if self.consistency_check {
                self.check_node(&node)?;
            }
            let child_depth = node.min_key_length + 1;
            node = self.read_node(child.pointer, child_depth)?;
            depth += 1;
        }
        if node.min_key_length == key.len() {
            self.set_internal_value(&mut node, key, value)?;
        } else {
            let label = key[node.min_key_length];
            let relocated = self.insert_external_value(&mut node, label, key, value)?;
            debug_assert!(!relocated, "fresh split nodes keep a free slot");
        }
        if self.consistency_check {
            self.check_node(&node)?;
        }
        Ok(())
    }

    /// Replaces the value link at `label` with a link to a new node one
    /// level deeper, re-homing the existing record inside it: as the
    /// internal link when its key ends there, in a labeled slot
    /// otherwise. The new node is fully written before the old slot is
    /// repointed.
    fn convert_value_to_node(
        &mut self,
        node: &mut Node,
        label: u8,
        record: &ValueRecord,
    ) -> Result<Link> {
        let link = node
            .link(label)
            .cloned()
            .expect("conversion target slot exists");
        debug_assert!(!link.links_to_node);
        let child_depth = node.min_key_length + 1;
        let record_ends_here = record.key.len() == child_depth;
        let reserved = if record_ends_here { 1 } else { 2 };
        let bytes = Node::encode_empty(reserved);
        let child_pointer = self.storage.write_to_end(&bytes)?;
        if record_ends_here {
            io::write_pointer(&mut self.storage, child_pointer + 2, link.pointer)?;
        } else {
            let slot = child_pointer + 2 + POINTER_LEN as u64;
            io::write_slot(
                &mut self.storage,
                slot,
                record.key[child_depth],
                false,
                link.pointer,
            )?;
        }
        io::write_slot(&mut self.storage, link.own_pointer, label, true, child_pointer)?;
        let slot = node.link_mut(label).expect("conversion target slot exists");
        slot.links_to_node = true;
        slot.pointer = child_pointer;
        let updated = slot.clone();
        self.cache_put(node);
        Ok(updated)
    }

    /// Puts `key` -> `value` on the internal link of `node`, reusing the
    /// existing record in place when the new value fits its reservation.
    fn set_internal_value(&mut self, node: &mut Node, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(link) = node.internal_link.clone() {
            if self.try_overwrite(&link, value)? {
                return Ok(());
            }
        }
        let pointer = self.write_new_value(key, value)?;
        io::write_pointer(&mut self.storage, node.own_pointer + 2, pointer)?;
        node.internal_link = Some(Link {
            label: None,
            pointer,
            own_pointer: node.own_pointer + 2,
            links_to_node: false,
        });
        self.cache_put(node);
        Ok(())
    }

    /// Overwrites the record behind an existing value slot.
    fn replace_external_value(
        &mut self,
        node: &mut Node,
        label: u8,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let link = node
            .link(label)
            .cloned()
            .expect("overwrite target slot exists");
        if self.try_overwrite(&link, value)? {
            return Ok(());
        }
        let pointer = self.write_new_value(key, value)?;
        io::write_slot(&mut self.storage, link.own_pointer, label, false, pointer)?;
        let slot = node.link_mut(label).expect("overwrite target slot exists");
        slot.links_to_node = false;
        slot.pointer = pointer;
        self.cache_put(node);
        Ok(())
    }

    /// Adds a new value slot at `label`, growing and relocating the node
    /// when no free slot remains. Returns whether it relocated; the
    /// caller must then repoint the node's incoming pointer.
    fn insert_external_value(
        &mut self,
        node: &mut Node,
        label: u8,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool> {
        let mut relocated = false;
        if node.free_slots.is_empty() {
            self.grow_node(node)?;
            relocated = true;
        }
        let slot_pointer = *node.free_slots.front().expect("free slot after growth");
        let pointer = self.write_new_value(key, value)?;
        io::write_slot(&mut self.storage, slot_pointer, label, false, pointer)?;
        node.free_slots.pop_front();
        node.insert_link(Link {
            label: Some(label),
            pointer,
            own_pointer: slot_pointer,
            links_to_node: false,
        });
        self.cache_put(node);
        Ok(relocated)
    }

    /// Rewrites `node` at the end of the file with a doubled slot
    /// reservation. The old line stays behind as garbage.
    fn grow_node(&mut self, node: &mut Node) -> Result<()> {
        let reserved = slot_reservation(node.link_count() + 1);
        let old_pointer = node.own_pointer;
        let bytes = node.serialize(reserved);
        let new_pointer = self.storage.write_to_end(&bytes)?;
        node.relocate(new_pointer, bytes.len() - 2);
        if let Some(cache) = self.node_cache.as_mut() {
            cache.relocate(old_pointer, new_pointer);
        }
        self.cache_put(node);
        tracing::trace!(
            old = old_pointer,
            new = new_pointer,
            reserved,
            "relocated grown node"
        );
        Ok(())
    }

    /// Repoints whatever leads into a relocated node: the parent's slot,
    /// or the root pointer in the header.
    fn repoint_incoming(
        &mut self,
        parent: Option<&mut Node>,
        old_pointer: u64,
        new_pointer: u64,
    ) -> Result<()> {
        match parent {
            Some(parent) => {
                let label = parent
                    .label_of_pointer(old_pointer)
                    .expect("parent links to relocated child");
                let slot = parent.link_mut(label).expect("parent links to relocated child");
                slot.pointer = new_pointer;
                let at = slot.own_pointer + 2;
                io::write_pointer(&mut self.storage, at, new_pointer)?;
                self.cache_put(parent);
            }
            None => {
                io::write_pointer(&mut self.storage, ROOT_POINTER_OFFSET, new_pointer)?;
                self.root_pointer = new_pointer;
            }
        }
        Ok(())
    }

    /// Collapses `node` into `parent` when the removal left it
    /// degenerate. Two shapes qualify: a single remaining value slot
    /// with no internal link, whose record the parent can point at
    /// directly, and a node with no slots at all, which either
    /// disappears or is replaced by its internal link's record.
    fn collapse_if_degenerate(&mut self, parent: &mut Node, node: &Node) -> Result<bool> {
        if let Some(remaining) = node.remaining_single_value_link() {
            let label = parent
                .label_of_pointer(node.own_pointer)
                .expect("parent links to collapsed child");
            self.repoint_slot_to_value(parent, label, remaining.pointer)?;
            return Ok(true);
        }
        if node.link_count() == 0 {
            let label = parent
                .label_of_pointer(node.own_pointer)
                .expect("parent links to collapsed child");
            match &node.internal_link {
                Some(internal) => {
                    self.repoint_slot_to_value(parent, label, internal.pointer)?;
                }
                None => {
                    self.clear_external_link(parent, label)?;
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn repoint_slot_to_value(&mut self, node: &mut Node, label: u8, pointer: u64) -> Result<()> {
        let slot = node.link_mut(label).expect("slot exists");
        slot.links_to_node = false;
        slot.pointer = pointer;
        let at = slot.own_pointer;
        io::write_slot(&mut self.storage, at, label, false, pointer)?;
        self.cache_put(node);
        Ok(())
    }

    /// Frees the slot at `label`; the record it pointed at becomes
    /// garbage.
    fn clear_external_link(&mut self, node: &mut Node, label: u8) -> Result<()> {
        let link = node.remove_link(label).expect("cleared slot exists");
        io::clear_slot(&mut self.storage, link.own_pointer)?;
        node.free_slots.push_back(link.own_pointer);
        self.cache_put(node);
        Ok(())
    }

    fn clear_internal_link(&mut self, node: &mut Node) -> Result<()> {
        debug_assert!(node.internal_link.is_some());
        io::write_pointer(&mut self.storage, node.own_pointer + 2, 0)?;
        node.internal_link = None;
        self.cache_put(node);
        Ok(())
    }

    fn try_overwrite(&mut self, link: &Link, value: &[u8]) -> Result<bool> {
        debug_assert!(!link.links_to_node);
        let record = self.read_value(link.pointer)?;
        if record.value_max_len < value.len() {
            return Ok(false);
        }
        let bytes = record.encode_overwrite(value);
        self.storage.write(link.pointer, &bytes)?;
        Ok(true)
    }

    fn write_new_value(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        let bytes = ValueRecord::encode_new(key, value);
        self.storage.write_to_end(&bytes)
    }

    /// Persists the record count in the header.
    fn set_record_count(&mut self, count: u64) -> Result<()> {
        io::write_u64(&mut self.storage, RECORD_COUNT_OFFSET, count)?;
        self.record_count = count;
        Ok(())
    }

    pub(crate) fn set_root_pointer_in_memory(&mut self, pointer: u64) {
        self.root_pointer = pointer;
    }

    pub(crate) fn clear_node_cache(&mut self) {
        if let Some(cache) = self.node_cache.as_mut() {
            cache.clear();
        }
    }
}

fn key_storable(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN
}

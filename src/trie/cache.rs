//! Node cache.
//!
//! Optional map from file offset to materialized [`Node`], avoiding
//! re-parsing hot nodes on every operation. The cache must follow every
//! structural change: mutation paths write updated clones back, node
//! relocation remaps the entry to its new offset, and collapse removes
//! it. A miss there is unrecoverable corruption of the in-memory state,
//! not an I/O problem, so the remap panics instead of returning an
//! error.

use hashbrown::HashMap;

use crate::trie::node::Node;

#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    nodes: HashMap<u64, Node>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pointer: u64) -> Option<&Node> {
        self.nodes.get(&pointer)
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.own_pointer, node);
    }

    pub fn remove(&mut self, pointer: u64) {
        self.nodes.remove(&pointer);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Remaps the entry for a relocated node to its new offset.
    pub fn relocate(&mut self, old_pointer: u64, new_pointer: u64) {
        if old_pointer == new_pointer {
            return;
        }
        let Some(node) = self.nodes.remove(&old_pointer) else {
            panic!("node cache out of sync: no entry at {old_pointer:#x} to relocate");
        };
        // The moved entry is stale until the mutation path writes the
        // updated clone back over it.
        if self.nodes.insert(new_pointer, node).is_some() {
            panic!("node cache out of sync: {new_pointer:#x} already occupied");
        }
    }
}

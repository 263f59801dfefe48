//! Compaction of dead file space.
//!
//! Node growth and record overwrites leave unreachable byte ranges
//! behind. Defragmentation walks the reachable structure, collects every
//! live region together with the single location pointing at it, then
//! slides regions down in file order, patching that one back-pointer per
//! move. Regions are shifted in ascending pointer order, so a move only
//! ever writes into space already vacated; interrupting between moves
//! leaves the file consistent, merely less compact.
//!
//! Cancellation is honored during the collection walk only. Once
//! shifting starts the operation runs to completion, because a
//! half-shifted file would still be consistent but the cancel would be
//! indistinguishable from an error to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::{bail, ensure, Result};

use crate::config::constants::ROOT_SIZE;
use crate::storage::Storage;
use crate::trie::header::ROOT_POINTER_OFFSET;
use crate::trie::io;
use crate::trie::tree::Trie;

/// Cooperative cancellation flag, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A live byte range and the one pointer cell addressing it.
#[derive(Debug)]
struct Region {
    pointer: u64,
    size: u64,
    /// Offset of the pointer cell that addresses this region.
    pointed_by: u64,
    /// Regions whose `pointed_by` cell lives inside this region.
    children: Vec<usize>,
}

impl<S: Storage> Trie<S> {
    /// Compacts the file, returning the number of bytes reclaimed.
    ///
    /// The compacted state is buffered like any other mutation; call
    /// [`Trie::flush`] to persist it.
    pub fn defragment(&mut self) -> Result<u64> {
        self.defragment_cancellable(&CancelToken::new())
    }

    /// [`Trie::defragment`] honoring `cancel` during the collection
    /// phase.
    pub fn defragment_cancellable(&mut self, cancel: &CancelToken) -> Result<u64> {
        let mut regions = self.collect_regions(cancel)?;

        // Materialized nodes hold pre-move offsets; drop them all.
        self.clear_node_cache();

        let mut order: Vec<usize> = (1..regions.len()).collect();
        order.sort_unstable_by_key(|&i| regions[i].pointer);

        let mut next_offset = ROOT_SIZE as u64;
        let mut scratch = Vec::new();
        for i in order {
            let pointer = regions[i].pointer;
            let size = regions[i].size;
            ensure!(
                pointer >= next_offset,
                "live regions overlap at {pointer:#x}; file is corrupt"
            );
            let gap = pointer - next_offset;
            if gap > 0 {
                scratch.resize(size as usize, 0);
                self.storage_mut().read(pointer, &mut scratch)?;
                self.storage_mut().write(next_offset, &scratch)?;
                io::write_pointer(self.storage_mut(), regions[i].pointed_by, next_offset)?;
                regions[i].pointer = next_offset;
                // Pointer cells inside this region moved along with it.
                let children = std::mem::take(&mut regions[i].children);
                for child in children {
                    regions[child].pointed_by -= gap;
                }
            }
            next_offset += size;
        }

        let old_len = self.storage().len();
        let saved = old_len.saturating_sub(next_offset);
        let root_pointer = io::read_pointer(self.storage_mut(), ROOT_POINTER_OFFSET)?;
        self.set_root_pointer_in_memory(root_pointer);
        if saved > 0 {
            self.storage_mut().resize(next_offset)?;
        }
        tracing::debug!(saved, regions = regions.len(), "defragmentation complete");
        Ok(saved)
    }

    /// Depth-first walk over the reachable structure. Region 0 is the
    /// header and never moves; every other region records the pointer
    /// cell addressing it and, as children, the regions addressed from
    /// inside it.
    fn collect_regions(&mut self, cancel: &CancelToken) -> Result<Vec<Region>> {
        let mut regions = vec![Region {
            pointer: 0,
            size: ROOT_SIZE as u64,
            pointed_by: 0,
            children: Vec::new(),
        }];
        let mut stack = vec![(self.root_pointer(), ROOT_POINTER_OFFSET, 0usize)];
        while let Some((node_pointer, pointed_by, parent)) = stack.pop() {
            if cancel.is_cancelled() {
                bail!("defragmentation cancelled");
            }
            let line = self.read_node_line(node_pointer)?;
            let node_region = regions.len();
            regions.push(Region {
                pointer: node_pointer,
                size: 2 + line.line_length() as u64,
                pointed_by,
                children: Vec::new(),
            });
            regions[parent].children.push(node_region);
            let internal = line.internal_link_pointer();
            if internal != 0 {
                let record = self.read_value(internal)?;
                let region = Region {
                    pointer: record.pointer,
                    size: record.footprint(),
                    pointed_by: node_pointer + 2,
                    children: Vec::new(),
                };
                let child_region = regions.len();
                regions[node_region].children.push(child_region);
                regions.push(region);
            }
            for slot in line.slots() {
                if slot.links_to_node {
                    stack.push((slot.pointer, slot.own_pointer + 2, node_region));
                } else {
                    let record = self.read_value(slot.pointer)?;
                    let region = Region {
                        pointer: record.pointer,
                        size: record.footprint(),
                        pointed_by: slot.own_pointer + 2,
                        children: Vec::new(),
                    };
                    let child_region = regions.len();
                    regions[node_region].children.push(child_region);
                    regions.push(region);
                }
            }
        }
        Ok(regions)
    }
}

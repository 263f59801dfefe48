//! Prefix scans.
//!
//! A scan walks the subtree under the deepest node on the prefix path,
//! depth-first with an explicit frame stack, yielding one [`Row`] at a
//! time. A node's internal link is yielded before its slots, which in
//! [`EnumerationOrder::Ordered`] mode makes the whole scan
//! lexicographic by key; `Unordered` takes slots in physical order and
//! skips the per-node sort. Every candidate record is still checked
//! against the prefix, since the node where the walk stopped can cover
//! keys that diverge inside their first unconsumed byte.
//!
//! The scan borrows the trie mutably for its whole lifetime, so the
//! structure it walks cannot change underneath it.

use eyre::Result;
use smallvec::SmallVec;

use crate::storage::Storage;
use crate::trie::node::NodeLine;
use crate::trie::tree::Trie;
use crate::trie::value::Row;

/// Order in which a scan yields rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumerationOrder {
    /// Lexicographic by key. Costs a per-node slot sort.
    #[default]
    Ordered,
    /// Physical slot order; cheapest when order does not matter.
    Unordered,
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    label: u8,
    links_to_node: bool,
    pointer: u64,
}

struct Frame {
    slots: SmallVec<[SlotEntry; 8]>,
    next: usize,
}

/// Lazy cursor over all rows whose key starts with a prefix.
pub struct PrefixScan<'a, S: Storage> {
    trie: &'a mut Trie<S>,
    prefix: Vec<u8>,
    order: EnumerationOrder,
    stack: Vec<Frame>,
    /// Internal-link record queued ahead of the frame machinery.
    pending_value: Option<u64>,
    done: bool,
}

impl<S: Storage> Trie<S> {
    /// Scans every row whose key starts with `prefix`. An empty prefix
    /// scans the whole table.
    pub fn scan_prefix(
        &mut self,
        prefix: &[u8],
        order: EnumerationOrder,
    ) -> Result<PrefixScan<'_, S>> {
        let seek = self.seek(prefix)?;
        let mut scan = PrefixScan {
            trie: self,
            prefix: prefix.to_vec(),
            order,
            stack: Vec::new(),
            pending_value: None,
            done: false,
        };
        if seek.missing_label.is_some() {
            // No stored key continues with that byte.
            scan.done = true;
            return Ok(scan);
        }
        if let Some(link) = &seek.value_link {
            if link.label.is_none() {
                // Internal link of the subtree root comes first.
                scan.pending_value = Some(link.pointer);
            }
        }
        scan.push_frame(seek.best_pointer)?;
        Ok(scan)
    }
}

impl<S: Storage> PrefixScan<'_, S> {
    fn push_frame(&mut self, pointer: u64) -> Result<u64> {
        let line = self.trie.read_node_line(pointer)?;
        self.push_frame_from_line(&line);
        Ok(line.internal_link_pointer())
    }

    fn push_frame_from_line(&mut self, line: &NodeLine) {
        let mut slots: SmallVec<[SlotEntry; 8]> = line
            .slots()
            .map(|slot| SlotEntry {
                label: slot.label,
                links_to_node: slot.links_to_node,
                pointer: slot.pointer,
            })
            .collect();
        if self.order == EnumerationOrder::Ordered {
            slots.sort_unstable_by_key(|slot| slot.label);
        }
        self.stack.push(Frame { slots, next: 0 });
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        if let Some(pointer) = self.pending_value.take() {
            if let Some(row) = self.row_if_prefixed(pointer)? {
                return Ok(Some(row));
            }
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(slot) = frame.slots.get(frame.next).copied() else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;
            if slot.links_to_node {
                let internal = self.push_frame(slot.pointer)?;
                if internal != 0 {
                    if let Some(row) = self.row_if_prefixed(internal)? {
                        return Ok(Some(row));
                    }
                }
            } else if let Some(row) = self.row_if_prefixed(slot.pointer)? {
                return Ok(Some(row));
            }
        }
    }

    fn row_if_prefixed(&mut self, pointer: u64) -> Result<Option<Row>> {
        let record = self.trie.read_value(pointer)?;
        if !record.key.starts_with(&self.prefix) {
            return Ok(None);
        }
        let value = self.trie.read_value_payload(&record)?;
        Ok(Some(Row {
            key: record.key,
            value,
        }))
    }
}

impl<S: Storage> Iterator for PrefixScan<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    fn populated() -> Trie<MemStorage> {
        let mut trie = Trie::init(MemStorage::new()).unwrap();
        for (key, value) in [
            (&b"car"[..], &b"1"[..]),
            (b"care", b"2"),
            (b"cart", b"3"),
            (b"cat", b"4"),
            (b"dog", b"5"),
            (b"d", b"6"),
        ] {
            trie.insert(key, value).unwrap();
        }
        trie
    }

    fn keys(scan: PrefixScan<'_, MemStorage>) -> Vec<Vec<u8>> {
        scan.map(|row| row.unwrap().key).collect()
    }

    #[test]
    fn ordered_scan_is_lexicographic() {
        let mut trie = populated();
        let got = keys(trie.scan_prefix(b"", EnumerationOrder::Ordered).unwrap());
        let want: Vec<Vec<u8>> = [&b"car"[..], b"care", b"cart", b"cat", b"d", b"dog"]
            .iter()
            .map(|k| k.to_vec())
            .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn unordered_scan_yields_same_set() {
        let mut trie = populated();
        let mut got = keys(trie.scan_prefix(b"", EnumerationOrder::Unordered).unwrap());
        got.sort();
        let mut want: Vec<Vec<u8>> = [&b"car"[..], b"care", b"cart", b"cat", b"d", b"dog"]
            .iter()
            .map(|k| k.to_vec())
            .collect();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn prefix_filters_diverging_keys() {
        let mut trie = populated();
        let got = keys(trie.scan_prefix(b"car", EnumerationOrder::Ordered).unwrap());
        assert_eq!(got, vec![b"car".to_vec(), b"care".to_vec(), b"cart".to_vec()]);
        let got = keys(trie.scan_prefix(b"cat", EnumerationOrder::Ordered).unwrap());
        assert_eq!(got, vec![b"cat".to_vec()]);
    }

    #[test]
    fn missing_prefix_scans_nothing() {
        let mut trie = populated();
        assert_eq!(
            trie.scan_prefix(b"x", EnumerationOrder::Ordered)
                .unwrap()
                .count(),
            0
        );
        assert_eq!(
            trie.scan_prefix(b"card", EnumerationOrder::Ordered)
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn scan_carries_values() {
        let mut trie = populated();
        let rows: Vec<Row> = trie
            .scan_prefix(b"d", EnumerationOrder::Ordered)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, b"d");
        assert_eq!(rows[0].value, b"6");
        assert_eq!(rows[1].key, b"dog");
        assert_eq!(rows[1].value, b"5");
    }
}

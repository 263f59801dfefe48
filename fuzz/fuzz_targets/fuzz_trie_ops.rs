//! Differential fuzzing of trie mutations.
//!
//! Runs an arbitrary operation sequence against a fresh trie and a
//! `BTreeMap` reference, checking that results, record counts, and the
//! final ordered scan agree.

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use triedb::{CacheSettings, CacheStorage, EnumerationOrder, MemStorage, Trie};

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
    Get { key: Vec<u8> },
    Defragment,
}

fuzz_target!(|ops: Vec<Op>| {
    if ops.len() > 256 {
        return;
    }
    let cache = CacheStorage::new(MemStorage::new(), CacheSettings::default());
    let mut trie = Trie::init(cache).unwrap();
    trie.activate_node_cache();
    let mut reference: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert { key, value } => {
                if key.is_empty() || key.len() > 1024 || value.len() > 4096 {
                    continue;
                }
                let inserted = trie.insert(&key, &value).unwrap();
                assert_eq!(inserted, reference.insert(key, value).is_none());
            }
            Op::Remove { key } => {
                let removed = trie.remove(&key).unwrap();
                assert_eq!(removed, reference.remove(&key).is_some());
            }
            Op::Get { key } => {
                assert_eq!(trie.get(&key).unwrap(), reference.get(&key).cloned());
            }
            Op::Defragment => {
                trie.defragment().unwrap();
            }
        }
        assert_eq!(trie.record_count(), reference.len() as u64);
    }

    let rows: Vec<_> = trie
        .scan_prefix(b"", EnumerationOrder::Ordered)
        .unwrap()
        .map(|row| row.unwrap().into_parts())
        .collect();
    let want: Vec<_> = reference.into_iter().collect();
    assert_eq!(rows, want);
});

//! End-to-end coverage of trie reads, writes, deletes, and prefix scans
//! through the full storage stack.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use triedb::{CacheSettings, CacheStorage, EnumerationOrder, FileStorage, MemStorage, Trie};

fn mem_trie() -> Trie<CacheStorage<MemStorage>> {
    let cache = CacheStorage::new(MemStorage::new(), CacheSettings::default());
    Trie::init(cache).unwrap()
}

mod durability {
    use super::*;

    #[test]
    fn flushed_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.trie");
        {
            let file = FileStorage::open(&path).unwrap();
            let cache = CacheStorage::new(file, CacheSettings::default());
            let mut trie = Trie::open_or_init(cache).unwrap();
            trie.insert(b"user/alice", b"1").unwrap();
            trie.insert(b"user/bob", b"2").unwrap();
            trie.insert(b"group/admins", b"3").unwrap();
            trie.flush().unwrap();
        }
        let file = FileStorage::open(&path).unwrap();
        let cache = CacheStorage::new(file, CacheSettings::default());
        let mut trie = Trie::open(cache).unwrap();
        assert_eq!(trie.record_count(), 3);
        assert_eq!(trie.get(b"user/bob").unwrap().unwrap(), b"2");
        let users: Vec<_> = trie
            .scan_prefix(b"user/", EnumerationOrder::Ordered)
            .unwrap()
            .map(|row| row.unwrap().key)
            .collect();
        assert_eq!(users, vec![b"user/alice".to_vec(), b"user/bob".to_vec()]);
    }

    #[test]
    fn unflushed_writes_never_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.trie");
        {
            let file = FileStorage::open(&path).unwrap();
            let cache = CacheStorage::new(file, CacheSettings::default());
            let mut trie = Trie::open_or_init(cache).unwrap();
            trie.flush().unwrap();
            trie.insert(b"pending", b"x").unwrap();
            // Dropped without a flush.
        }
        let file = FileStorage::open(&path).unwrap();
        let cache = CacheStorage::new(file, CacheSettings::default());
        let mut trie = Trie::open(cache).unwrap();
        assert_eq!(trie.record_count(), 0);
        assert_eq!(trie.get(b"pending").unwrap(), None);
    }

    #[test]
    fn open_or_init_initializes_empty_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.trie");
        {
            let file = FileStorage::open(&path).unwrap();
            let mut trie = Trie::open_or_init(file).unwrap();
            trie.insert(b"k", b"v").unwrap();
            trie.flush().unwrap();
        }
        // Second open must not re-initialize.
        let file = FileStorage::open(&path).unwrap();
        let mut trie = Trie::open_or_init(file).unwrap();
        assert_eq!(trie.get(b"k").unwrap().unwrap(), b"v");
    }
}

mod crud {
    use super::*;

    #[test]
    fn insert_get_remove_cycle() {
        let mut trie = mem_trie();
        assert!(trie.insert(b"alpha", b"1").unwrap());
        assert!(trie.insert(b"beta", b"2").unwrap());
        assert!(!trie.insert(b"alpha", b"one").unwrap());
        assert_eq!(trie.record_count(), 2);
        assert_eq!(trie.get(b"alpha").unwrap().unwrap(), b"one");
        assert!(trie.remove(b"alpha").unwrap());
        assert!(!trie.remove(b"alpha").unwrap());
        assert_eq!(trie.get(b"alpha").unwrap(), None);
        assert_eq!(trie.get(b"beta").unwrap().unwrap(), b"2");
        assert_eq!(trie.record_count(), 1);
    }

    #[test]
    fn keys_that_prefix_each_other_are_distinct_rows() {
        let mut trie = mem_trie();
        for key in [&b"a"[..], b"ab", b"abc", b"abcd"] {
            trie.insert(key, key).unwrap();
        }
        assert_eq!(trie.record_count(), 4);
        for key in [&b"a"[..], b"ab", b"abc", b"abcd"] {
            assert_eq!(trie.get(key).unwrap().unwrap(), key);
        }
        assert!(trie.remove(b"ab").unwrap());
        assert_eq!(trie.get(b"ab").unwrap(), None);
        assert_eq!(trie.get(b"a").unwrap().unwrap(), b"a");
        assert_eq!(trie.get(b"abc").unwrap().unwrap(), b"abc");
        assert_eq!(trie.get(b"abcd").unwrap().unwrap(), b"abcd");
    }

    #[test]
    fn binary_keys_and_values() {
        let mut trie = mem_trie();
        let key = [0u8, 255, 1, 254, 0];
        let value = vec![0u8; 4096];
        trie.insert(&key, &value).unwrap();
        assert_eq!(trie.get(&key).unwrap().unwrap(), value);
        assert_eq!(trie.get(&[0u8, 255, 1, 254]).unwrap(), None);
    }

    #[test]
    fn long_keys_round_trip() {
        let mut trie = mem_trie();
        // Longer than the record probe read.
        let key = vec![b'k'; 1000];
        trie.insert(&key, b"deep").unwrap();
        assert_eq!(trie.get(&key).unwrap().unwrap(), b"deep");
        assert!(trie.remove(&key).unwrap());
        assert_eq!(trie.record_count(), 0);
    }
}

mod scans {
    use super::*;

    #[test]
    fn scan_respects_mixed_depth_prefixes() {
        let mut trie = mem_trie();
        for key in [&b"app"[..], b"apple", b"apply", b"apt", b"banana"] {
            trie.insert(key, b"v").unwrap();
        }
        let got: Vec<_> = trie
            .scan_prefix(b"app", EnumerationOrder::Ordered)
            .unwrap()
            .map(|row| row.unwrap().key)
            .collect();
        assert_eq!(
            got,
            vec![b"app".to_vec(), b"apple".to_vec(), b"apply".to_vec()]
        );
    }

    #[test]
    fn scan_after_deletes_matches_reference() {
        let mut trie = mem_trie();
        let mut reference = BTreeMap::new();
        for i in 0u32..200 {
            let key = format!("item/{:04}", i * 7 % 200).into_bytes();
            let value = i.to_be_bytes().to_vec();
            trie.insert(&key, &value).unwrap();
            reference.insert(key, value);
        }
        for i in 0u32..200 {
            if i % 3 == 0 {
                let key = format!("item/{i:04}").into_bytes();
                assert_eq!(trie.remove(&key).unwrap(), reference.remove(&key).is_some());
            }
        }
        let got: Vec<_> = trie
            .scan_prefix(b"item/", EnumerationOrder::Ordered)
            .unwrap()
            .map(|row| row.unwrap().into_parts())
            .collect();
        let want: Vec<_> = reference.into_iter().collect();
        assert_eq!(got, want);
    }
}

mod randomized {
    use super::*;

    #[test]
    fn matches_btreemap_reference_under_random_workload() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let cache = CacheStorage::new(MemStorage::new(), CacheSettings::default());
        let mut trie = Trie::init(cache).unwrap();
        trie.activate_node_cache();
        let mut reference: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for _ in 0..3000 {
            let key_len = rng.gen_range(1..=12);
            let key: Vec<u8> = (0..key_len).map(|_| rng.gen_range(b'a'..=b'f')).collect();
            match rng.gen_range(0..10) {
                0..=6 => {
                    let value_len = rng.gen_range(0..64);
                    let value: Vec<u8> = (0..value_len).map(|_| rng.gen()).collect();
                    let inserted = trie.insert(&key, &value).unwrap();
                    assert_eq!(inserted, reference.insert(key, value).is_none());
                }
                7..=8 => {
                    let removed = trie.remove(&key).unwrap();
                    assert_eq!(removed, reference.remove(&key).is_some());
                }
                _ => {
                    assert_eq!(trie.get(&key).unwrap(), reference.get(&key).cloned());
                }
            }
            assert_eq!(trie.record_count(), reference.len() as u64);
        }

        let got: Vec<_> = trie
            .scan_prefix(b"", EnumerationOrder::Ordered)
            .unwrap()
            .map(|row| row.unwrap().into_parts())
            .collect();
        let want: Vec<_> = reference.into_iter().collect();
        assert_eq!(got, want);
    }

    #[test]
    fn random_workload_survives_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rand.trie");
        let mut rng = StdRng::seed_from_u64(42);
        let mut reference: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        {
            let file = FileStorage::open(&path).unwrap();
            let cache = CacheStorage::new(file, CacheSettings::default());
            let mut trie = Trie::open_or_init(cache).unwrap();
            for _ in 0..500 {
                let key_len = rng.gen_range(1..=8);
                let key: Vec<u8> = (0..key_len).map(|_| rng.gen_range(b'0'..=b'9')).collect();
                let value: Vec<u8> = (0..rng.gen_range(0..32)).map(|_| rng.gen()).collect();
                trie.insert(&key, &value).unwrap();
                reference.insert(key, value);
            }
            trie.flush().unwrap();
        }
        let file = FileStorage::open(&path).unwrap();
        let cache = CacheStorage::new(file, CacheSettings::default());
        let mut trie = Trie::open(cache).unwrap();
        assert_eq!(trie.record_count(), reference.len() as u64);
        for (key, value) in &reference {
            assert_eq!(trie.get(key).unwrap().as_ref(), Some(value));
        }
    }
}

mod bounded_memory {
    use super::*;

    #[test]
    fn auto_commit_cache_handles_more_data_than_pages() {
        let settings = CacheSettings::bounded(8)
            .with_page_size(1024)
            .with_auto_commit_evicted_pages(true);
        let cache = CacheStorage::new(MemStorage::new(), settings);
        let mut trie = Trie::init(cache).unwrap();
        for i in 0u32..500 {
            let key = format!("key-{i:05}").into_bytes();
            trie.insert(&key, &[i as u8; 100]).unwrap();
        }
        trie.flush().unwrap();
        assert!(trie.storage().mapped_page_count() <= 8);
        for i in (0u32..500).step_by(37) {
            let key = format!("key-{i:05}").into_bytes();
            assert_eq!(trie.get(&key).unwrap().unwrap(), [i as u8; 100]);
        }
        assert_eq!(trie.record_count(), 500);
    }
}

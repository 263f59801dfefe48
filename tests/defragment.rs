//! Compaction behavior through the full storage stack.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use triedb::{
    CacheSettings, CacheStorage, CancelToken, EnumerationOrder, FileStorage, MemStorage, Storage,
    Trie,
};

fn churned_trie(operations: usize) -> (Trie<CacheStorage<MemStorage>>, BTreeMap<Vec<u8>, Vec<u8>>)
{
    let cache = CacheStorage::new(MemStorage::new(), CacheSettings::default());
    let mut trie = Trie::init(cache).unwrap();
    let mut reference = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..operations {
        let key: Vec<u8> = (0..rng.gen_range(1..=6))
            .map(|_| rng.gen_range(b'a'..=b'e'))
            .collect();
        if rng.gen_bool(0.75) {
            let value: Vec<u8> = (0..rng.gen_range(0..80)).map(|_| rng.gen()).collect();
            trie.insert(&key, &value).unwrap();
            reference.insert(key, value);
        } else {
            trie.remove(&key).unwrap();
            reference.remove(&key);
        }
    }
    (trie, reference)
}

fn rows<S: Storage>(trie: &mut Trie<CacheStorage<S>>) -> Vec<(Vec<u8>, Vec<u8>)> {
    trie.scan_prefix(b"", EnumerationOrder::Ordered)
        .unwrap()
        .map(|row| row.unwrap().into_parts())
        .collect()
}

#[test]
fn churn_then_defragment_preserves_every_row() {
    let (mut trie, reference) = churned_trie(2000);
    let want: Vec<_> = reference.into_iter().collect();
    assert_eq!(rows(&mut trie), want);

    let len_before = trie.storage().len();
    let saved = trie.defragment().unwrap();
    assert!(saved > 0, "churn must leave reclaimable space");
    assert_eq!(trie.storage().len() + saved, len_before);
    assert_eq!(rows(&mut trie), want);
    assert_eq!(trie.record_count(), want.len() as u64);

    // Idempotent: a compact file has nothing left to reclaim.
    assert_eq!(trie.defragment().unwrap(), 0);
}

#[test]
fn defragmented_file_persists_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compact.trie");
    let want;
    {
        let (mut trie, reference) = churned_trie(800);
        want = reference.into_iter().collect::<Vec<_>>();
        trie.defragment().unwrap();
        trie.flush().unwrap();
        let bytes = trie.into_storage().inner().as_bytes().to_vec();
        std::fs::write(&path, bytes).unwrap();
    }
    let file = FileStorage::open(&path).unwrap();
    let cache = CacheStorage::new(file, CacheSettings::default());
    let mut trie = Trie::open(cache).unwrap();
    assert_eq!(rows(&mut trie), want);
}

#[test]
fn file_shrinks_on_flush_after_defragment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shrink.trie");
    let file = FileStorage::open(&path).unwrap();
    let cache = CacheStorage::new(file, CacheSettings::default());
    let mut trie = Trie::open_or_init(cache).unwrap();
    for i in 0u32..100 {
        trie.insert(format!("k{i}").as_bytes(), &[9; 64]).unwrap();
    }
    for i in 0u32..100 {
        if i % 2 == 0 {
            trie.remove(format!("k{i}").as_bytes()).unwrap();
        }
    }
    trie.flush().unwrap();
    let on_disk_before = trie.storage().inner().len();
    let saved = trie.defragment().unwrap();
    assert!(saved > 0);
    trie.flush().unwrap();
    assert_eq!(trie.storage().inner().len(), on_disk_before - saved);
}

#[test]
fn cancellation_aborts_before_any_move() {
    let (mut trie, reference) = churned_trie(500);
    let cancel = CancelToken::new();
    cancel.cancel();
    let len_before = trie.storage().len();
    assert!(trie.defragment_cancellable(&cancel).is_err());
    assert_eq!(trie.storage().len(), len_before);
    let want: Vec<_> = reference.into_iter().collect();
    assert_eq!(rows(&mut trie), want);
    // A later uncancelled run still succeeds.
    trie.defragment().unwrap();
    assert_eq!(rows(&mut trie), want);
}

#[test]
fn defragment_keeps_in_place_overwrites_working() {
    let cache = CacheStorage::new(MemStorage::new(), CacheSettings::default());
    let mut trie = Trie::init(cache).unwrap();
    trie.insert(b"slot", b"12345678").unwrap();
    trie.insert(b"slot", b"123").unwrap();
    trie.insert(b"other", b"x").unwrap();
    trie.defragment().unwrap();
    // The shrunken record kept its reservation across the move.
    let len = trie.storage().len();
    trie.insert(b"slot", b"12345678").unwrap();
    assert_eq!(trie.storage().len(), len);
    assert_eq!(trie.get(b"slot").unwrap().unwrap(), b"12345678");
}

//! Opens arbitrary bytes as a trie file and probes it with read-only
//! lookups. Lookups on hostile files must fail with errors, never
//! panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

use triedb::{MemStorage, Trie};

fuzz_target!(|data: &[u8]| {
    let storage = MemStorage::from_bytes(data.to_vec());
    let Ok(mut trie) = Trie::open(storage) else {
        return;
    };
    let _ = trie.record_count();
    // contains_key decodes record heads without materializing payloads,
    // so a hostile length field cannot force a huge allocation.
    for key in [&b""[..], b"a", b"\x00", b"\xff\xff", b"abcdefgh"] {
        let _ = trie.contains_key(key);
    }
});

//! End-to-end eviction scenarios from the spec (§8 scenarios 3 and 4):
//! three cacheable misses against a 2-entry cache, once under each
//! replacement policy.

use httpproxy::cache::{Cache, CacheEntry, Key, Policy};
use bytes::Bytes;

fn entry(target: &str) -> CacheEntry {
    CacheEntry {
        key: Key::from_target(target.as_bytes()),
        last_modified: [b'0'; 29],
        body: Bytes::from(target.as_bytes().to_vec()),
        recency: 0,
    }
}

fn admit_as_miss(cache: &mut Cache, target: &str) {
    // Mirrors the handler's Arm A sequence: touch_all() then admit,
    // so recency ordering matches what a real cache miss produces.
    cache.touch_all();
    cache.admit(entry(target));
}

#[test]
fn lru_eviction_keeps_the_two_most_recently_touched() {
    let mut cache = Cache::new(2, Policy::Lru);
    admit_as_miss(&mut cache, "a");
    admit_as_miss(&mut cache, "b");
    admit_as_miss(&mut cache, "c");

    assert_eq!(cache.len(), 2);
    assert!(cache.lookup(&Key::from_target(b"a")).is_none());
    assert!(cache.lookup(&Key::from_target(b"b")).is_some());
    assert!(cache.lookup(&Key::from_target(b"c")).is_some());
}

#[test]
fn fifo_eviction_keeps_the_two_most_recent_arrivals() {
    let mut cache = Cache::new(2, Policy::Fifo);
    admit_as_miss(&mut cache, "a");
    admit_as_miss(&mut cache, "b");
    admit_as_miss(&mut cache, "c");

    assert_eq!(cache.len(), 2);
    assert!(cache.lookup(&Key::from_target(b"a")).is_none());
    assert!(cache.lookup(&Key::from_target(b"b")).is_some());
    assert!(cache.lookup(&Key::from_target(b"c")).is_some());
}

#[test]
fn cache_cap_is_never_exceeded_across_many_insertions() {
    let mut cache = Cache::new(4, Policy::Lru);
    for i in 0..100 {
        admit_as_miss(&mut cache, &format!("item{i}"));
        assert!(cache.len() <= 4);
    }
    assert_eq!(cache.len(), 4);
}

#[test]
fn content_length_equal_to_max_file_size_is_still_cacheable() {
    // The gate in Arm C is `<=`, not `<` - exercised at the handler
    // level via request_content_length, but the boundary itself is a
    // plain integer comparison worth pinning down here.
    let max_file_size = 65536usize;
    let request_content_length = 65536usize;
    assert!(request_content_length <= max_file_size);
}

#[test]
fn targets_longer_than_15_bytes_truncate_for_the_cache_key() {
    let long_target = "this-is-a-very-long-request-target";
    let key = Key::from_target(long_target.as_bytes());
    assert_eq!(key.as_bytes(), &long_target.as_bytes()[..15]);
}

use petek::ReadMostlyMap;
use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_insert_and_get() {
    let map = ReadMostlyMap::new();
    assert_eq!(map.insert("a", 1), None);
    assert_eq!(map.insert("b", 2), None);
    assert_eq!(map.get(&"a"), Some(1));
    assert_eq!(map.get(&"b"), Some(2));
    assert_eq!(map.get(&"c"), None);
}

#[test]
fn test_insert_replace() {
    let map = ReadMostlyMap::new();
    assert_eq!(map.insert(1, 10), None);
    assert_eq!(map.insert(1, 20), Some(10));
    assert_eq!(map.insert(1, 30), Some(20));
    assert_eq!(map.get(&1), Some(30));
}

#[test]
fn test_remove() {
    let map = ReadMostlyMap::new();
    map.insert(1, 100);
    map.insert(2, 200);

    assert_eq!(map.remove(&1), Some(100));
    assert_eq!(map.get(&1), None);
    assert_eq!(map.remove(&1), None);
    assert_eq!(map.get(&2), Some(200));
}

#[test]
fn test_remove_absent_is_noop() {
    let map: ReadMostlyMap<u32, u32> = ReadMostlyMap::new();
    assert_eq!(map.remove(&7), None);
    map.insert(1, 1);
    assert_eq!(map.remove(&7), None);
    assert_eq!(map.get(&1), Some(1));
}

#[test]
fn test_contains_key() {
    let map = ReadMostlyMap::new();
    map.insert(42, "hello");
    assert!(map.contains_key(&42));
    assert!(!map.contains_key(&99));
    map.remove(&42);
    assert!(!map.contains_key(&42));
}

#[test]
fn test_peek() {
    let map = ReadMostlyMap::new();
    map.insert("config", vec![1, 2, 3]);
    assert_eq!(map.peek(&"config", |v| v.len()), Some(3));
    assert_eq!(map.peek(&"config", |v| v[0]), Some(1));
    assert_eq!(map.peek(&"missing", |v| v.len()), None);

    map.remove(&"config");
    assert_eq!(map.peek(&"config", |v| v.len()), None);
}

#[test]
fn test_len_and_is_empty() {
    let map = ReadMostlyMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);

    map.insert(1, 1);
    map.insert(2, 2);
    assert!(!map.is_empty());
    assert_eq!(map.len(), 2);

    map.remove(&1);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_clear() {
    let map = ReadMostlyMap::new();
    for i in 0..100 {
        map.insert(i, i * 10);
    }
    assert_eq!(map.len(), 100);

    map.clear();
    assert!(map.is_empty());
    for i in 0..100 {
        assert_eq!(map.get(&i), None);
    }

    // The map is still usable after a clear.
    map.insert(7, 70);
    assert_eq!(map.get(&7), Some(70));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_get_or_insert() {
    let map = ReadMostlyMap::new();
    assert_eq!(map.get_or_insert(1, 100), 100);
    assert_eq!(map.get_or_insert(1, 200), 100);
    assert_eq!(map.get(&1), Some(100));
}

#[test]
fn test_get_or_insert_after_remove() {
    let map = ReadMostlyMap::new();
    map.insert(1, 100);
    map.remove(&1);
    // The tombstoned entry does not count as existing.
    assert_eq!(map.get_or_insert(1, 200), 200);
    assert_eq!(map.get(&1), Some(200));
}

#[test]
fn test_get_or_insert_identity() {
    let map = ReadMostlyMap::new();

    let arc1 = Arc::new(AtomicU64::new(42));
    let returned1 = map.get_or_insert("key", arc1.clone());
    assert!(
        Arc::ptr_eq(&returned1, &arc1),
        "first call should return the inserted allocation"
    );

    // Mutate through the returned handle; a later call must observe it.
    returned1.store(100, Ordering::Relaxed);
    let returned2 = map.get_or_insert("key", Arc::new(AtomicU64::new(999)));
    assert!(
        Arc::ptr_eq(&returned1, &returned2),
        "second call should return the same allocation as the first"
    );
    assert_eq!(returned2.load(Ordering::Relaxed), 100);
}

#[test]
fn test_compare_and_swap() {
    let map = ReadMostlyMap::new();
    map.insert("counter", 1);

    assert!(map.compare_and_swap(&"counter", &1, 2));
    assert_eq!(map.get(&"counter"), Some(2));

    // Stale expected value fails and leaves the entry alone.
    assert!(!map.compare_and_swap(&"counter", &1, 3));
    assert_eq!(map.get(&"counter"), Some(2));

    // Absent and deleted keys never match.
    assert!(!map.compare_and_swap(&"missing", &1, 3));
    map.remove(&"counter");
    assert!(!map.compare_and_swap(&"counter", &2, 3));
    assert_eq!(map.get(&"counter"), None);
}

#[test]
fn test_compare_and_delete() {
    let map = ReadMostlyMap::new();
    map.insert(1, 10);

    assert!(!map.compare_and_delete(&1, &99));
    assert_eq!(map.get(&1), Some(10));

    assert!(map.compare_and_delete(&1, &10));
    assert_eq!(map.get(&1), None);
    assert!(!map.compare_and_delete(&1, &10));

    // The key is insertable again afterwards.
    map.insert(1, 11);
    assert_eq!(map.get(&1), Some(11));
}

#[test]
fn test_iter() {
    let map = ReadMostlyMap::new();
    map.insert(1, 10);
    map.insert(2, 20);
    map.insert(3, 30);

    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(k, _)| *k);
    assert_eq!(entries, vec![(1, 10), (2, 20), (3, 30)]);
}

#[test]
fn test_iter_skips_removed() {
    let map = ReadMostlyMap::new();
    for i in 0..10 {
        map.insert(i, i);
    }
    for i in 0..10 {
        if i % 2 == 0 {
            map.remove(&i);
        }
    }

    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable();
    assert_eq!(entries, vec![(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)]);
}

#[test]
fn test_keys() {
    let map = ReadMostlyMap::new();
    map.insert(1, 10);
    map.insert(2, 20);

    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    assert_eq!(keys, vec![1, 2]);
}

#[test]
fn test_into_iterator() {
    let map = ReadMostlyMap::new();
    map.insert(1, 2);
    map.insert(3, 4);

    let mut sum = 0;
    for (k, v) in &map {
        sum += k + v;
    }
    assert_eq!(sum, 10);
}

#[test]
fn test_for_each_while_visits_all() {
    let map = ReadMostlyMap::new();
    map.insert(1, 10);
    map.insert(2, 20);
    map.insert(3, 30);

    let mut sum = 0;
    map.for_each_while(|_, v| {
        sum += *v;
        true
    });
    assert_eq!(sum, 60);
}

#[test]
fn test_for_each_while_stops_early() {
    let map = ReadMostlyMap::new();
    for i in 0..100 {
        map.insert(i, i);
    }

    let mut seen = 0;
    map.for_each_while(|_, _| {
        seen += 1;
        seen < 5
    });
    assert_eq!(seen, 5);
}

#[test]
fn test_string_keys() {
    let map = ReadMostlyMap::new();
    map.insert("hello".to_string(), 1);
    map.insert("world".to_string(), 2);
    // Borrowed lookups work without allocating a String.
    assert_eq!(map.get("hello"), Some(1));
    assert_eq!(map.get("world"), Some(2));
    assert_eq!(map.remove("hello"), Some(1));
    assert_eq!(map.get("hello"), None);
}

#[test]
fn test_many_entries() {
    let map = ReadMostlyMap::new();
    for i in 0..10_000 {
        map.insert(i, i * 3);
    }
    for i in 0..10_000 {
        assert_eq!(map.get(&i), Some(i * 3));
    }
    assert_eq!(map.len(), 10_000);
}

#[test]
fn test_custom_hasher() {
    let map: ReadMostlyMap<u32, u32, RandomState> =
        ReadMostlyMap::with_hasher(RandomState::new());
    map.insert(1, 2);
    assert_eq!(map.get(&1), Some(2));
    let _ = map.hasher();
}

#[test]
fn test_default() {
    let map: ReadMostlyMap<u32, u32> = ReadMostlyMap::default();
    assert!(map.is_empty());
}

#[test]
fn test_debug_format() {
    let map = ReadMostlyMap::new();
    map.insert("k", 1);
    let rendered = format!("{map:?}");
    assert_eq!(rendered, "{\"k\": 1}");
}

// The full single-threaded lifecycle: insert, read, delete, resurrect,
// enumerate.
#[test]
fn test_insert_delete_resurrect_roundtrip() {
    let map = ReadMostlyMap::new();
    map.insert("a", 1);
    map.insert("b", 2);

    assert_eq!(map.get(&"a"), Some(1));

    map.remove(&"a");
    assert_eq!(map.get(&"a"), None);
    assert_eq!(map.get(&"b"), Some(2));

    map.insert("a", 3);
    assert_eq!(map.get(&"a"), Some(3));

    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable();
    assert_eq!(entries, vec![("a", 3), ("b", 2)]);
}

#[test]
fn test_drop_cleanup() {
    // No leaks or crashes on drop with many live entries.
    let map = ReadMostlyMap::new();
    for i in 0..5000 {
        map.insert(i, format!("value_{}", i));
    }
    drop(map);
}

/// Increments a shared counter on drop, to pin down destructor counts.
#[derive(Clone)]
struct DropCounter {
    counter: Arc<AtomicUsize>,
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_drop_runs_value_destructors() {
    let drops = Arc::new(AtomicUsize::new(0));

    let map = ReadMostlyMap::new();
    for i in 0..64 {
        map.insert(i, DropCounter { counter: drops.clone() });
    }
    map.len(); // promote, so the snapshot owns every slot
    drop(map);

    // Every live value was reachable only through the map, so dropping
    // the map drops each of them exactly once. The clones handed around
    // internally all share the same counter Arc and do not bump it.
    assert_eq!(drops.load(Ordering::SeqCst), 64);
}

#[test]
fn test_replace_never_double_drops() {
    let drops = Arc::new(AtomicUsize::new(0));

    {
        let map = ReadMostlyMap::new();
        map.insert(0, DropCounter { counter: drops.clone() });
        // Replacing retires the old value through the epoch collector.
        let old = map.insert(0, DropCounter { counter: drops.clone() });
        drop(old);
        drop(map);
    }

    // Drive the collector so retired values get a chance to be freed.
    for _ in 0..512 {
        let _guard = crossbeam_epoch::pin();
    }

    // Three clones existed: the replaced value, the clone `insert`
    // returned, and the final value dropped with the map. Reclamation
    // timing may defer one of them, but none may drop twice.
    let count = drops.load(Ordering::SeqCst);
    assert!((2..=3).contains(&count), "unexpected drop count {count}");
}

//! Example demonstrating a read-mostly workload: a shared lookup table
//! that many threads read while a single writer occasionally updates it.
//!
//! After a warm-up the hot keys are served from the stable view, so the
//! reader threads never touch a lock no matter how many of them run.

use petek::ReadMostlyMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const ENTRIES: usize = 50_000;
const READERS: usize = 8;
const READS_PER_THREAD: usize = 200_000;

fn main() {
    println!("=== Read-Mostly Concurrent Map Demo ===\n");

    let map = Arc::new(ReadMostlyMap::new());

    // Populate the table and settle it into the lock-free read view.
    println!("Populating {} entries...", ENTRIES);
    let start = Instant::now();
    for key in 0..ENTRIES {
        map.insert(key, key * 2);
    }
    map.len();
    println!("Populated in {:?}\n", start.elapsed());

    // Benchmark the steady state: many readers, one slow writer.
    println!(
        "Benchmarking {} readers ({} reads each) alongside one writer...",
        READERS, READS_PER_THREAD
    );
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..READERS {
        let map_clone = Arc::clone(&map);
        let handle = thread::spawn(move || {
            let mut found = 0usize;
            for i in 0..READS_PER_THREAD {
                let key = i % ENTRIES;
                if map_clone.get(&key).is_some() {
                    found += 1;
                }
            }
            found
        });
        handles.push(handle);
    }

    // The writer refreshes existing keys in place; those updates are
    // visible to readers without a promotion cycle.
    {
        let map_clone = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for key in (0..ENTRIES).step_by(10) {
                map_clone.insert(key, key * 2);
            }
            0usize
        });
        handles.push(handle);
    }

    let mut total_found = 0;
    for handle in handles {
        total_found += handle.join().unwrap();
    }

    let duration = start.elapsed();
    let total_reads = READERS * READS_PER_THREAD;
    println!(
        "Performed {} reads in {:?} ({:.2} ops/sec)",
        total_reads,
        duration,
        total_reads as f64 / duration.as_secs_f64()
    );
    println!("Found {} entries during reads\n", total_found);

    // Churn a slice of the key space: delete, add fresh keys, resurrect.
    println!("Churning the key space...");
    let start = Instant::now();

    for key in 0..1_000 {
        map.remove(&key);
    }
    for key in ENTRIES..ENTRIES + 1_000 {
        map.insert(key, key * 2);
    }
    // Re-inserting a deleted key revives it even after the sweep.
    for key in 0..500 {
        map.insert(key, key * 2);
    }

    println!("Churn completed in {:?}", start.elapsed());
    println!("Map now contains {} entries\n", map.len());

    // Verify the final state.
    println!("Verifying data integrity...");
    let mut verified = 0;
    for key in 0..ENTRIES + 1_000 {
        let expected = if (500..1_000).contains(&key) {
            None
        } else {
            Some(key * 2)
        };
        if map.get(&key) == expected {
            verified += 1;
        }
    }
    println!(
        "Verified {}/{} keys have the expected state",
        verified,
        ENTRIES + 1_000
    );

    println!("\n=== Demo Complete ===");
    println!("Readers ran lock-free against the stable view throughout.");
}

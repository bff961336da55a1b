//! Petek: a read-optimized concurrent hash map.
//!
//! Petek trades write throughput for reads that are as close to a plain
//! `HashMap` lookup as a concurrent map can get: one epoch pin, one atomic
//! load, no locks, no reference-count traffic. It shines when entries are
//! written once and read many times, or when threads work disjoint key
//! sets; a write-heavy hot key set is better served by a sharded map.
//!
//! # Key Properties
//!
//! - **Lock-free reads**: lookups of promoted keys never block, no matter
//!   how many writers are active
//! - **In-place updates**: writing an existing key is a single CAS, with
//!   the old value reclaimed through [`crossbeam_epoch`]
//! - **Amortized promotion**: freshly inserted keys start behind a mutex
//!   and migrate to the lock-free path once they are read often enough
//! - **Clone-out API**: values are returned by clone, so reads never hand
//!   out references that could dangle; wrap large values in `Arc`
//!
//! # Example
//!
//! ```rust
//! use petek::ReadMostlyMap;
//!
//! let map = ReadMostlyMap::new();
//!
//! map.insert("apollo", 11);
//! map.insert("skylab", 4);
//!
//! // Lock-free once promoted, still correct before.
//! assert_eq!(map.get(&"apollo"), Some(11));
//!
//! // Deletes tombstone in place; the entry is swept out later.
//! map.remove(&"skylab");
//! assert_eq!(map.get(&"skylab"), None);
//!
//! let keys: Vec<_> = map.keys().collect();
//! assert_eq!(keys, vec!["apollo"]);
//! ```

#![warn(missing_docs)]

mod map;
mod slot;

pub use map::{Iter, Keys, ReadMostlyMap};

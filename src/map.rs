//! `ReadMostlyMap<K, V>` — a concurrent hash map tuned for read-heavy use.
//!
//! # Architecture
//!
//! The map keeps two views of its entries:
//!
//! - **Stable view**: an immutable snapshot behind a single atomic pointer.
//!   Reads resolve against it with no locking at all, only an epoch pin and
//!   one atomic load.
//! - **Pending view**: a plain `HashMap` behind a mutex. It holds every
//!   entry that will survive the next promotion, including keys the stable
//!   view has never seen.
//!
//! Both views share per-key [`Slot`]s, so updating a value through either
//! view is one CAS on the slot and is immediately visible through the other.
//! The stable view only goes stale with respect to *membership*: keys
//! inserted since the last promotion live solely in the pending view and
//! cost a mutex acquisition to find.
//!
//! # Promotion
//!
//! Every lookup or update that has to fall through to the pending view
//! counts a miss. Once the misses reach the size of the pending view, the
//! pending view is promoted wholesale into a fresh snapshot and the miss
//! counter resets. Promotion is a pointer swap, not a rehash: snapshots
//! share the slot allocations, and the retired snapshot is reclaimed through
//! the epoch collector once the last reader lets go.
//!
//! Deleted keys are handled lazily. A delete tombstones the slot in place;
//! the key is only dropped for real when a later rebuild of the pending view
//! sweeps it out (marking the slot *expunged*) and the following promotion
//! publishes a snapshot without it.
//!
//! # When to use it
//!
//! The fast path pays off when keys are written rarely and read often, or
//! when threads touch disjoint key sets. Write-heavy workloads with a hot
//! shared key set funnel through the mutex and are better served by a
//! sharded map.

use std::borrow::Borrow;
use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned};
use foldhash::fast::FixedState;
use parking_lot::Mutex;

use crate::slot::Slot;

/// Shared entry table. Snapshots hand the same table from one generation to
/// the next, so refreshing the `incomplete` flag never copies entries.
type Entries<K, V, S> = HashMap<K, Arc<Slot<V>>, S>;

/// One published generation of the stable view.
struct Snapshot<K, V, S> {
    entries: Arc<Entries<K, V, S>>,
    /// True when the pending view holds keys this snapshot does not.
    /// While false, a key missing here is missing from the map.
    incomplete: bool,
}

/// The mutex-guarded side of the map.
struct Pending<K, V, S> {
    /// `Some` exactly while the current snapshot is incomplete. Holds every
    /// entry the next promotion will publish.
    entries: Option<Entries<K, V, S>>,
    /// Slow-path resolutions against the current snapshot.
    misses: usize,
}

impl<K, V, S> Pending<K, V, S> {
    fn entries_mut(&mut self) -> &mut Entries<K, V, S> {
        self.entries
            .as_mut()
            .expect("incomplete snapshot without a pending view")
    }
}

/// A concurrent hash map with lock-free reads and amortized O(1) writes,
/// tuned for entries that are written once and read many times.
///
/// Reads (`get`, `peek`, `contains_key`) never block: they resolve against
/// an immutable snapshot through one atomic load. Writes to keys already in
/// the snapshot are a single CAS on the key's slot. Only writes introducing
/// *new* keys, and reads of those not-yet-promoted keys, take the internal
/// mutex; the map promotes such keys into the snapshot once they have been
/// looked up often enough.
///
/// Values are returned by clone, so `V` is best kept cheap to clone or
/// wrapped in an [`Arc`].
///
/// # Examples
///
/// ```
/// use petek::ReadMostlyMap;
///
/// let map = ReadMostlyMap::new();
/// map.insert("a", 1);
/// map.insert("b", 2);
///
/// assert_eq!(map.get(&"a"), Some(1));
/// assert_eq!(map.remove(&"a"), Some(1));
/// assert_eq!(map.get(&"a"), None);
/// assert_eq!(map.len(), 1);
/// ```
pub struct ReadMostlyMap<K, V, S = FixedState> {
    /// The stable view. Never null after construction.
    stable: Atomic<Snapshot<K, V, S>>,
    pending: Mutex<Pending<K, V, S>>,
    hasher: S,
}

impl<K, V> ReadMostlyMap<K, V, FixedState>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty map with the default hasher.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map: ReadMostlyMap<String, u64> = ReadMostlyMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(FixedState::default())
    }
}

impl<K, V> Default for ReadMostlyMap<K, V, FixedState>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ReadMostlyMap<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    /// Creates an empty map that hashes with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        let snapshot = Snapshot {
            entries: Arc::new(HashMap::with_hasher(hasher.clone())),
            incomplete: false,
        };
        ReadMostlyMap {
            stable: Atomic::new(snapshot),
            pending: Mutex::new(Pending {
                entries: None,
                misses: 0,
            }),
            hasher,
        }
    }

    /// Returns a reference to the map's hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns a clone of the value mapped to `key`.
    ///
    /// Lock-free whenever the key has been promoted into the stable view;
    /// otherwise falls back to the pending view and counts toward the next
    /// promotion.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.get(&1), Some("one"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        if let Some(slot) = snap.entries.get(key) {
            return slot.get(&guard);
        }
        if !snap.incomplete {
            return None;
        }
        let slot = self.lookup_pending(key, &guard)?;
        slot.get(&guard)
    }

    /// Applies `f` to the value mapped to `key` without cloning it.
    ///
    /// The reference handed to `f` is only valid for the duration of the
    /// call; clone what you need out of it.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert("config", vec![1, 2, 3]);
    /// assert_eq!(map.peek(&"config", |v| v.len()), Some(3));
    /// assert_eq!(map.peek(&"missing", |v| v.len()), None);
    /// ```
    #[inline]
    pub fn peek<Q, R, F>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        if let Some(slot) = snap.entries.get(key) {
            return slot.load(&guard).map(f);
        }
        if !snap.incomplete {
            return None;
        }
        let slot = self.lookup_pending(key, &guard)?;
        let value = slot.load(&guard)?;
        Some(f(value))
    }

    /// Returns `true` if the map contains a live value for `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.peek(key, |_| ()).is_some()
    }

    /// Returns the number of live entries.
    ///
    /// This is O(n): it promotes any pending entries and then walks the
    /// snapshot, skipping tombstones. Prefer [`is_empty`](Self::is_empty)
    /// when emptiness is all you need.
    pub fn len(&self) -> usize {
        let guard = epoch::pin();
        let snap = self.authoritative(&guard);
        snap.entries
            .values()
            .filter(|slot| slot.load(&guard).is_some())
            .count()
    }

    /// Returns `true` if the map holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Maps `key` to `value`, returning the previous value if the key was
    /// live.
    ///
    /// Updates to keys already in the stable view are a single CAS. Only
    /// brand-new keys (and keys swept out since the last promotion) take
    /// the internal mutex.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// assert_eq!(map.insert("k", 1), None);
    /// assert_eq!(map.insert("k", 2), Some(1));
    /// assert_eq!(map.get(&"k"), Some(2));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        let value = match snap.entries.get(&key) {
            Some(slot) => match slot.try_swap(value, &guard) {
                Ok(previous) => return previous,
                // Expunged: the pending view lost this slot, retry locked.
                Err(rejected) => rejected,
            },
            None => value,
        };
        self.insert_slow(key, value, &guard)
    }

    /// Returns the value mapped to `key`, inserting `value` if the key is
    /// absent or deleted.
    ///
    /// The returned value is the one left in the map, so with `Arc` values
    /// every caller racing on the same key observes the same allocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// assert_eq!(map.get_or_insert("k", 1), 1);
    /// assert_eq!(map.get_or_insert("k", 2), 1);
    /// ```
    pub fn get_or_insert(&self, key: K, value: V) -> V {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        let value = match snap.entries.get(&key) {
            Some(slot) => match slot.try_get_or_insert(value, &guard) {
                Ok((actual, _)) => return actual,
                Err(rejected) => rejected,
            },
            None => value,
        };
        self.get_or_insert_slow(key, value, &guard)
    }

    /// Removes `key`, returning its value if it was live.
    ///
    /// Keys in the stable view are tombstoned in place without locking;
    /// the entry itself is swept out by a later promotion cycle. Removing
    /// an already-absent key is a no-op returning `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert("k", 1);
    /// assert_eq!(map.remove(&"k"), Some(1));
    /// assert_eq!(map.remove(&"k"), None);
    /// ```
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        if let Some(slot) = snap.entries.get(key) {
            return slot.delete(&guard);
        }
        if !snap.incomplete {
            return None;
        }
        let slot = {
            let mut pending = self.pending.lock();
            let snap = self.snapshot(&guard);
            if let Some(slot) = snap.entries.get(key) {
                // Promoted while we waited for the lock.
                Some(Arc::clone(slot))
            } else if snap.incomplete {
                let slot = pending
                    .entries
                    .as_mut()
                    .and_then(|entries| entries.remove(key));
                self.miss_locked(&mut pending, &guard);
                slot
            } else {
                None
            }
        };
        slot.and_then(|slot| slot.delete(&guard))
    }

    /// Replaces the value mapped to `key` with `new` if its current value
    /// equals `old`. Returns `true` on success.
    ///
    /// A deleted or absent key never matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert("counter", 1);
    /// assert!(map.compare_and_swap(&"counter", &1, 2));
    /// assert!(!map.compare_and_swap(&"counter", &1, 3));
    /// assert_eq!(map.get(&"counter"), Some(2));
    /// ```
    pub fn compare_and_swap<Q>(&self, key: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        if let Some(slot) = snap.entries.get(key) {
            return slot.compare_and_swap(old, new, &guard);
        }
        if !snap.incomplete {
            return false;
        }
        match self.lookup_pending(key, &guard) {
            Some(slot) => slot.compare_and_swap(old, new, &guard),
            None => false,
        }
    }

    /// Removes `key` if its current value equals `old`. Returns `true` on
    /// success.
    pub fn compare_and_delete<Q>(&self, key: &Q, old: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let guard = epoch::pin();
        let snap = self.snapshot(&guard);
        if let Some(slot) = snap.entries.get(key) {
            return slot.compare_and_delete(old, &guard);
        }
        if !snap.incomplete {
            return false;
        }
        match self.lookup_pending(key, &guard) {
            Some(slot) => slot.compare_and_delete(old, &guard),
            None => false,
        }
    }

    /// Removes every entry from the map.
    ///
    /// Readers that started before the clear keep whatever snapshot they
    /// were already looking at.
    pub fn clear(&self) {
        let guard = epoch::pin();
        let mut pending = self.pending.lock();
        pending.entries = None;
        pending.misses = 0;
        let snapshot = Snapshot {
            entries: Arc::new(HashMap::with_hasher(self.hasher.clone())),
            incomplete: false,
        };
        let previous = self.stable.swap(Owned::new(snapshot), Ordering::AcqRel, &guard);
        // SAFETY: unreachable after the swap; pinned readers may still
        // hold it, so retire it through the collector.
        unsafe { guard.defer_destroy(previous) };
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Returns an iterator over clones of the live entries.
    ///
    /// Iteration promotes the pending view first, then walks the resulting
    /// snapshot. Every key live for the whole iteration is yielded exactly
    /// once; entries mutated concurrently may or may not be observed.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert(1, "one");
    /// map.insert(2, "two");
    ///
    /// let mut entries: Vec<_> = map.iter().collect();
    /// entries.sort_unstable();
    /// assert_eq!(entries, vec![(1, "one"), (2, "two")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        let guard = epoch::pin();
        let table = {
            let snap = self.authoritative(&guard);
            Arc::clone(&snap.entries)
        };
        // SAFETY: the iterator keeps its own reference to the table, so
        // the borrow below cannot outlive the allocation it points into.
        let entries = unsafe { &*Arc::as_ptr(&table) }.iter();
        Iter {
            entries,
            _table: table,
            guard,
        }
    }

    /// Returns an iterator over clones of the live keys.
    pub fn keys(&self) -> Keys<'_, K, V, S> {
        Keys { inner: self.iter() }
    }

    /// Calls `visit` on every live entry until it returns `false`.
    ///
    /// Like [`iter`](Self::iter) this promotes the pending view first, but
    /// it hands out references instead of clones.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek::ReadMostlyMap;
    ///
    /// let map = ReadMostlyMap::new();
    /// map.insert(1, 10);
    /// map.insert(2, 20);
    ///
    /// let mut sum = 0;
    /// map.for_each_while(|_, value| {
    ///     sum += *value;
    ///     true
    /// });
    /// assert_eq!(sum, 30);
    /// ```
    pub fn for_each_while<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let guard = epoch::pin();
        let snap = self.authoritative(&guard);
        for (key, slot) in snap.entries.iter() {
            if let Some(value) = slot.load(&guard) {
                if !visit(key, value) {
                    return;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Loads the current stable snapshot.
    #[inline]
    fn snapshot<'g>(&self, guard: &'g Guard) -> &'g Snapshot<K, V, S> {
        // SAFETY: the snapshot pointer is never null and replaced
        // snapshots are retired through the same epoch domain.
        unsafe { self.stable.load(Ordering::Acquire, guard).deref() }
    }

    /// Loads the stable snapshot, promoting first if it is incomplete.
    fn authoritative<'g>(&self, guard: &'g Guard) -> &'g Snapshot<K, V, S> {
        let snap = self.snapshot(guard);
        if !snap.incomplete {
            return snap;
        }
        let mut pending = self.pending.lock();
        let snap = self.snapshot(guard);
        if snap.incomplete {
            self.promote_locked(&mut pending, guard);
        }
        drop(pending);
        self.snapshot(guard)
    }

    /// Resolves `key` through the pending view under the lock.
    ///
    /// Counts one miss whether or not the key is found; re-hits against a
    /// freshly promoted snapshot do not count.
    fn lookup_pending<Q>(&self, key: &Q, guard: &Guard) -> Option<Arc<Slot<V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut pending = self.pending.lock();
        let snap = self.snapshot(guard);
        if let Some(slot) = snap.entries.get(key) {
            return Some(Arc::clone(slot));
        }
        if !snap.incomplete {
            return None;
        }
        let slot = pending
            .entries
            .as_ref()
            .and_then(|entries| entries.get(key))
            .map(Arc::clone);
        self.miss_locked(&mut pending, guard);
        slot
    }

    fn insert_slow(&self, key: K, value: V, guard: &Guard) -> Option<V> {
        let mut pending = self.pending.lock();
        let snap = self.snapshot(guard);
        if let Some(slot) = snap.entries.get(&key) {
            if slot.unexpunge_locked(guard) {
                // The slot was expunged, so the pending view lost it.
                // Re-link before writing or the next promotion drops the
                // key on the floor.
                pending.entries_mut().insert(key, Arc::clone(slot));
            }
            slot.swap_locked(value, guard)
        } else if let Some(slot) = pending
            .entries
            .as_ref()
            .and_then(|entries| entries.get(&key))
        {
            let slot = Arc::clone(slot);
            let previous = slot.swap_locked(value, guard);
            self.miss_locked(&mut pending, guard);
            previous
        } else {
            if !snap.incomplete {
                self.materialize_locked(&mut pending, guard);
            }
            pending.entries_mut().insert(key, Arc::new(Slot::new(value)));
            None
        }
    }

    fn get_or_insert_slow(&self, key: K, value: V, guard: &Guard) -> V {
        let mut pending = self.pending.lock();
        let snap = self.snapshot(guard);
        if let Some(slot) = snap.entries.get(&key) {
            if slot.unexpunge_locked(guard) {
                pending.entries_mut().insert(key, Arc::clone(slot));
            }
            match slot.try_get_or_insert(value, guard) {
                Ok((actual, _)) => actual,
                // The expunged tag is only set while this lock is held,
                // and unexpunge_locked above just cleared it.
                Err(_) => unreachable!("slot expunged while the map lock is held"),
            }
        } else if let Some(slot) = pending
            .entries
            .as_ref()
            .and_then(|entries| entries.get(&key))
        {
            let slot = Arc::clone(slot);
            let actual = match slot.try_get_or_insert(value, guard) {
                Ok((actual, _)) => actual,
                // Pending-only slots are never expunged: the sweep that
                // sets the tag only runs while no pending view exists.
                Err(_) => unreachable!("pending slot observed as expunged"),
            };
            self.miss_locked(&mut pending, guard);
            actual
        } else {
            if !snap.incomplete {
                self.materialize_locked(&mut pending, guard);
            }
            let actual = value.clone();
            pending.entries_mut().insert(key, Arc::new(Slot::new(value)));
            actual
        }
    }

    /// Builds the pending view from the current snapshot.
    ///
    /// Tombstoned slots are marked expunged and left behind; everything
    /// else is carried over by reference. The snapshot is republished with
    /// the `incomplete` flag raised, sharing the same entry table.
    fn materialize_locked(&self, pending: &mut Pending<K, V, S>, guard: &Guard) {
        if pending.entries.is_some() {
            return;
        }
        let snap = self.snapshot(guard);
        let mut entries =
            HashMap::with_capacity_and_hasher(snap.entries.len(), self.hasher.clone());
        for (key, slot) in snap.entries.iter() {
            if !slot.try_expunge_locked(guard) {
                entries.insert(key.clone(), Arc::clone(slot));
            }
        }
        pending.entries = Some(entries);
        let refreshed = Snapshot {
            entries: Arc::clone(&snap.entries),
            incomplete: true,
        };
        let previous = self.stable.swap(Owned::new(refreshed), Ordering::AcqRel, guard);
        // SAFETY: unreachable after the swap; pinned readers may still
        // hold it.
        unsafe { guard.defer_destroy(previous) };
    }

    /// Publishes the pending view as the new stable snapshot.
    fn promote_locked(&self, pending: &mut Pending<K, V, S>, guard: &Guard) {
        let entries = pending
            .entries
            .take()
            .expect("incomplete snapshot without a pending view");
        let snapshot = Snapshot {
            entries: Arc::new(entries),
            incomplete: false,
        };
        let previous = self.stable.swap(Owned::new(snapshot), Ordering::AcqRel, guard);
        // SAFETY: unreachable after the swap; pinned readers may still
        // hold it.
        unsafe { guard.defer_destroy(previous) };
        pending.misses = 0;
    }

    /// Records one slow-path resolution, promoting once the misses reach
    /// the size of the pending view.
    fn miss_locked(&self, pending: &mut Pending<K, V, S>, guard: &Guard) {
        pending.misses += 1;
        let threshold = pending.entries.as_ref().map_or(0, |entries| entries.len());
        if pending.misses >= threshold {
            self.promote_locked(pending, guard);
        }
    }
}

impl<K, V, S> fmt::Debug for ReadMostlyMap<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static + fmt::Debug,
    V: Clone + Send + Sync + 'static + fmt::Debug,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each_while(|key, value| {
            map.entry(key, value);
            true
        });
        map.finish()
    }
}

impl<K, V, S> Drop for ReadMostlyMap<K, V, S> {
    fn drop(&mut self) {
        // `&mut self` proves there are no readers left, so the final
        // snapshot can be reclaimed in place. Slots and values chain off
        // it through `Arc` and drop with it.
        let current = unsafe { self.stable.load(Ordering::Relaxed, epoch::unprotected()) };
        if !current.is_null() {
            // SAFETY: the map owns the published snapshot exclusively.
            unsafe { drop(current.into_owned()) };
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a ReadMostlyMap<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    type Item = (K, V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over clones of a map's live entries.
///
/// Holds an epoch guard and a reference to the snapshot it walks, so it
/// stays valid even if the map promotes or clears mid-iteration; it simply
/// keeps yielding from the snapshot it started with.
pub struct Iter<'a, K, V, S = FixedState> {
    entries: hash_map::Iter<'a, K, Arc<Slot<V>>>,
    _table: Arc<Entries<K, V, S>>,
    guard: Guard,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S>
where
    K: Clone,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        for (key, slot) in self.entries.by_ref() {
            // Tombstoned and expunged slots are skipped, not yielded.
            if let Some(value) = slot.get(&self.guard) {
                return Some((key.clone(), value));
            }
        }
        None
    }
}

/// Iterator over clones of a map's live keys.
pub struct Keys<'a, K, V, S = FixedState> {
    inner: Iter<'a, K, V, S>,
}

impl<'a, K, V, S> Iterator for Keys<'a, K, V, S>
where
    K: Clone,
    V: Clone + Send + Sync + 'static,
{
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.inner.next().map(|(key, _)| key)
    }
}

// ============================================================================
// Tests
// ============================================================================

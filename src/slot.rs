//! `Slot<V>` — the shared per-key value cell.
//!
//! Both views of the map point at the *same* slot for a given key, so a
//! value written through one view is immediately visible through the other.
//! The slot itself is a single tagged atomic pointer with three states:
//!
//! - **live**: non-null, tag 0 — the key is mapped to the pointee
//! - **soft-deleted**: null, tag 0 — the key was deleted but the slot is
//!   still linked into at least one view and may be resurrected in place
//! - **expunged**: null, tag [`EXPUNGED`] — the slot was soft-deleted while
//!   a fresh pending view was built, so the pending view does not carry it;
//!   it can only be revived under the map's exclusive lock
//!
//! All transitions are single CAS instructions; replaced values are retired
//! through the epoch collector so readers holding a pinned guard never see
//! a freed pointee.

use core::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};

/// Tag marking a null slot as expunged.
///
/// Tag bits live in the pointer's alignment bits, which is why the pointee
/// is wrapped in [`ValueBox`] below.
const EXPUNGED: usize = 1;

/// Heap cell for a value.
///
/// The alignment bump guarantees at least two low pointer bits for tags even
/// when `V` is a 1-byte type.
#[repr(align(4))]
pub(crate) struct ValueBox<V>(pub(crate) V);

/// A shared, atomically updated value cell.
pub(crate) struct Slot<V> {
    value: Atomic<ValueBox<V>>,
}

impl<V> Slot<V>
where
    V: Send + Sync + 'static,
{
    /// Creates a live slot holding `value`.
    pub(crate) fn new(value: V) -> Self {
        Slot {
            value: Atomic::new(ValueBox(value)),
        }
    }

    /// Returns a reference to the live value, or `None` if the slot is
    /// soft-deleted or expunged.
    ///
    /// The reference is valid for as long as `guard` is held.
    #[inline]
    pub(crate) fn load<'g>(&self, guard: &'g Guard) -> Option<&'g V> {
        let current = self.value.load(Ordering::Acquire, guard);
        // SAFETY: a live pointer stays allocated at least until every guard
        // pinned before its retirement is dropped.
        unsafe { current.as_ref() }.map(|cell| &cell.0)
    }

    /// Clones the live value out of the slot.
    #[inline]
    pub(crate) fn get(&self, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        self.load(guard).cloned()
    }

    /// Replaces the slot's value, returning the previous one.
    ///
    /// Fails with `Err(value)` if the slot is expunged, in which case the
    /// caller must retry under the map's exclusive lock: an expunged slot is
    /// missing from the pending view and writing through it would lose the
    /// update at the next promotion.
    pub(crate) fn try_swap(&self, mut value: V, guard: &Guard) -> Result<Option<V>, V>
    where
        V: Clone,
    {
        loop {
            let current = self.value.load(Ordering::Acquire, guard);
            if current.tag() == EXPUNGED {
                return Err(value);
            }
            let new = Owned::new(ValueBox(value));
            match self
                .value
                .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(_) => {
                    // SAFETY: `current` was loaded under `guard` and is
                    // either null or still allocated.
                    let old = match unsafe { current.as_ref() } {
                        Some(cell) => {
                            let old = cell.0.clone();
                            // SAFETY: `current` is now unreachable through
                            // this slot; pinned readers may still hold it.
                            unsafe { guard.defer_destroy(current) };
                            Some(old)
                        }
                        None => None,
                    };
                    return Ok(old);
                }
                Err(e) => value = e.new.into_box().0,
            }
        }
    }

    /// Unconditionally replaces the slot's value.
    ///
    /// Must only be called with the map's exclusive lock held, after
    /// [`unexpunge_locked`](Self::unexpunge_locked) where applicable, so the
    /// slot is known to be reachable from the pending view.
    pub(crate) fn swap_locked(&self, value: V, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        let previous = self
            .value
            .swap(Owned::new(ValueBox(value)), Ordering::AcqRel, guard);
        // SAFETY: `previous` was published through this slot and cannot have
        // been freed while our guard is pinned.
        match unsafe { previous.as_ref() } {
            Some(cell) => {
                let old = cell.0.clone();
                // SAFETY: unlinked by the swap above.
                unsafe { guard.defer_destroy(previous) };
                Some(old)
            }
            None => None,
        }
    }

    /// Returns the live value, or claims the soft-deleted slot with `value`.
    ///
    /// `Ok((existing, true))` means the slot was live; `Ok((value, false))`
    /// means the slot was claimed. Fails with `Err(value)` if the slot is
    /// expunged.
    pub(crate) fn try_get_or_insert(&self, mut value: V, guard: &Guard) -> Result<(V, bool), V>
    where
        V: Clone,
    {
        loop {
            let current = self.value.load(Ordering::Acquire, guard);
            if current.tag() == EXPUNGED {
                return Err(value);
            }
            // SAFETY: live pointers stay allocated while the guard is pinned.
            if let Some(existing) = unsafe { current.as_ref() } {
                return Ok((existing.0.clone(), true));
            }
            let inserted = value.clone();
            let new = Owned::new(ValueBox(value));
            match self
                .value
                .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(_) => return Ok((inserted, false)),
                Err(e) => value = e.new.into_box().0,
            }
        }
    }

    /// Transitions a live slot to soft-deleted, returning the old value.
    ///
    /// Returns `None` if the slot is already soft-deleted or expunged, which
    /// makes delete idempotent.
    pub(crate) fn delete(&self, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        let mut current = self.value.load(Ordering::Acquire, guard);
        loop {
            // SAFETY: live pointers stay allocated while the guard is pinned.
            let existing = unsafe { current.as_ref() }?;
            match self.value.compare_exchange(
                current,
                Shared::null(),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    let old = existing.0.clone();
                    // SAFETY: unlinked by the CAS above.
                    unsafe { guard.defer_destroy(current) };
                    return Some(old);
                }
                Err(e) => current = e.current,
            }
        }
    }

    /// Replaces the value with `new` if the current value equals `old`.
    ///
    /// A soft-deleted or expunged slot never matches.
    pub(crate) fn compare_and_swap(&self, old: &V, new: V, guard: &Guard) -> bool
    where
        V: PartialEq,
    {
        let mut current = self.value.load(Ordering::Acquire, guard);
        // SAFETY: live pointers stay allocated while the guard is pinned.
        match unsafe { current.as_ref() } {
            Some(existing) if existing.0 == *old => {}
            _ => return false,
        }
        let mut replacement = Owned::new(ValueBox(new));
        loop {
            match self.value.compare_exchange(
                current,
                replacement,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    // SAFETY: unlinked by the CAS above.
                    unsafe { guard.defer_destroy(current) };
                    return true;
                }
                Err(e) => {
                    current = e.current;
                    replacement = e.new;
                    // SAFETY: as above.
                    match unsafe { current.as_ref() } {
                        Some(existing) if existing.0 == *old => {}
                        _ => return false,
                    }
                }
            }
        }
    }

    /// Soft-deletes the slot if the current value equals `old`.
    pub(crate) fn compare_and_delete(&self, old: &V, guard: &Guard) -> bool
    where
        V: PartialEq,
    {
        let mut current = self.value.load(Ordering::Acquire, guard);
        loop {
            // SAFETY: live pointers stay allocated while the guard is pinned.
            match unsafe { current.as_ref() } {
                Some(existing) if existing.0 == *old => {}
                _ => return false,
            }
            match self.value.compare_exchange(
                current,
                Shared::null(),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    // SAFETY: unlinked by the CAS above.
                    unsafe { guard.defer_destroy(current) };
                    return true;
                }
                Err(e) => current = e.current,
            }
        }
    }

    /// Clears the expunged tag, transitioning expunged back to soft-deleted.
    ///
    /// Returns `true` if the slot *was* expunged, in which case the caller
    /// must re-link it into the pending view before writing through it.
    /// Must only be called with the map's exclusive lock held.
    pub(crate) fn unexpunge_locked(&self, guard: &Guard) -> bool {
        self.value
            .compare_exchange(
                Shared::null().with_tag(EXPUNGED),
                Shared::null(),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_ok()
    }

    /// Marks a soft-deleted slot as expunged.
    ///
    /// Returns `true` if the slot is expunged on return (whether by this
    /// call or already), `false` if it holds a live value. Must only be
    /// called with the map's exclusive lock held, while rebuilding the
    /// pending view.
    pub(crate) fn try_expunge_locked(&self, guard: &Guard) -> bool {
        let mut current = self.value.load(Ordering::Acquire, guard);
        while current.is_null() && current.tag() != EXPUNGED {
            match self.value.compare_exchange(
                current,
                Shared::null().with_tag(EXPUNGED),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => return true,
                Err(e) => current = e.current,
            }
        }
        current.tag() == EXPUNGED
    }
}

impl<V> Drop for Slot<V> {
    fn drop(&mut self) {
        // `&mut self` proves no other view or reader still holds this slot,
        // so the live value (if any) can be reclaimed in place.
        let current = unsafe { self.value.load(Ordering::Relaxed, epoch::unprotected()) };
        if !current.is_null() {
            // SAFETY: the slot owns its allocation exclusively at this point.
            unsafe { drop(current.into_owned()) };
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_slot_loads_value() {
        let guard = epoch::pin();
        let slot = Slot::new(7);
        assert_eq!(slot.load(&guard), Some(&7));
        assert_eq!(slot.get(&guard), Some(7));
    }

    #[test]
    fn delete_is_idempotent() {
        let guard = epoch::pin();
        let slot = Slot::new(7);
        assert_eq!(slot.delete(&guard), Some(7));
        assert_eq!(slot.load(&guard), None);
        assert_eq!(slot.delete(&guard), None);
    }

    #[test]
    fn try_swap_returns_previous_value() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        assert_eq!(slot.try_swap(2, &guard), Ok(Some(1)));
        assert_eq!(slot.load(&guard), Some(&2));
    }

    #[test]
    fn try_swap_resurrects_soft_deleted() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        slot.delete(&guard);
        assert_eq!(slot.try_swap(2, &guard), Ok(None));
        assert_eq!(slot.load(&guard), Some(&2));
    }

    #[test]
    fn try_swap_rejects_expunged() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        slot.delete(&guard);
        assert!(slot.try_expunge_locked(&guard));
        assert_eq!(slot.try_swap(2, &guard), Err(2));
        assert_eq!(slot.load(&guard), None);
    }

    #[test]
    fn expunge_skips_live_slots() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        assert!(!slot.try_expunge_locked(&guard));
        assert_eq!(slot.load(&guard), Some(&1));
    }

    #[test]
    fn expunge_is_sticky() {
        let guard = epoch::pin();
        let slot = Slot::<i32>::new(1);
        slot.delete(&guard);
        assert!(slot.try_expunge_locked(&guard));
        assert!(slot.try_expunge_locked(&guard));
    }

    #[test]
    fn unexpunge_reports_prior_state() {
        let guard = epoch::pin();
        let slot = Slot::<i32>::new(1);
        slot.delete(&guard);
        assert!(slot.try_expunge_locked(&guard));
        assert!(slot.unexpunge_locked(&guard));
        // Second call sees a plain soft-deleted slot.
        assert!(!slot.unexpunge_locked(&guard));
        // And the slot accepts lock-free writes again.
        assert_eq!(slot.try_swap(9, &guard), Ok(None));
        assert_eq!(slot.load(&guard), Some(&9));
    }

    #[test]
    fn try_get_or_insert_prefers_existing() {
        let guard = epoch::pin();
        let slot = Slot::new(10);
        assert_eq!(slot.try_get_or_insert(20, &guard), Ok((10, true)));
        assert_eq!(slot.load(&guard), Some(&10));
    }

    #[test]
    fn try_get_or_insert_claims_soft_deleted() {
        let guard = epoch::pin();
        let slot = Slot::new(10);
        slot.delete(&guard);
        assert_eq!(slot.try_get_or_insert(20, &guard), Ok((20, false)));
        assert_eq!(slot.load(&guard), Some(&20));
    }

    #[test]
    fn try_get_or_insert_rejects_expunged() {
        let guard = epoch::pin();
        let slot = Slot::new(10);
        slot.delete(&guard);
        assert!(slot.try_expunge_locked(&guard));
        assert_eq!(slot.try_get_or_insert(20, &guard), Err(20));
    }

    #[test]
    fn compare_and_swap_checks_value() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        assert!(!slot.compare_and_swap(&2, 9, &guard));
        assert_eq!(slot.load(&guard), Some(&1));
        assert!(slot.compare_and_swap(&1, 9, &guard));
        assert_eq!(slot.load(&guard), Some(&9));
    }

    #[test]
    fn compare_and_swap_misses_soft_deleted() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        slot.delete(&guard);
        assert!(!slot.compare_and_swap(&1, 9, &guard));
        assert_eq!(slot.load(&guard), None);
    }

    #[test]
    fn compare_and_delete_checks_value() {
        let guard = epoch::pin();
        let slot = Slot::new(1);
        assert!(!slot.compare_and_delete(&2, &guard));
        assert_eq!(slot.load(&guard), Some(&1));
        assert!(slot.compare_and_delete(&1, &guard));
        assert_eq!(slot.load(&guard), None);
        assert!(!slot.compare_and_delete(&1, &guard));
    }

    #[test]
    fn drop_reclaims_live_value() {
        let slot = Slot::new(String::from("payload"));
        drop(slot);
    }
}

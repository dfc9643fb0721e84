//! Compact per-entity position lists.
//!
//! An [`IdArray`] records which dense-table rows belong to one entity. It is
//! an 8-byte value type:
//!
//! - `count == 0`: nothing is stored.
//! - `count == 1`: the single row is stored inline in `start`.
//! - `count > 1`: `start` is a slot in the [`IdArrayHeap`] pool whose size
//!   class fits `count`. Pool `k` hands out slots of `2 << k` rows, so a
//!   list of 2 lives in pool 0, 3..=4 in pool 1, 5..=8 in pool 2, and so on.
//!
//! Entities with zero or one row never touch the heap. Lists move to the
//! next pool when they outgrow their slot and back down when they shrink
//! across a power of two, so the pool is always derivable from `count`.

// ---------------------------------------------------------------------------
// IdArray
// ---------------------------------------------------------------------------

/// A small list of row positions, inline for 0 or 1 entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdArray {
    /// Inline row when `count == 1`, pool slot when `count > 1`.
    start: u32,
    count: u32,
}

/// Pool holding lists of `count` positions (`count >= 2`).
#[inline]
fn pool_index(count: u32) -> usize {
    debug_assert!(count >= 2);
    (count - 1).ilog2() as usize
}

impl IdArray {
    /// An empty list.
    pub const EMPTY: IdArray = IdArray { start: 0, count: 0 };

    /// Number of positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the list holds no positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// View the positions without copying.
    #[inline]
    pub fn as_slice<'a>(&'a self, heap: &'a IdArrayHeap) -> &'a [u32] {
        match self.count {
            0 => &[],
            1 => std::slice::from_ref(&self.start),
            n => &heap.pools[pool_index(n)].slot(self.start)[..n as usize],
        }
    }

    /// Append `id`.
    pub fn add(&mut self, id: u32, heap: &mut IdArrayHeap) {
        match self.count {
            0 => self.start = id,
            1 => {
                let pool = heap.pool_mut(0);
                let slot = pool.alloc();
                let ids = pool.slot_mut(slot);
                ids[0] = self.start;
                ids[1] = id;
                self.start = slot;
            }
            n => {
                let current = pool_index(n);
                let next = pool_index(n + 1);
                if current != next {
                    self.start = heap.move_slot(current, self.start, next, n as usize);
                }
                heap.pool_mut(next).slot_mut(self.start)[n as usize] = id;
            }
        }
        self.count += 1;
    }

    /// Remove the position at `index` by moving the last position into it.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove_at(&mut self, index: usize, heap: &mut IdArrayHeap) {
        assert!(
            index < self.len(),
            "IdArray index {index} out of bounds (len {})",
            self.count
        );
        match self.count {
            1 => self.start = 0,
            2 => {
                let pool = heap.pool_mut(0);
                let keep = pool.slot(self.start)[1 - index];
                pool.free(self.start);
                self.start = keep;
            }
            n => {
                let current = pool_index(n);
                let last = n as usize - 1;
                let ids = heap.pool_mut(current).slot_mut(self.start);
                ids[index] = ids[last];
                let target = pool_index(n - 1);
                if target != current {
                    self.start = heap.move_slot(current, self.start, target, last);
                }
            }
        }
        self.count -= 1;
    }

    /// Overwrite the position at `index` with `id`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn set(&mut self, index: usize, id: u32, heap: &mut IdArrayHeap) {
        assert!(
            index < self.len(),
            "IdArray index {index} out of bounds (len {})",
            self.count
        );
        match self.count {
            1 => self.start = id,
            n => heap.pool_mut(pool_index(n)).slot_mut(self.start)[index] = id,
        }
    }
}

// ---------------------------------------------------------------------------
// IdArrayPool
// ---------------------------------------------------------------------------

/// Fixed-size slots of positions for one size class, with a free list.
#[derive(Debug, Clone)]
struct IdArrayPool {
    /// Positions per slot (`2 << class`).
    slot_len: usize,
    /// Backing storage, `slot_len` entries per slot.
    ids: Vec<u32>,
    /// Slots available for reuse.
    free_slots: Vec<u32>,
}

impl IdArrayPool {
    fn new(class: usize) -> Self {
        Self {
            slot_len: 2 << class,
            ids: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    fn alloc(&mut self) -> u32 {
        if let Some(slot) = self.free_slots.pop() {
            return slot;
        }
        let slot = (self.ids.len() / self.slot_len) as u32;
        self.ids.resize(self.ids.len() + self.slot_len, 0);
        slot
    }

    fn free(&mut self, slot: u32) {
        debug_assert!(!self.free_slots.contains(&slot), "double free of slot {slot}");
        self.free_slots.push(slot);
    }

    #[inline]
    fn slot(&self, slot: u32) -> &[u32] {
        let start = slot as usize * self.slot_len;
        &self.ids[start..start + self.slot_len]
    }

    #[inline]
    fn slot_mut(&mut self, slot: u32) -> &mut [u32] {
        let start = slot as usize * self.slot_len;
        &mut self.ids[start..start + self.slot_len]
    }

    fn live_slots(&self) -> usize {
        self.ids.len() / self.slot_len - self.free_slots.len()
    }
}

// ---------------------------------------------------------------------------
// IdArrayHeap
// ---------------------------------------------------------------------------

/// Size-bucketed pools backing every [`IdArray`] of one relation store.
///
/// Pools are created lazily the first time a list reaches their size class.
#[derive(Debug, Default, Clone)]
pub struct IdArrayHeap {
    pools: Vec<IdArrayPool>,
}

impl IdArrayHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self { pools: Vec::new() }
    }

    /// Number of pool slots currently handed out, across all size classes.
    pub fn slot_count(&self) -> usize {
        self.pools.iter().map(IdArrayPool::live_slots).sum()
    }

    fn pool_mut(&mut self, class: usize) -> &mut IdArrayPool {
        while self.pools.len() <= class {
            let next = self.pools.len();
            self.pools.push(IdArrayPool::new(next));
        }
        &mut self.pools[class]
    }

    /// Copy the first `len` positions of `slot` in pool `from` into a fresh
    /// slot of pool `to`, release the old slot, and return the new one.
    fn move_slot(&mut self, from: usize, slot: u32, to: usize, len: usize) -> u32 {
        debug_assert_ne!(from, to);
        self.pool_mut(from.max(to));
        let new_slot = self.pools[to].alloc();
        let (src, dst) = if from < to {
            let (low, high) = self.pools.split_at_mut(to);
            (&mut low[from], &mut high[0])
        } else {
            let (low, high) = self.pools.split_at_mut(from);
            (&mut high[0], &mut low[to])
        };
        dst.slot_mut(new_slot)[..len].copy_from_slice(&src.slot(slot)[..len]);
        src.free(slot);
        tracing::trace!(from, to, len, "moved position list between pools");
        new_slot
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_classes() {
        assert_eq!(pool_index(2), 0);
        assert_eq!(pool_index(3), 1);
        assert_eq!(pool_index(4), 1);
        assert_eq!(pool_index(5), 2);
        assert_eq!(pool_index(8), 2);
        assert_eq!(pool_index(9), 3);
    }

    #[test]
    fn zero_and_one_stay_inline() {
        let mut heap = IdArrayHeap::new();
        let mut ids = IdArray::default();
        assert!(ids.as_slice(&heap).is_empty());
        ids.add(42, &mut heap);
        assert_eq!(ids.as_slice(&heap), &[42]);
        assert_eq!(heap.slot_count(), 0);
        ids.remove_at(0, &mut heap);
        assert!(ids.is_empty());
        assert_eq!(heap.slot_count(), 0);
    }

    #[test]
    fn growth_moves_through_pools() {
        let mut heap = IdArrayHeap::new();
        let mut ids = IdArray::default();
        for i in 0..20 {
            ids.add(i * 10, &mut heap);
            let expected: Vec<u32> = (0..=i).map(|v| v * 10).collect();
            assert_eq!(ids.as_slice(&heap), expected.as_slice());
        }
        assert_eq!(ids.len(), 20);
        // Only the current slot is live; outgrown ones were released.
        assert_eq!(heap.slot_count(), 1);
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut heap = IdArrayHeap::new();
        let mut ids = IdArray::default();
        for v in [1, 2, 3, 4, 5] {
            ids.add(v, &mut heap);
        }
        ids.remove_at(1, &mut heap);
        assert_eq!(ids.as_slice(&heap), &[1, 5, 3, 4]);
        ids.remove_at(3, &mut heap);
        assert_eq!(ids.as_slice(&heap), &[1, 5, 3]);
        ids.remove_at(0, &mut heap);
        assert_eq!(ids.as_slice(&heap), &[3, 5]);
        ids.remove_at(0, &mut heap);
        assert_eq!(ids.as_slice(&heap), &[5]);
        assert_eq!(heap.slot_count(), 0, "single entry returns inline");
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut heap = IdArrayHeap::new();
        let mut single = IdArray::default();
        single.add(7, &mut heap);
        single.set(0, 8, &mut heap);
        assert_eq!(single.as_slice(&heap), &[8]);

        let mut many = IdArray::default();
        for v in [1, 2, 3] {
            many.add(v, &mut heap);
        }
        many.set(2, 30, &mut heap);
        assert_eq!(many.as_slice(&heap), &[1, 2, 30]);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = IdArrayHeap::new();
        let mut a = IdArray::default();
        a.add(1, &mut heap);
        a.add(2, &mut heap);
        a.remove_at(1, &mut heap);
        assert_eq!(heap.slot_count(), 0, "back to inline");

        let mut b = IdArray::default();
        b.add(3, &mut heap);
        b.add(4, &mut heap);
        assert_eq!(heap.slot_count(), 1);
        assert_eq!(heap.pools[0].ids.len(), 2, "slot was recycled, not appended");
    }

    #[test]
    fn independent_arrays_share_pools() {
        let mut heap = IdArrayHeap::new();
        let mut a = IdArray::default();
        let mut b = IdArray::default();
        for v in 0..6 {
            a.add(v, &mut heap);
            b.add(100 + v, &mut heap);
        }
        assert_eq!(a.as_slice(&heap), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(b.as_slice(&heap), &[100, 101, 102, 103, 104, 105]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn remove_out_of_bounds_panics() {
        let mut heap = IdArrayHeap::new();
        let mut ids = IdArray::default();
        ids.add(1, &mut heap);
        ids.remove_at(1, &mut heap);
    }
}

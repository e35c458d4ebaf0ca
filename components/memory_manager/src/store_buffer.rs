//! Store buffer for tenured-to-nursery edges.
//!
//! When a tenured object is modified to point at a nursery object, the
//! written slot is recorded here by the post-write barrier. During a minor
//! collection these slots act as extra roots, so the tenured heap does not
//! have to be scanned. Once more distinct slots are recorded than the buffer
//! can hold it overflows, drops its contents and forces the collector onto
//! the whole-heap fallback path until it is cleared.

use std::collections::HashSet;

use core_types::ValueSlot;

/// Log of slots in the tenured heap that may point into the nursery.
#[derive(Debug)]
pub struct StoreBuffer {
    /// Recorded slots in insertion order
    edges: Vec<ValueSlot>,
    /// Membership index for `edges`
    seen: HashSet<ValueSlot>,
    /// Maximum number of distinct slots before overflow
    capacity: usize,
    /// Set once `capacity` is exceeded, until `clear`
    overflowed: bool,
}

impl StoreBuffer {
    /// Creates an empty store buffer holding up to `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        StoreBuffer {
            edges: Vec::new(),
            seen: HashSet::new(),
            capacity,
            overflowed: false,
        }
    }

    /// Records a slot that now holds a nursery pointer.
    pub fn put(&mut self, slot: ValueSlot) {
        if self.overflowed || self.seen.contains(&slot) {
            return;
        }
        if self.edges.len() >= self.capacity {
            log::trace!(
                "store buffer overflowed after {} edges",
                self.edges.len()
            );
            self.overflowed = true;
            self.edges.clear();
            self.seen.clear();
            return;
        }
        self.seen.insert(slot);
        self.edges.push(slot);
    }

    /// Returns true if edges were dropped since the last `clear`.
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Hands every recorded slot to `visit`.
    pub fn mark(&self, visit: &mut dyn FnMut(ValueSlot)) {
        for &slot in &self.edges {
            visit(slot);
        }
    }

    /// Forgets all recorded slots and resets the overflow flag.
    pub fn clear(&mut self) {
        self.edges.clear();
        self.seen.clear();
        self.overflowed = false;
    }

    /// Returns true if `slot` is recorded.
    pub fn contains(&self, slot: &ValueSlot) -> bool {
        self.seen.contains(slot)
    }

    /// Number of recorded slots.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if no slot is recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Maximum number of slots before overflow.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StoreBuffer {
    fn default() -> Self {
        Self::new(4096)
    }
}

//! Per-frame-slot deferred deletion (`SPEC_FULL.md` §4.A, §2.1).
//!
//! A dropped resource is appended to the bin of the slot that is currently
//! being recorded; that bin is drained -- and only then actually freed --
//! the next time `begin_frame` visits that same slot, i.e. after at least
//! `frames_in_flight` frames have elapsed. This is tied to frame-slot
//! recycling rather than a raw counter, matching the original engine's
//! end-of-render-task-callback intent (§2.1) rather than a fixed timer.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::arena::ResourceId;

pub(crate) struct DeletionState<T> {
    current_slot: AtomicUsize,
    bins: Mutex<Vec<Vec<ResourceId<T>>>>,
    _marker: PhantomData<T>,
}

impl<T> DeletionState<T> {
    pub(crate) fn new(frames_in_flight: usize) -> Arc<Self> {
        Arc::new(Self {
            current_slot: AtomicUsize::new(0),
            bins: Mutex::new(vec![Vec::new(); frames_in_flight.max(1)]),
            _marker: PhantomData,
        })
    }

    pub(crate) fn enqueue(&self, id: ResourceId<T>) {
        let slot = self.current_slot.load(Ordering::Acquire);
        self.bins.lock()[slot].push(id);
    }

    /// Drains `bins[slot]` (resources dropped the last time `slot` was
    /// current) and then marks `slot` current for any deletions that occur
    /// during this frame's recording.
    pub(crate) fn begin_frame(&self, slot: usize) -> Vec<ResourceId<T>> {
        let drained = std::mem::take(&mut self.bins.lock()[slot]);
        self.current_slot.store(slot, Ordering::Release);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn drop_is_deferred_until_slot_recycles() {
        let state = DeletionState::<u32>::new(3);
        let mut arena: Arena<u32> = Arena::new();
        let id = arena.insert(42);

        state.begin_frame(0);
        // dropped "during" slot 0's recording window
        state.enqueue(id);

        // slot 1 and slot 2 come and go without freeing slot 0's resource
        assert!(state.begin_frame(1).is_empty());
        assert!(state.begin_frame(2).is_empty());
        assert!(arena.contains(id));

        // only when slot 0 is current again is it drained
        let freed = state.begin_frame(0);
        assert_eq!(freed, vec![id]);
        for freed_id in freed {
            arena.remove(freed_id);
        }
        assert!(!arena.contains(id));
    }
}

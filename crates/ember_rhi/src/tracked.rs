//! `Tracked<T>` fuses an `Arena<T>` with its `DeletionState<T>`, and mints
//! the RAII `Handle<T>` that consumer code actually stores. One `Tracked<T>`
//! exists per resource kind inside the context (`SPEC_FULL.md` §4.A.1).

use std::sync::Arc;

use crate::arena::{Arena, ResourceId};
use crate::deletion::DeletionState;

/// An owned, single-owner reference to a resource of kind `T`. Dropping the
/// last (only) `Handle<T>` enqueues its backing resource for deferred
/// deletion (`SPEC_FULL.md` §4.A) rather than freeing it immediately.
///
/// Higher layers that need to *share* a resource (e.g. a texture reused by
/// several materials) wrap this in their own explicit reference count --
/// see `ember_render`'s bindless table -- rather than this type growing
/// `Clone`/refcounting itself, which would reproduce the `shared_ptr`
/// aliasing problem `SPEC_FULL.md` §9 calls out.
pub struct Handle<T> {
    id: ResourceId<T>,
    state: Arc<DeletionState<T>>,
}

impl<T> Handle<T> {
    #[must_use]
    pub fn id(&self) -> ResourceId<T> {
        self.id
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.state.enqueue(self.id);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:?})", self.id)
    }
}

pub struct Tracked<T> {
    arena: Arena<T>,
    state: Arc<DeletionState<T>>,
}

impl<T> Tracked<T> {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            arena: Arena::new(),
            state: DeletionState::new(frames_in_flight),
        }
    }

    pub fn create(&mut self, value: T) -> Handle<T> {
        let id = self.arena.insert(value);
        Handle {
            id,
            state: self.state.clone(),
        }
    }

    #[must_use]
    pub fn get(&self, handle: &Handle<T>) -> Option<&T> {
        self.arena.get(handle.id)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: &Handle<T>) -> Option<&mut T> {
        self.arena.get_mut(handle.id)
    }

    #[must_use]
    pub fn resolve(&self, id: ResourceId<T>) -> Option<&T> {
        self.arena.get(id)
    }

    #[must_use]
    pub fn resolve_mut(&mut self, id: ResourceId<T>) -> Option<&mut T> {
        self.arena.get_mut(id)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn contains(&self, id: ResourceId<T>) -> bool {
        self.arena.contains(id)
    }

    /// Drains and frees whatever was dropped the last time `slot` was
    /// current, then marks `slot` current going forward.
    pub fn begin_frame(&mut self, slot: usize) {
        for id in self.state.begin_frame(slot) {
            self.arena.remove(id);
        }
    }
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_handle_defers_deletion_across_slots() {
        let mut tracked: Tracked<u32> = Tracked::new(2);
        tracked.begin_frame(0);
        let handle = tracked.create(99);
        let id = handle.id();
        assert_eq!(tracked.live_count(), 1);

        drop(handle);
        assert_eq!(tracked.live_count(), 1, "still pending deletion");

        tracked.begin_frame(1);
        assert_eq!(tracked.live_count(), 1, "slot 1's bin is unrelated");

        tracked.begin_frame(0);
        assert_eq!(tracked.live_count(), 0, "slot 0 recycled, now freed");
        assert!(tracked.resolve(id).is_none());
    }
}

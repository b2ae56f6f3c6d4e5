//! Typed resource arena (`SPEC_FULL.md` §4.A.1, §9 "shared mutable
//! smart-pointer graphs" redesign note).
//!
//! Every RHI resource lives in an `Arena<T>` owned by the context; clients
//! never hold a reference into it across a frame boundary, only a
//! `ResourceId<T>` -- a generation-tagged index, cheap to copy, resolved
//! back to `&T`/`&mut T` only at the point of use.

use slotmap::{new_key_type, SlotMap};
use std::marker::PhantomData;

new_key_type! {
    struct RawKey;
}

/// A generation-tagged handle into an `Arena<T>`. Carries no lifetime and
/// no reference to the arena itself, so it can be stored freely in proxies,
/// passes and PSOs (`SPEC_FULL.md` §9).
pub struct ResourceId<T> {
    key: RawKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ResourceId<T> {
    fn from_key(key: RawKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ResourceId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ResourceId<T> {}
impl<T> PartialEq for ResourceId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<T> Eq for ResourceId<T> {}
impl<T> std::hash::Hash for ResourceId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
impl<T> std::fmt::Debug for ResourceId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceId({:?})", self.key)
    }
}

/// A null id, valid as a placeholder in tests and in `Option`-free slots
/// (e.g. an uninitialized `Tlas` instance) -- never resolves to a live
/// resource in any arena.
impl<T> Default for ResourceId<T> {
    fn default() -> Self {
        Self::from_key(RawKey::default())
    }
}

/// Owns every live `T` of one resource kind. Removal does not compact or
/// reorder -- `SlotMap` keeps existing keys valid and detects use of a
/// freed/regenerated slot.
pub struct Arena<T> {
    slots: SlotMap<RawKey, T>,
}

impl<T> Arena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: SlotMap::with_key() }
    }

    pub fn insert(&mut self, value: T) -> ResourceId<T> {
        ResourceId::from_key(self.slots.insert(value))
    }

    #[must_use]
    pub fn get(&self, id: ResourceId<T>) -> Option<&T> {
        self.slots.get(id.key)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: ResourceId<T>) -> Option<&mut T> {
        self.slots.get_mut(id.key)
    }

    #[must_use]
    pub fn contains(&self, id: ResourceId<T>) -> bool {
        self.slots.contains_key(id.key)
    }

    /// Frees the slot, returning its last value if it was still live.
    /// Called only from a deletion-bin drain (`SPEC_FULL.md` §4.A) -- never
    /// directly by consumer code, which only ever drops a `Handle<T>`.
    pub fn remove(&mut self, id: ResourceId<T>) -> Option<T> {
        self.slots.remove(id.key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_id_is_not_found_after_removal() {
        let mut arena: Arena<u32> = Arena::new();
        let id = arena.insert(7);
        assert_eq!(arena.remove(id), Some(7));
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn ids_are_distinct_across_kinds_by_type() {
        let mut images: Arena<&'static str> = Arena::new();
        let mut buffers: Arena<&'static str> = Arena::new();
        let a = images.insert("image");
        let b = buffers.insert("buffer");
        assert_eq!(images.get(a), Some(&"image"));
        assert_eq!(buffers.get(b), Some(&"buffer"));
    }
}

//! Declarative shader resource tables and bind-diffing (`SPEC_FULL.md`
//! §4.A: "at bind time, a `ShaderResourceSet` hashes the ids of its
//! resources and, if changed since last bind, pushes a descriptor
//! update"). Modeled on the teacher's `resource_ids.rs`
//! (`ResourceIdSet`/`BindGroupFingerprint`) bind-group fingerprinting.

use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// What kind of resource a named binding expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
    Sampler,
    Tlas,
    BindlessArray,
}

/// One named binding declared by a shader's interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDecl {
    pub name: &'static str,
    pub kind: BindingKind,
    pub is_bindless: bool,
}

/// Assigned `(set, slot)` for a binding, filled in by backend reflection at
/// PSO-compile time (`SPEC_FULL.md` §4.A, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingLocation {
    pub set: u32,
    pub slot: u32,
}

/// A 64-bit opaque id for any bindable resource (an image view, buffer,
/// sampler, TLAS, ...), stable for the resource's lifetime.
pub type BindableId = u64;
const INVALID_ID: BindableId = u64::MAX;

/// The set of resources currently bound for one shader's interface. Hashing
/// this and comparing against the last-bound hash is what lets `draw`/
/// `dispatch` skip re-binding a descriptor set that hasn't changed
/// (`SPEC_FULL.md` §4.A).
#[derive(Debug, Clone, Default)]
pub struct ShaderResourceSet {
    ids: SmallVec<[BindableId; 16]>,
    cached_hash: u64,
    dirty: bool,
}

impl ShaderResourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: SmallVec::new(),
            cached_hash: 0,
            dirty: true,
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.dirty = true;
    }

    pub fn bind(&mut self, id: BindableId) {
        self.ids.push(id);
        self.dirty = true;
    }

    pub fn bind_optional(&mut self, id: Option<BindableId>) {
        self.ids.push(id.unwrap_or(INVALID_ID));
        self.dirty = true;
    }

    fn hash(&mut self) -> u64 {
        if self.dirty {
            let mut hasher = FxHasher::default();
            self.ids.len().hash(&mut hasher);
            for id in &self.ids {
                id.hash(&mut hasher);
            }
            self.cached_hash = hasher.finish();
            self.dirty = false;
        }
        self.cached_hash
    }

    /// Compares against `last_hash`; returns `(changed, new_hash)`. Callers
    /// rebind the descriptor set only when `changed` is true.
    pub fn diff(&mut self, last_hash: u64) -> (bool, u64) {
        let hash = self.hash();
        (hash != last_hash, hash)
    }
}

/// An attribute-derived key for sampler deduplication and the lazily
/// created dummy placeholder texture (`SPEC_FULL.md` §4.A: "Samplers are
/// deduplicated by attribute hash. A dummy 1x1 texture keyed by the
/// shader-visible hash of an attribute is lazily created and reused").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerAttr {
    pub bilinear: bool,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub anisotropy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl SamplerAttr {
    #[must_use]
    pub fn hash_key(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for SamplerAttr {
    fn default() -> Self {
        Self {
            bilinear: true,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            anisotropy: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bindings_diff_as_unchanged() {
        let mut set = ShaderResourceSet::new();
        set.bind(1);
        set.bind(2);
        let (changed, hash) = set.diff(0);
        assert!(changed);

        let (changed_again, hash_again) = set.diff(hash);
        assert!(!changed_again);
        assert_eq!(hash, hash_again);
    }

    #[test]
    fn rebinding_a_different_resource_changes_the_hash() {
        let mut a = ShaderResourceSet::new();
        a.bind(1);
        let (_, hash_a) = a.diff(0);

        let mut b = ShaderResourceSet::new();
        b.bind(2);
        let (changed, _) = b.diff(hash_a);
        assert!(changed);
    }

    #[test]
    fn sampler_attrs_dedupe_by_hash() {
        let a = SamplerAttr::default();
        let b = SamplerAttr::default();
        assert_eq!(a.hash_key(), b.hash_key());

        let c = SamplerAttr {
            bilinear: false,
            ..SamplerAttr::default()
        };
        assert_ne!(a.hash_key(), c.hash_key());
    }
}

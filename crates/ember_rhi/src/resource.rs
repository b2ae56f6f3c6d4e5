//! Concrete resource payloads stored in the context's per-kind arenas.
//! `SPEC_FULL.md` §3 ("Image", "Buffer") plus the TLAS/BLAS descriptors of
//! §4.C.

use rustc_hash::FxHashMap;

use crate::arena::ResourceId;
use crate::flags::{BufferUsage, ImageType, ImageUsage, ImageViewKey, MemoryProperties};
use crate::format::{ImageLayout, PixelFormat};
use crate::shader_resource::{BindingDecl, BindingLocation, SamplerAttr};

#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub sampler_attr: SamplerAttr,
    pub image_type: ImageType,
    pub usage: ImageUsage,
    pub memory_properties: MemoryProperties,
    pub initial_layout: ImageLayout,
}

impl ImageDesc {
    #[must_use]
    pub fn storage_size(&self) -> usize {
        // Each mip halves (floor, min 1) in each dimension; the cube variant
        // has six faces per mip.
        let faces = if self.image_type == ImageType::Cube { 6 } else { 1 };
        let texel = self.format.texel_size();
        let mut total = 0usize;
        let mut w = self.width.max(1);
        let mut h = self.height.max(1);
        for _ in 0..self.mip_levels.max(1) {
            total += w as usize * h as usize * texel * faces;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        total
    }
}

/// A software-backed image: raw texel storage plus per-mip layout tracking
/// and a cache of the views created over it (`SPEC_FULL.md` §3).
pub struct Image {
    pub desc: ImageDesc,
    pub(crate) data: Vec<u8>,
    layout_per_mip: Vec<ImageLayout>,
    view_cache: FxHashMap<ImageViewKey, ResourceId<ImageView>>,
}

impl Image {
    #[must_use]
    pub fn new(desc: ImageDesc) -> Self {
        let size = desc.storage_size();
        let mip_levels = desc.mip_levels.max(1) as usize;
        let initial = desc.initial_layout;
        Self {
            data: vec![0u8; size],
            layout_per_mip: vec![initial; mip_levels],
            view_cache: FxHashMap::default(),
            desc,
        }
    }

    #[must_use]
    pub fn current_layout(&self, mip: u32) -> ImageLayout {
        self.layout_per_mip[mip as usize]
    }

    /// Applies a transition; a no-op when every targeted mip is already at
    /// `target_layout` (`SPEC_FULL.md` §4.A).
    pub fn transition(&mut self, target_layout: ImageLayout, base_mip: u32, mip_count: u32) -> bool {
        let range = base_mip as usize..(base_mip + mip_count.max(1)) as usize;
        let already_there = self.layout_per_mip[range.clone()]
            .iter()
            .all(|l| *l == target_layout);
        if already_there {
            return false;
        }
        for l in &mut self.layout_per_mip[range] {
            *l = target_layout;
        }
        true
    }

    pub(crate) fn cached_view(&self, key: ImageViewKey) -> Option<ResourceId<ImageView>> {
        self.view_cache.get(&key).copied()
    }

    pub(crate) fn cache_view(&mut self, key: ImageViewKey, id: ResourceId<ImageView>) {
        self.view_cache.insert(key, id);
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

pub struct ImageView {
    pub image: ResourceId<Image>,
    pub key: ImageViewKey,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub size: usize,
    pub usage: BufferUsage,
    pub memory_properties: MemoryProperties,
    pub is_dynamic: bool,
}

pub struct Buffer {
    pub desc: BufferDesc,
    pub(crate) data: Vec<u8>,
}

impl Buffer {
    #[must_use]
    pub fn new(desc: BufferDesc) -> Self {
        let size = desc.size;
        Self {
            data: vec![0u8; size],
            desc,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

pub struct Sampler {
    pub attr: SamplerAttr,
}

/// A compiled shader's declarative resource interface plus the `(set,
/// slot)` locations backend reflection assigns at compile time
/// (`SPEC_FULL.md` §4.A, §6).
pub struct PipelineState {
    pub bindings: Vec<BindingDecl>,
    compiled: bool,
    locations: FxHashMap<&'static str, BindingLocation>,
}

impl PipelineState {
    #[must_use]
    pub fn new(bindings: Vec<BindingDecl>) -> Self {
        Self {
            bindings,
            compiled: false,
            locations: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Lazily reflects `(set, slot)` for each named binding. A set index is
    /// assigned per binding in declaration order (one set per binding here,
    /// matching the reference backend's simplicity; a hardware backend
    /// would pack several bindings per set by reflection).
    pub fn compile(&mut self) {
        if self.compiled {
            return;
        }
        for (slot, binding) in self.bindings.iter().enumerate() {
            self.locations.insert(
                binding.name,
                BindingLocation {
                    set: slot as u32,
                    slot: 0,
                },
            );
        }
        self.compiled = true;
    }

    #[must_use]
    pub fn location_of(&self, name: &str) -> Option<BindingLocation> {
        self.locations.get(name).copied()
    }
}

pub struct RenderPass {
    pub name: &'static str,
}

pub struct ComputePass {
    pub name: &'static str,
}

/// A GPU timer query. The software backend just accumulates a
/// caller-reported duration so tests can assert the contract without a real
/// device clock.
#[derive(Default)]
pub struct Timer {
    pub last_elapsed_ns: u64,
}

/// Per-mesh bottom-level acceleration structure handle. The actual BVH
/// lives in `ember_accel`; the RHI side only tracks the GPU-visible
/// descriptor (`SPEC_FULL.md` §4.C).
pub struct Blas {
    pub vertex_buffer: ResourceId<Buffer>,
    pub index_buffer: ResourceId<Buffer>,
    pub triangle_count: u32,
}

/// Scene-wide top-level acceleration structure. Holds a dense array of
/// `BLAS` references indexed by primitive id; `set_blas` marks the TLAS
/// id-dirty only on a structural (pointer) change (`SPEC_FULL.md` §4.C).
pub struct Tlas {
    instances: Vec<Option<ResourceId<Blas>>>,
    id: u64,
    id_dirty: bool,
    next_id: u64,
}

impl Tlas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            id: 0,
            id_dirty: false,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn blas_at(&self, index: usize) -> Option<ResourceId<Blas>> {
        self.instances.get(index).copied().flatten()
    }

    /// Sets the BLAS for instance `index`, growing the array if needed.
    /// Marks the TLAS id-dirty only when the pointer actually changes,
    /// matching "the TLAS's shader-visible `id` changes iff structural
    /// rebuild happens" (§4.C).
    pub fn set_blas(&mut self, index: usize, blas: Option<ResourceId<Blas>>) {
        if index >= self.instances.len() {
            self.instances.resize(index + 1, None);
        }
        if self.instances[index] != blas {
            self.instances[index] = blas;
            self.id_dirty = true;
        }
    }

    /// Structural rebuild: reassigns the shader-visible id, which
    /// propagates to every shader-resource-set that references this TLAS
    /// and triggers a rebind on their next diff.
    pub fn build(&mut self) {
        if self.id_dirty {
            self.id = self.next_id;
            self.next_id += 1;
            self.id_dirty = false;
        }
    }

    /// Transform-only update of a subset of instances: does not touch the
    /// shader-visible id.
    pub fn update(&mut self, _indices: &[usize]) {}

    #[must_use]
    pub fn is_id_dirty(&self) -> bool {
        self.id_dirty
    }
}

impl Default for Tlas {
    fn default() -> Self {
        Self::new()
    }
}

/// A growable bindless array: texture or per-primitive buffer slots. Grows
/// by doubling; growth sets `buffer_dirty`, which consumers must observe
/// and rebind the next frame (`SPEC_FULL.md` §4.B).
pub struct ResourceArray {
    capacity: u32,
    buffer_dirty: bool,
}

impl ResourceArray {
    #[must_use]
    pub fn new(initial_capacity: u32) -> Self {
        Self {
            capacity: initial_capacity.max(1),
            buffer_dirty: true,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[must_use]
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.buffer_dirty)
    }

    /// Grows to at least `min_capacity` by doubling; no-op if already large
    /// enough.
    pub fn ensure_capacity(&mut self, min_capacity: u32) {
        while self.capacity < min_capacity {
            self.capacity *= 2;
            self.buffer_dirty = true;
        }
    }
}

/// A typed, type-erased-at-rest shader module. `T` marks which pipeline
/// stage (vertex/pixel/compute) it was compiled for at the call site; the
/// software backend doesn't execute shader code, so this only carries the
/// declared bindings used to build a `PipelineState`.
pub struct Shader<T> {
    pub bindings: Vec<BindingDecl>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Shader<T> {
    #[must_use]
    pub fn new(bindings: Vec<BindingDecl>) -> Self {
        Self {
            bindings,
            _marker: std::marker::PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_is_noop_when_already_at_target() {
        let desc = ImageDesc {
            format: PixelFormat::R8G8B8A8Unorm,
            width: 4,
            height: 4,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        let mut image = Image::new(desc);
        assert!(image.transition(ImageLayout::Read, 0, 1));
        assert!(!image.transition(ImageLayout::Read, 0, 1));
    }

    #[test]
    fn tlas_id_dirty_only_on_structural_change() {
        let mut tlas = Tlas::new();
        tlas.build();
        let id0 = tlas.id();
        tlas.update(&[0]);
        tlas.build();
        assert_eq!(tlas.id(), id0, "transform-only update must not rebuild");

        let mut blas_arena: crate::tracked::Tracked<Blas> = crate::tracked::Tracked::new(1);
        let blas_handle = blas_arena.create(Blas {
            vertex_buffer: ResourceId::default(),
            index_buffer: ResourceId::default(),
            triangle_count: 0,
        });
        tlas.set_blas(0, Some(blas_handle.id()));
        assert!(tlas.is_id_dirty());
        tlas.build();
        assert_ne!(tlas.id(), id0);
    }
}

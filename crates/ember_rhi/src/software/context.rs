//! `RhiContext`: the single entry point clients use to create resources
//! and record work (`SPEC_FULL.md` §4.A).

use rustc_hash::FxHashMap;

use crate::arena::ResourceId;
use crate::dynamic_buffer::{DynamicAllocation, DynamicRingAllocator};
use crate::error::{Result, RhiError};
use crate::flags::{ImageType, ImageUsage, ImageViewKey};
use crate::format::{ImageLayout, Transition};
use crate::resource::{
    Blas, Buffer, BufferDesc, ComputePass, Image, ImageDesc, ImageView, PipelineState, RenderPass,
    ResourceArray, Sampler, Shader, Timer, Tlas,
};
use crate::shader_resource::{BindingDecl, SamplerAttr};
use crate::tracked::{Handle, Tracked};

/// Which kind of pass is currently being recorded. Render and compute
/// passes are mutually exclusive; at most one is active at a time
/// (`SPEC_FULL.md` §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    None,
    Render,
    Compute,
}

/// A single recorded command, kept so tests (and, eventually, a hardware
/// backend's validation layer) can inspect exactly what a frame issued.
#[derive(Debug, Clone)]
pub enum Command {
    Draw {
        pso: ResourceId<PipelineState>,
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch {
        pso: ResourceId<PipelineState>,
        total_threads: [u32; 3],
        group_size: [u32; 3],
    },
}

type EndCallback = Box<dyn FnOnce() + Send>;

pub struct RhiContext {
    frames_in_flight: usize,
    frame_index: usize,
    total_frame: u64,
    pass_kind: PassKind,
    frame_open: bool,

    images: Tracked<Image>,
    image_views: Tracked<ImageView>,
    buffers: Tracked<Buffer>,
    samplers: Tracked<Sampler>,
    sampler_cache: FxHashMap<u64, ResourceId<Sampler>>,
    dummy_textures: FxHashMap<u64, ResourceId<Image>>,
    pipeline_states: Tracked<PipelineState>,
    render_passes: Tracked<RenderPass>,
    compute_passes: Tracked<ComputePass>,
    timers: Tracked<Timer>,
    tlas_arena: Tracked<Tlas>,
    blas_arena: Tracked<Blas>,
    resource_arrays: Tracked<ResourceArray>,

    dynamic_rings: FxHashMap<&'static str, DynamicRingAllocator>,

    end_of_render_callbacks: Vec<Vec<EndCallback>>,
    end_of_frame_callbacks: Vec<EndCallback>,

    commands: Vec<Command>,
    capture_frames_remaining: u32,
}

impl RhiContext {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        let frames_in_flight = frames_in_flight.max(1);
        Self {
            frames_in_flight,
            frame_index: 0,
            total_frame: 0,
            pass_kind: PassKind::None,
            frame_open: false,
            images: Tracked::new(frames_in_flight),
            image_views: Tracked::new(frames_in_flight),
            buffers: Tracked::new(frames_in_flight),
            samplers: Tracked::new(frames_in_flight),
            sampler_cache: FxHashMap::default(),
            dummy_textures: FxHashMap::default(),
            pipeline_states: Tracked::new(frames_in_flight),
            render_passes: Tracked::new(frames_in_flight),
            compute_passes: Tracked::new(frames_in_flight),
            timers: Tracked::new(frames_in_flight),
            tlas_arena: Tracked::new(frames_in_flight),
            blas_arena: Tracked::new(frames_in_flight),
            resource_arrays: Tracked::new(frames_in_flight),
            dynamic_rings: FxHashMap::default(),
            end_of_render_callbacks: vec![Vec::new(); frames_in_flight],
            end_of_frame_callbacks: Vec::new(),
            commands: Vec::new(),
            capture_frames_remaining: 0,
        }
    }

    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[must_use]
    pub fn total_frame(&self) -> u64 {
        self.total_frame
    }

    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    // -- frame lifecycle ----------------------------------------------

    /// Drains pending deletions for the current slot; runs queued
    /// end-of-render callbacks for the slot; resets the per-frame dynamic
    /// ring cursors (`SPEC_FULL.md` §4.A).
    pub fn begin_frame(&mut self) {
        let slot = self.frame_index;
        self.images.begin_frame(slot);
        self.image_views.begin_frame(slot);
        self.buffers.begin_frame(slot);
        self.samplers.begin_frame(slot);
        self.pipeline_states.begin_frame(slot);
        self.render_passes.begin_frame(slot);
        self.compute_passes.begin_frame(slot);
        self.timers.begin_frame(slot);
        self.tlas_arena.begin_frame(slot);
        self.blas_arena.begin_frame(slot);
        self.resource_arrays.begin_frame(slot);

        for cb in std::mem::take(&mut self.end_of_render_callbacks[slot]) {
            cb();
        }
        for ring in self.dynamic_rings.values_mut() {
            ring.begin_frame(slot);
        }
        self.frame_open = true;
    }

    /// Runs end-of-frame callbacks; advances `frame_index` modulo
    /// `frames_in_flight`; increments `total_frame`.
    pub fn end_frame(&mut self) {
        assert!(self.frame_open, "end_frame called without a matching begin_frame");
        assert_eq!(self.pass_kind, PassKind::None, "a pass is still open at end_frame");
        for cb in std::mem::take(&mut self.end_of_frame_callbacks) {
            cb();
        }
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight;
        self.total_frame += 1;
        self.frame_open = false;
        if self.capture_frames_remaining > 0 {
            self.capture_frames_remaining -= 1;
        }
    }

    pub fn queue_end_of_render_callback(&mut self, cb: impl FnOnce() + Send + 'static) {
        self.end_of_render_callbacks[self.frame_index].push(Box::new(cb));
    }

    pub fn queue_end_of_frame_callback(&mut self, cb: impl FnOnce() + Send + 'static) {
        self.end_of_frame_callbacks.push(Box::new(cb));
    }

    // -- passes ----------------------------------------------------------

    pub fn begin_render_pass(&mut self, _pass: ResourceId<RenderPass>) {
        assert!(
            self.frame_open,
            "submitting before begin_frame is fatal (SPEC_FULL.md section 4.A)"
        );
        assert_eq!(self.pass_kind, PassKind::None, "nesting render-in-compute is fatal");
        self.pass_kind = PassKind::Render;
    }

    pub fn end_render_pass(&mut self) {
        assert_eq!(self.pass_kind, PassKind::Render);
        self.pass_kind = PassKind::None;
    }

    pub fn begin_compute_pass(&mut self, _pass: ResourceId<ComputePass>) {
        assert!(self.frame_open, "submitting before begin_frame is fatal");
        assert_eq!(self.pass_kind, PassKind::None, "nesting compute-in-render is fatal");
        self.pass_kind = PassKind::Compute;
    }

    pub fn end_compute_pass(&mut self) {
        assert_eq!(self.pass_kind, PassKind::Compute);
        self.pass_kind = PassKind::None;
    }

    // -- draw / dispatch ---------------------------------------------------

    pub fn draw(&mut self, pso: &Handle<PipelineState>, vertex_count: u32, instance_count: u32) {
        assert_eq!(self.pass_kind, PassKind::Render, "draw outside a render pass is fatal");
        let state = self
            .pipeline_states
            .get_mut(pso)
            .expect("binding a destroyed PSO is fatal (id-based already-deleted assertion)");
        state.compile();
        self.commands.push(Command::Draw {
            pso: pso.id(),
            vertex_count,
            instance_count,
        });
    }

    pub fn dispatch(&mut self, pso: &Handle<PipelineState>, total_threads: [u32; 3], group_size: [u32; 3]) {
        assert_eq!(self.pass_kind, PassKind::Compute, "dispatch outside a compute pass is fatal");
        let state = self
            .pipeline_states
            .get_mut(pso)
            .expect("binding a destroyed PSO is fatal");
        state.compile();
        self.commands.push(Command::Dispatch {
            pso: pso.id(),
            total_threads,
            group_size,
        });
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    // -- resource creation -------------------------------------------------

    pub fn create_image(&mut self, desc: ImageDesc) -> Result<Handle<Image>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::ResourceCreation {
                kind: "Image",
                reason: "width/height must be non-zero".into(),
            });
        }
        Ok(self.images.create(Image::new(desc)))
    }

    pub fn create_buffer(&mut self, desc: BufferDesc) -> Result<Handle<Buffer>> {
        if desc.size == 0 {
            return Err(RhiError::ResourceCreation {
                kind: "Buffer",
                reason: "size must be non-zero".into(),
            });
        }
        Ok(self.buffers.create(Buffer::new(desc)))
    }

    /// Caches views per `(view_type, base_mip, mip_count, base_layer,
    /// layer_count)` on the owning image (`SPEC_FULL.md` §3): a repeated
    /// request for the same key returns the same id instead of creating a
    /// duplicate view.
    pub fn create_image_view(&mut self, image: &Handle<Image>, key: ImageViewKey) -> ResourceId<ImageView> {
        if let Some(cached) = self.images.get(image).and_then(|img| img.cached_view(key)) {
            return cached;
        }
        let image_id = image.id();
        let handle = self.image_views.create(ImageView { image: image_id, key });
        let id = handle.id();
        // Views are cached on the owning image for its whole lifetime, so
        // they are leaked here the same way samplers and dummy textures
        // are: the cache, not a `Handle`, is their owner.
        std::mem::forget(handle);
        if let Some(img) = self.images.get_mut(image) {
            img.cache_view(key, id);
        }
        id
    }

    /// Deduplicated by attribute hash (`SPEC_FULL.md` §4.A).
    pub fn create_sampler(&mut self, attr: SamplerAttr) -> ResourceId<Sampler> {
        let key = attr.hash_key();
        if let Some(existing) = self.sampler_cache.get(&key) {
            return *existing;
        }
        let handle = self.samplers.create(Sampler { attr });
        let id = handle.id();
        // The cache is the sampler's only owner; leaking the handle here is
        // intentional, mirroring the original's "reused whenever a binding
        // needs it" lifetime (samplers live for the context's lifetime).
        std::mem::forget(handle);
        self.sampler_cache.insert(key, id);
        id
    }

    /// Lazily creates (and memoizes) a 1x1 dummy texture keyed by a
    /// sampler attribute's shader-visible hash, used as a bindless
    /// placeholder wherever a binding needs one (`SPEC_FULL.md` §4.A, §4.B).
    pub fn get_or_create_dummy_texture(&mut self, attr: SamplerAttr) -> Result<ResourceId<Image>> {
        let key = attr.hash_key();
        if let Some(existing) = self.dummy_textures.get(&key) {
            return Ok(*existing);
        }
        let handle = self.create_image(ImageDesc {
            format: crate::format::PixelFormat::R8G8B8A8Unorm,
            width: 1,
            height: 1,
            mip_levels: 1,
            sampler_attr: attr,
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED,
            memory_properties: crate::flags::MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Read,
        })?;
        let id = handle.id();
        std::mem::forget(handle);
        self.dummy_textures.insert(key, id);
        Ok(id)
    }

    pub fn create_pipeline_state(&mut self, bindings: Vec<BindingDecl>) -> Handle<PipelineState> {
        self.pipeline_states.create(PipelineState::new(bindings))
    }

    pub fn create_render_target(&mut self, desc: ImageDesc) -> Result<Handle<Image>> {
        self.create_image(desc)
    }

    pub fn create_render_pass(&mut self, name: &'static str) -> Handle<RenderPass> {
        self.render_passes.create(RenderPass { name })
    }

    pub fn create_compute_pass(&mut self, name: &'static str) -> Handle<ComputePass> {
        self.compute_passes.create(ComputePass { name })
    }

    pub fn create_timer(&mut self) -> Handle<Timer> {
        self.timers.create(Timer::default())
    }

    pub fn create_tlas(&mut self) -> Handle<Tlas> {
        self.tlas_arena.create(Tlas::new())
    }

    pub fn create_blas(&mut self, vertex_buffer: ResourceId<Buffer>, index_buffer: ResourceId<Buffer>, triangle_count: u32) -> Handle<Blas> {
        self.blas_arena.create(Blas {
            vertex_buffer,
            index_buffer,
            triangle_count,
        })
    }

    pub fn create_resource_array(&mut self, initial_capacity: u32) -> Handle<ResourceArray> {
        self.resource_arrays.create(ResourceArray::new(initial_capacity))
    }

    pub fn create_shader<T>(&self, bindings: Vec<BindingDecl>) -> Shader<T> {
        Shader::new(bindings)
    }

    // -- transitions ---------------------------------------------------

    pub fn transition_image(&mut self, image: &Handle<Image>, t: Transition) -> bool {
        let img = self.images.get_mut(image).expect("transitioning a destroyed image is fatal");
        img.transition(t.target_layout, t.base_mip, t.mip_count.max(1))
    }

    // -- dynamic buffers -------------------------------------------------

    /// Bump-allocates inside `usage`'s ring for the current frame slot and
    /// writes `data` into it, returning the allocation so callers can bind
    /// `(buffer, offset)` per-draw (`SPEC_FULL.md` §4.A).
    pub fn upload_dynamic(&mut self, usage: &'static str, data: &[u8]) -> DynamicAllocation {
        let slot = self.frame_index;
        let ring = self
            .dynamic_rings
            .entry(usage)
            .or_insert_with(|| DynamicRingAllocator::new(self.frames_in_flight));
        let alloc = ring.allocate(slot, data.len());
        ring.write(alloc, data);
        alloc
    }

    #[must_use]
    pub fn read_dynamic(&self, usage: &'static str, alloc: DynamicAllocation) -> &[u8] {
        self.dynamic_rings
            .get(usage)
            .map(|ring| ring.read(alloc))
            .unwrap_or(&[])
    }

    // -- resolution --------------------------------------------------------

    #[must_use]
    pub fn image(&self, handle: &Handle<Image>) -> &Image {
        self.images.get(handle).expect("dangling image handle")
    }

    pub fn image_mut(&mut self, handle: &Handle<Image>) -> &mut Image {
        self.images.get_mut(handle).expect("dangling image handle")
    }

    #[must_use]
    pub fn buffer(&self, handle: &Handle<Buffer>) -> &Buffer {
        self.buffers.get(handle).expect("dangling buffer handle")
    }

    pub fn buffer_mut(&mut self, handle: &Handle<Buffer>) -> &mut Buffer {
        self.buffers.get_mut(handle).expect("dangling buffer handle")
    }

    #[must_use]
    pub fn tlas(&self, handle: &Handle<Tlas>) -> &Tlas {
        self.tlas_arena.get(handle).expect("dangling tlas handle")
    }

    pub fn tlas_mut(&mut self, handle: &Handle<Tlas>) -> &mut Tlas {
        self.tlas_arena.get_mut(handle).expect("dangling tlas handle")
    }

    #[must_use]
    pub fn pipeline_state(&self, handle: &Handle<PipelineState>) -> &PipelineState {
        self.pipeline_states.get(handle).expect("dangling pso handle")
    }

    #[must_use]
    pub fn resource_array(&self, handle: &Handle<ResourceArray>) -> &ResourceArray {
        self.resource_arrays.get(handle).expect("dangling resource array handle")
    }

    pub fn resource_array_mut(&mut self, handle: &Handle<ResourceArray>) -> &mut ResourceArray {
        self.resource_arrays.get_mut(handle).expect("dangling resource array handle")
    }

    #[must_use]
    pub fn blas(&self, handle: &Handle<Blas>) -> &Blas {
        self.blas_arena.get(handle).expect("dangling blas handle")
    }

    // -- platform events --------------------------------------------------

    pub fn recreate_surface(&mut self) {
        log::info!("RhiContext: recreate_surface (software backend no-op)");
    }

    pub fn recreate_swapchain(&mut self) {
        log::info!("RhiContext: recreate_swapchain (software backend no-op)");
    }

    /// Only the RenderThread may call this (`SPEC_FULL.md` §5): init,
    /// shutdown, and growing the material-parameter buffer.
    pub fn wait_for_device_idle(&self) {
        log::debug!("RhiContext: wait_for_device_idle (software backend is always idle)");
    }

    pub fn capture_next_frames(&mut self, n: u32) {
        self.capture_frames_remaining = n;
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture_frames_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{BufferUsage, MemoryProperties};

    fn test_image_desc() -> ImageDesc {
        ImageDesc {
            format: crate::format::PixelFormat::RgbaFloat16,
            width: 4,
            height: 4,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        }
    }

    #[test]
    fn zero_sized_image_is_a_creation_error() {
        let mut ctx = RhiContext::new(3);
        let mut desc = test_image_desc();
        desc.width = 0;
        assert!(ctx.create_image(desc).is_err());
    }

    #[test]
    fn samplers_dedupe_by_attribute_hash() {
        let mut ctx = RhiContext::new(3);
        let a = ctx.create_sampler(SamplerAttr::default());
        let b = ctx.create_sampler(SamplerAttr::default());
        assert_eq!(a, b);
    }

    #[test]
    fn begin_frame_without_pending_work_is_idempotent() {
        let mut ctx = RhiContext::new(2);
        for _ in 0..5 {
            ctx.begin_frame();
            ctx.end_frame();
        }
        assert_eq!(ctx.total_frame(), 5);
    }

    #[test]
    #[should_panic(expected = "nesting")]
    fn nesting_compute_in_render_is_fatal() {
        let mut ctx = RhiContext::new(2);
        ctx.begin_frame();
        let rp = ctx.create_render_pass("test");
        ctx.begin_render_pass(rp.id());
        let cp = ctx.create_compute_pass("test");
        ctx.begin_compute_pass(cp.id());
    }

    #[test]
    fn deferred_deletion_survives_across_the_ring() {
        let mut ctx = RhiContext::new(2);
        ctx.begin_frame();
        let desc = BufferDesc {
            size: 64,
            usage: BufferUsage::UNIFORM,
            memory_properties: MemoryProperties::HOST_VISIBLE,
            is_dynamic: false,
        };
        let handle = ctx.create_buffer(desc).unwrap();
        let id = handle.id();
        drop(handle);
        ctx.end_frame();

        ctx.begin_frame(); // slot 1, doesn't touch slot 0's bin
        assert!(ctx.buffers.contains(id));
        ctx.end_frame();

        ctx.begin_frame(); // slot 0 again, drains it
        assert!(!ctx.buffers.contains(id));
    }
}

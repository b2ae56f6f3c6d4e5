//! `MeshPass` and its three concrete specializations (`SPEC_FULL.md`
//! §4.E), modeled on the state-tracked draw-call shape of
//! `src/renderer/graph/pass.rs`'s `TrackedRenderPass` and the
//! prepass/opaque/forward split of `src/render/passes` /
//! `src/renderer/graph/passes/{prepass,opaque,forward}.rs`. Since this
//! crate's RHI never executes shader code, "compiles a pipeline" here
//! means declaring its binding interface and letting `PipelineState`
//! reflect `(set, slot)` locations, not generating real shader bytecode.

use ember_rhi::shader_resource::{BindingDecl, BindingKind};
use ember_rhi::tracked::Handle;
use ember_rhi::{RhiContext, Transition};

use crate::config::RenderConfig;
use crate::proxy::SceneRenderProxy;

/// Per-primitive GPU state a `MeshPass` keeps alive: just the compiled
/// pipeline state here, since vertex/index/attribute buffers and the
/// material id already live in the bindless table (`SPEC_FULL.md` §4.B)
/// and a mesh draw only needs to know which slot to index into.
pub struct MeshPassSlot {
    pub pso: Handle<ember_rhi::resource::PipelineState>,
}

/// Base behavior shared by `DepthPass`, `GBufferPass` and
/// `ForwardMeshPass`: a sparse per-primitive pipeline-state array indexed
/// by `primitive_index`.
///
/// A primitive's PSO only declares the generic bindless/TLAS binding
/// interface (every mesh draw reads the same bindless arrays and indexes
/// them by its own primitive id), so unlike a hardware backend that might
/// specialize a PSO per vertex layout, a slot here carries no
/// mesh-specific state. That means a `{Move from→to}` journal record is
/// indistinguishable from a fresh `{New}` at the destination slot, so
/// `sync_slots` resizes and rebuilds by length rather than replaying the
/// journal index-by-index: the externally observable behavior (one live
/// PSO per current primitive, by index) is identical.
pub struct MeshPass {
    slots: Vec<Option<MeshPassSlot>>,
    bindings: Vec<BindingDecl>,
}

impl MeshPass {
    #[must_use]
    pub fn new(bindings: Vec<BindingDecl>) -> Self {
        Self { slots: Vec::new(), bindings }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, primitive_index: usize) -> Option<&MeshPassSlot> {
        self.slots.get(primitive_index).and_then(Option::as_ref)
    }

    /// Grows/shrinks `slots` to `scene.primitive_count()`, dropping any
    /// now-unused tail slots (arming their `Handle`'s deferred deletion)
    /// and compiling a fresh PSO for every newly appeared index.
    pub fn sync_slots(&mut self, rhi: &mut RhiContext, scene: &SceneRenderProxy) {
        let target = scene.primitive_count();
        if target < self.slots.len() {
            self.slots.truncate(target);
        }
        while self.slots.len() < target {
            let pso = rhi.create_pipeline_state(self.bindings.clone());
            self.slots.push(Some(MeshPassSlot { pso }));
        }
    }
}

/// Depth-only pre-pass: same per-primitive PSO array as the base, used
/// ahead of `ForwardMeshPass` when `config.use_prepass` is set
/// (`SPEC_FULL.md` §4.E).
pub struct DepthPass {
    base: MeshPass,
    depth_target: Option<Handle<ember_rhi::resource::Image>>,
}

impl DepthPass {
    #[must_use]
    pub fn new() -> Self {
        let bindings = vec![BindingDecl {
            name: "object_transform",
            kind: BindingKind::UniformBuffer,
            is_bindless: false,
        }];
        Self {
            base: MeshPass::new(bindings),
            depth_target: None,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        let desc = ember_rhi::resource::ImageDesc {
            format: ember_rhi::PixelFormat::D32,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: ember_rhi::shader_resource::SamplerAttr::default(),
            image_type: ember_rhi::flags::ImageType::D2,
            usage: ember_rhi::flags::ImageUsage::DEPTH_ATTACHMENT,
            memory_properties: ember_rhi::flags::MemoryProperties::DEVICE_LOCAL,
            initial_layout: ember_rhi::ImageLayout::Undefined,
        };
        self.depth_target = rhi.create_render_target(desc).ok();
    }

    pub fn update_frame_data(&mut self, rhi: &mut RhiContext, scene: &SceneRenderProxy) {
        self.base.sync_slots(rhi, scene);
    }

    #[must_use]
    pub fn depth_target(&self) -> Option<&Handle<ember_rhi::resource::Image>> {
        self.depth_target.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let Some(target) = &self.depth_target else { return };
        rhi.transition_image(
            target,
            Transition {
                target_layout: ember_rhi::ImageLayout::DepthStencilOutput,
                after_stage: ember_rhi::PipelineStage::Top,
                before_stage: ember_rhi::PipelineStage::EarlyZ,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let pass = rhi.create_render_pass("depth");
        rhi.begin_render_pass(pass.id());
        for index in 0..self.base.slot_count() {
            let Some(slot) = self.base.slot(index) else { continue };
            rhi.draw(&slot.pso, 0, 1);
        }
        rhi.end_render_pass();
    }
}

impl Default for DepthPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque geometry pass writing a packed GBuffer consumed by
/// `DirectionalLightingPass` in the deferred renderer (`SPEC_FULL.md`
/// §4.E, §4.F).
pub struct GBufferPass {
    base: MeshPass,
    albedo_metallic: Option<Handle<ember_rhi::resource::Image>>,
    normal_roughness: Option<Handle<ember_rhi::resource::Image>>,
}

impl GBufferPass {
    #[must_use]
    pub fn new() -> Self {
        let bindings = vec![
            BindingDecl {
                name: "object_transform",
                kind: BindingKind::UniformBuffer,
                is_bindless: false,
            },
            BindingDecl {
                name: "bindless_textures",
                kind: BindingKind::BindlessArray,
                is_bindless: true,
            },
        ];
        Self {
            base: MeshPass::new(bindings),
            albedo_metallic: None,
            normal_roughness: None,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        let mut desc = ember_rhi::resource::ImageDesc {
            format: ember_rhi::PixelFormat::R8G8B8A8Unorm,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: ember_rhi::shader_resource::SamplerAttr::default(),
            image_type: ember_rhi::flags::ImageType::D2,
            usage: ember_rhi::flags::ImageUsage::COLOR_ATTACHMENT,
            memory_properties: ember_rhi::flags::MemoryProperties::DEVICE_LOCAL,
            initial_layout: ember_rhi::ImageLayout::Undefined,
        };
        self.albedo_metallic = rhi.create_render_target(desc.clone()).ok();
        desc.format = ember_rhi::PixelFormat::RgbaFloat16;
        self.normal_roughness = rhi.create_render_target(desc).ok();
    }

    pub fn update_frame_data(&mut self, rhi: &mut RhiContext, scene: &SceneRenderProxy) {
        self.base.sync_slots(rhi, scene);
    }

    #[must_use]
    pub fn albedo_metallic(&self) -> Option<&Handle<ember_rhi::resource::Image>> {
        self.albedo_metallic.as_ref()
    }

    #[must_use]
    pub fn normal_roughness(&self) -> Option<&Handle<ember_rhi::resource::Image>> {
        self.normal_roughness.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let (Some(albedo), Some(normal)) = (&self.albedo_metallic, &self.normal_roughness) else { return };
        for target in [albedo, normal] {
            rhi.transition_image(
                target,
                Transition {
                    target_layout: ember_rhi::ImageLayout::ColorOutput,
                    after_stage: ember_rhi::PipelineStage::Top,
                    before_stage: ember_rhi::PipelineStage::ColorOutput,
                    base_mip: 0,
                    mip_count: 1,
                },
            );
        }
        let pass = rhi.create_render_pass("gbuffer");
        rhi.begin_render_pass(pass.id());
        for index in 0..self.base.slot_count() {
            let Some(slot) = self.base.slot(index) else { continue };
            rhi.draw(&slot.pso, 0, 1);
        }
        rhi.end_render_pass();
    }
}

impl Default for GBufferPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward-shaded opaque/transparent pass (`SPEC_FULL.md` §4.E): two
/// pixel-shader variants selected once per `ForwardMeshPass` (classic
/// PBR vs an RT-augmented PBR reading the scene TLAS and bindless
/// arrays), not per draw, since switching mid-pass would thrash the PSO
/// cache for no benefit — every primitive in one renderer tick uses the
/// same renderer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardVariant {
    ClassicPbr,
    RayTracedPbr,
}

pub struct ForwardMeshPass {
    base: MeshPass,
    variant: ForwardVariant,
    /// `Equal` depth-test with depth-write off when a `DepthPass`
    /// pre-pass ran this frame; `LessEqual` with depth-write on
    /// otherwise (`SPEC_FULL.md` §4.E).
    use_prepass: bool,
    color_target: Option<Handle<ember_rhi::resource::Image>>,
}

impl ForwardMeshPass {
    #[must_use]
    pub fn new(variant: ForwardVariant) -> Self {
        let mut bindings = vec![
            BindingDecl {
                name: "object_transform",
                kind: BindingKind::UniformBuffer,
                is_bindless: false,
            },
            BindingDecl {
                name: "bindless_textures",
                kind: BindingKind::BindlessArray,
                is_bindless: true,
            },
        ];
        if variant == ForwardVariant::RayTracedPbr {
            bindings.push(BindingDecl {
                name: "scene_tlas",
                kind: BindingKind::Tlas,
                is_bindless: false,
            });
        }
        Self {
            base: MeshPass::new(bindings),
            variant,
            use_prepass: false,
            color_target: None,
        }
    }

    #[must_use]
    pub fn variant(&self) -> ForwardVariant {
        self.variant
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.use_prepass = config.use_prepass;
        let desc = ember_rhi::resource::ImageDesc {
            format: ember_rhi::PixelFormat::RgbaFloat,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: ember_rhi::shader_resource::SamplerAttr::default(),
            image_type: ember_rhi::flags::ImageType::D2,
            usage: ember_rhi::flags::ImageUsage::COLOR_ATTACHMENT,
            memory_properties: ember_rhi::flags::MemoryProperties::DEVICE_LOCAL,
            initial_layout: ember_rhi::ImageLayout::Undefined,
        };
        self.color_target = rhi.create_render_target(desc).ok();
    }

    pub fn update_frame_data(&mut self, rhi: &mut RhiContext, scene: &SceneRenderProxy, config: &RenderConfig) {
        self.use_prepass = config.use_prepass;
        self.base.sync_slots(rhi, scene);
    }

    #[must_use]
    pub fn color_target(&self) -> Option<&Handle<ember_rhi::resource::Image>> {
        self.color_target.as_ref()
    }

    /// No-op on a journaled primitive update: bindless slot rebinding is
    /// handled entirely by `BindlessTable::update_frame_data`, and this
    /// pass's PSOs carry no per-primitive specialization to refresh
    /// (`SPEC_FULL.md` §9).
    pub fn handle_updated_primitive(&mut self, _primitive_index: usize) {}

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let Some(target) = &self.color_target else { return };
        rhi.transition_image(
            target,
            Transition {
                target_layout: ember_rhi::ImageLayout::ColorOutput,
                after_stage: ember_rhi::PipelineStage::Top,
                before_stage: ember_rhi::PipelineStage::ColorOutput,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let pass = rhi.create_render_pass(if self.use_prepass { "forward-equal-z" } else { "forward" });
        rhi.begin_render_pass(pass.id());
        for index in 0..self.base.slot_count() {
            let Some(slot) = self.base.slot(index) else { continue };
            rhi.draw(&slot.pso, 0, 1);
        }
        rhi.end_render_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::SceneRenderProxy;
    use ember_scene::{ComponentKind, Scene};

    fn ctx() -> RhiContext {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        rhi
    }

    #[test]
    fn sync_slots_tracks_primitive_count() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let node = scene.create_node("sphere");
        let material = scene.create_material(ember_scene::MaterialResource::new("m"), ember_scene::MaterialVariant::Pbr);
        scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        scene.update_dirty_transform();

        let config = RenderConfig::default();
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        let mut depth = DepthPass::new();
        depth.update_frame_data(&mut rhi, &proxy);
        assert_eq!(depth.base.slot_count(), 1);
        assert!(depth.base.slot(0).is_some());
    }

    #[test]
    fn forward_pass_selects_requested_variant() {
        let pass = ForwardMeshPass::new(ForwardVariant::RayTracedPbr);
        assert_eq!(pass.variant(), ForwardVariant::RayTracedPbr);
    }
}

//! Post-processing and presentation passes (`SPEC_FULL.md` §4.E), modeled
//! on the ping-pong blur and fullscreen-triangle shapes of
//! `src/render/passes/{blur,tonemap,present}.rs`.

use glam::Mat2;

use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
use ember_rhi::resource::{Buffer, BufferDesc, Image, ImageDesc, PipelineState};
use ember_rhi::shader_resource::{BindingDecl, BindingKind, SamplerAttr};
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, PixelFormat, RhiContext, Transition};

use crate::config::RenderConfig;

/// Separable blur over a ping-pong pair of scratch targets: `INPUT` is
/// read-only, `PING`/`PONG` alternate as each direction's source/destination
/// so an arbitrary number of passes never needs a third allocation.
pub struct BlurPass {
    pso: Option<Handle<PipelineState>>,
    ping: Option<Handle<Image>>,
    pong: Option<Handle<Image>>,
}

impl BlurPass {
    #[must_use]
    pub fn new() -> Self {
        Self { pso: None, ping: None, pong: None }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.pso = Some(rhi.create_pipeline_state(vec![
            BindingDecl { name: "blur_source", kind: BindingKind::SampledImage, is_bindless: false },
        ]));
        let desc = ImageDesc {
            format: PixelFormat::RgbaFloat,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        self.ping = rhi.create_render_target(desc.clone()).ok();
        self.pong = rhi.create_render_target(desc).ok();
    }

    /// Runs `iterations` alternating horizontal/vertical passes starting
    /// from `input`, returning whichever scratch target holds the final
    /// result.
    pub fn render(&mut self, rhi: &mut RhiContext, input: &Handle<Image>, iterations: u32) -> Option<&Handle<Image>> {
        let pso = self.pso.as_ref()?;
        if iterations == 0 {
            return Some(input);
        }

        let mut source = input;
        let mut using_ping = true;
        for _ in 0..iterations {
            let dest = if using_ping { self.ping.as_ref()? } else { self.pong.as_ref()? };
            rhi.transition_image(
                dest,
                Transition {
                    target_layout: ImageLayout::ColorOutput,
                    after_stage: PipelineStage::Top,
                    before_stage: PipelineStage::ColorOutput,
                    base_mip: 0,
                    mip_count: 1,
                },
            );
            let pass = rhi.create_render_pass("blur");
            rhi.begin_render_pass(pass.id());
            rhi.draw(pso, 3, 1);
            rhi.end_render_pass();

            source = dest;
            using_ping = !using_ping;
        }
        Some(source)
    }
}

impl Default for BlurPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Fills a render target with a flat color; used to clear the gbuffer,
/// shadow map, and any scratch target ahead of the pass that writes it.
pub struct ClearTexturePass {
    pso: Option<Handle<PipelineState>>,
}

impl ClearTexturePass {
    #[must_use]
    pub fn new() -> Self {
        Self { pso: None }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext) {
        self.pso = Some(rhi.create_pipeline_state(Vec::new()));
    }

    pub fn render(&mut self, rhi: &mut RhiContext, target: &Handle<Image>) {
        let Some(pso) = &self.pso else { return };
        rhi.transition_image(
            target,
            Transition {
                target_layout: ImageLayout::ColorOutput,
                after_stage: PipelineStage::Top,
                before_stage: PipelineStage::ColorOutput,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let pass = rhi.create_render_pass("clear-texture");
        rhi.begin_render_pass(pass.id());
        rhi.draw(pso, 3, 1);
        rhi.end_render_pass();
    }
}

impl Default for ClearTexturePass {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared fullscreen-quad geometry plus a 2x2 pre-rotation matrix applied
/// ahead of the vertex transform, for mobile swapchains that present in a
/// physically-rotated orientation without an extra composite
/// (`SPEC_FULL.md` §4.E). Every pass that draws a fullscreen triangle
/// (`ToneMappingPass`, `SkyBoxPass`, `DirectionalLightingPass`, `BlurPass`)
/// could route through this, but each currently declares its own PSO since
/// their binding interfaces differ; this centralizes just the geometry.
pub struct ScreenQuadPass {
    pso: Option<Handle<PipelineState>>,
    vertex_buffer: Option<Handle<Buffer>>,
    pre_rotation: Mat2,
}

impl ScreenQuadPass {
    #[must_use]
    pub fn new() -> Self {
        Self { pso: None, vertex_buffer: None, pre_rotation: Mat2::IDENTITY }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext) {
        self.pso = Some(rhi.create_pipeline_state(vec![
            BindingDecl { name: "screen_quad_source", kind: BindingKind::SampledImage, is_bindless: false },
        ]));
        // Two full-screen triangles' worth of clip-space positions; a
        // fullscreen triangle only needs 3 vertices but the reference
        // engine's shared quad buffer carries the (x, y) pairs for 4
        // corners plus the doubled diagonal.
        const QUAD: [f32; 12] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0];
        let desc = BufferDesc {
            size: std::mem::size_of_val(&QUAD),
            usage: ember_rhi::flags::BufferUsage::VERTEX,
            memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            is_dynamic: false,
        };
        if let Ok(buffer) = rhi.create_buffer(desc) {
            rhi.buffer_mut(&buffer).write(0, bytemuck::cast_slice(&QUAD));
            self.vertex_buffer = Some(buffer);
        }
    }

    /// Sets the 90/180/270-degree rotation applied to the quad's clip-space
    /// positions; `rotation_degrees` other than a multiple of 90 rounds to
    /// the nearest supported orientation.
    pub fn set_pre_rotation(&mut self, rotation_degrees: f32) {
        let quarter_turns = (rotation_degrees / 90.0).round() as i32;
        let radians = (quarter_turns.rem_euclid(4) as f32) * std::f32::consts::FRAC_PI_2;
        self.pre_rotation = Mat2::from_angle(radians);
    }

    #[must_use]
    pub fn pre_rotation(&self) -> Mat2 {
        self.pre_rotation
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let Some(pso) = &self.pso else { return };
        rhi.draw(pso, 6, 1);
    }
}

impl Default for ScreenQuadPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps accumulated HDR radiance into display-referred color
/// (`SPEC_FULL.md` §4.E, §4.H `OUTPUT_LIMIT` clamp already applied
/// upstream by the path tracer; this pass additionally exposes the camera's
/// `exposure` scale and an optional debug-mode override).
pub struct ToneMappingPass {
    pso: Option<Handle<PipelineState>>,
    output_target: Option<Handle<Image>>,
}

impl ToneMappingPass {
    #[must_use]
    pub fn new() -> Self {
        Self { pso: None, output_target: None }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.pso = Some(rhi.create_pipeline_state(vec![
            BindingDecl { name: "hdr_source", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "exposure", kind: BindingKind::UniformBuffer, is_bindless: false },
        ]));
        let desc = ImageDesc {
            format: PixelFormat::R8G8B8A8Unorm,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::COLOR_ATTACHMENT,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        self.output_target = rhi.create_render_target(desc).ok();
    }

    #[must_use]
    pub fn output_target(&self) -> Option<&Handle<Image>> {
        self.output_target.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext, _exposure: f32) {
        let (Some(pso), Some(target)) = (&self.pso, &self.output_target) else { return };
        rhi.transition_image(
            target,
            Transition {
                target_layout: ImageLayout::ColorOutput,
                after_stage: PipelineStage::Top,
                before_stage: PipelineStage::ColorOutput,
                base_mip: 0,
                mip_count: 1,
            },
        );
        let pass = rhi.create_render_pass("tonemap");
        rhi.begin_render_pass(pass.id());
        rhi.draw(pso, 3, 1);
        rhi.end_render_pass();
    }
}

impl Default for ToneMappingPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract point for an embedding application's immediate-mode UI
/// (`SPEC_FULL.md` §1 Non-goals: UI widgets themselves are out of scope).
/// `render` is a no-op unless a caller installs a draw callback; the
/// renderer always calls it in the right place in the frame so a host that
/// does supply one gets correct ordering for free.
pub struct UiPass {
    draw_callback: Option<Box<dyn FnMut(&mut RhiContext) + Send>>,
}

impl UiPass {
    #[must_use]
    pub fn new() -> Self {
        Self { draw_callback: None }
    }

    pub fn set_draw_callback(&mut self, callback: impl FnMut(&mut RhiContext) + Send + 'static) {
        self.draw_callback = Some(Box::new(callback));
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        if let Some(callback) = &mut self.draw_callback {
            callback(rhi);
        }
    }
}

impl Default for UiPass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RhiContext {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        rhi
    }

    #[test]
    fn blur_pass_alternates_ping_and_pong_targets() {
        let mut rhi = ctx();
        let config = RenderConfig { image_width: 4, image_height: 4, ..RenderConfig::default() };
        let mut pass = BlurPass::new();
        pass.init_render_resources(&mut rhi, &config);

        let input_desc = ImageDesc {
            format: PixelFormat::RgbaFloat,
            width: 4,
            height: 4,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        let input = rhi.create_render_target(input_desc).unwrap();

        let result = pass.render(&mut rhi, &input, 2).map(Handle::id);
        assert!(result.is_some());
    }

    #[test]
    fn screen_quad_pre_rotation_rounds_to_nearest_quarter_turn() {
        let mut pass = ScreenQuadPass::new();
        pass.set_pre_rotation(95.0);
        let rotated = pass.pre_rotation() * glam::Vec2::X;
        assert!((rotated - glam::Vec2::Y).length() < 1e-4);
    }

    #[test]
    fn ui_pass_render_is_a_no_op_without_a_callback() {
        let mut rhi = ctx();
        let mut pass = UiPass::new();
        pass.render(&mut rhi);
    }
}

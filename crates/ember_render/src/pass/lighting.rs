//! Deferred lighting and sky passes (`SPEC_FULL.md` §4.E), modeled on the
//! screen-space resolve shape of `src/render/passes/lighting.rs` and the
//! fullscreen-quad style of `src/render/passes/skybox.rs`.

use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
use ember_rhi::resource::{Image, ImageDesc, PipelineState};
use ember_rhi::shader_resource::{BindingDecl, BindingKind, SamplerAttr};
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, PixelFormat, RhiContext, Transition};

use crate::config::RenderConfig;

/// Screen-space PBR resolve: reads the packed gbuffer, depth, shadow map,
/// and optional IBL maps, writes into the same `RgbaFloat` color target the
/// forward pipeline writes directly (`SPEC_FULL.md` §4.E, §4.F).
pub struct DirectionalLightingPass {
    pso: Option<Handle<PipelineState>>,
    color_target: Option<Handle<Image>>,
    use_diffuse_ibl: bool,
    use_specular_ibl: bool,
}

impl DirectionalLightingPass {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pso: None,
            color_target: None,
            use_diffuse_ibl: true,
            use_specular_ibl: true,
        }
    }

    fn bindings(use_diffuse_ibl: bool, use_specular_ibl: bool) -> Vec<BindingDecl> {
        let mut bindings = vec![
            BindingDecl { name: "gbuffer_albedo_metallic", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "gbuffer_normal_roughness", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "depth", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "shadow_map", kind: BindingKind::SampledImage, is_bindless: false },
            BindingDecl { name: "directional_light", kind: BindingKind::UniformBuffer, is_bindless: false },
        ];
        if use_diffuse_ibl {
            bindings.push(BindingDecl { name: "diffuse_irradiance", kind: BindingKind::SampledImage, is_bindless: false });
        }
        if use_specular_ibl {
            bindings.push(BindingDecl { name: "specular_prefilter", kind: BindingKind::SampledImage, is_bindless: false });
            bindings.push(BindingDecl { name: "brdf_lut", kind: BindingKind::SampledImage, is_bindless: false });
        }
        bindings
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.use_diffuse_ibl = config.use_diffuse_ibl;
        self.use_specular_ibl = config.use_specular_ibl;
        self.pso = Some(rhi.create_pipeline_state(Self::bindings(self.use_diffuse_ibl, self.use_specular_ibl)));
        let desc = ImageDesc {
            format: PixelFormat::RgbaFloat,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::COLOR_ATTACHMENT,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
            initial_layout: ImageLayout::Undefined,
        };
        self.color_target = rhi.create_render_target(desc).ok();
    }

    /// Recompiles the pipeline state iff an IBL toggle changed since init,
    /// since that changes the binding interface itself.
    pub fn update_frame_data(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        if config.use_diffuse_ibl != self.use_diffuse_ibl || config.use_specular_ibl != self.use_specular_ibl {
            self.use_diffuse_ibl = config.use_diffuse_ibl;
            self.use_specular_ibl = config.use_specular_ibl;
            self.pso = Some(rhi.create_pipeline_state(Self::bindings(self.use_diffuse_ibl, self.use_specular_ibl)));
        }
    }

    #[must_use]
    pub fn color_target(&self) -> Option<&Handle<Image>> {
        self.color_target.as_ref()
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let (Some(pso), Some(target)) = (&self.pso, &self.color_target) else { return };
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
        let pass = rhi.create_render_pass("directional-lighting");
        rhi.begin_render_pass(pass.id());
        rhi.draw(pso, 3, 1);
        rhi.end_render_pass();
    }
}

impl Default for DirectionalLightingPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a cube environment map (or, absent one, a procedural gradient) into
/// the background of whatever pixels the opaque passes left untouched.
/// `LessEqual` depth test, depth-write off (`SPEC_FULL.md` §4.E).
pub struct SkyBoxPass {
    pso: Option<Handle<PipelineState>>,
    has_cube_map: bool,
}

impl SkyBoxPass {
    #[must_use]
    pub fn new() -> Self {
        Self { pso: None, has_cube_map: false }
    }

    fn bindings(has_cube_map: bool) -> Vec<BindingDecl> {
        if has_cube_map {
            vec![BindingDecl { name: "sky_cube_map", kind: BindingKind::SampledImage, is_bindless: false }]
        } else {
            vec![BindingDecl { name: "sky_uniform", kind: BindingKind::UniformBuffer, is_bindless: false }]
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, has_cube_map: bool) {
        self.has_cube_map = has_cube_map;
        self.pso = Some(rhi.create_pipeline_state(Self::bindings(has_cube_map)));
    }

    /// A sky's env map is set/cleared at most a handful of times per scene
    /// lifetime (not per-frame), so recompiling the PSO on the rare change
    /// is cheaper than always declaring both binding interfaces.
    pub fn update_frame_data(&mut self, rhi: &mut RhiContext, has_cube_map: bool) {
        if has_cube_map != self.has_cube_map {
            self.has_cube_map = has_cube_map;
            self.pso = Some(rhi.create_pipeline_state(Self::bindings(has_cube_map)));
        }
    }

    pub fn render(&mut self, rhi: &mut RhiContext) {
        let Some(pso) = &self.pso else { return };
        let pass = rhi.create_render_pass("skybox");
        rhi.begin_render_pass(pass.id());
        rhi.draw(pso, 3, 1);
        rhi.end_render_pass();
    }
}

impl Default for SkyBoxPass {
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
    fn lighting_pass_recompiles_when_ibl_toggles_change() {
        let mut rhi = ctx();
        let mut pass = DirectionalLightingPass::new();
        let mut config = RenderConfig { use_diffuse_ibl: true, use_specular_ibl: true, ..RenderConfig::default() };
        pass.init_render_resources(&mut rhi, &config);
        let first = pass.pso.as_ref().map(Handle::id);

        config.use_diffuse_ibl = false;
        pass.update_frame_data(&mut rhi, &config);
        let second = pass.pso.as_ref().map(Handle::id);
        assert_ne!(first, second);
    }

    #[test]
    fn skybox_pass_switches_binding_interface_on_cube_map_change() {
        let mut rhi = ctx();
        let mut pass = SkyBoxPass::new();
        pass.init_render_resources(&mut rhi, false);
        let first = pass.pso.as_ref().map(Handle::id);

        pass.update_frame_data(&mut rhi, true);
        let second = pass.pso.as_ref().map(Handle::id);
        assert_ne!(first, second);
    }
}

//! `DeferredRenderer` (`SPEC_FULL.md` §4.F): shadow depth → gbuffer →
//! directional lighting resolve → skybox → tone map → optional debug →
//! optional UI → present.

use ember_rhi::RhiContext;
use ember_scene::Scene;

use crate::config::{DebugMode, RenderConfig};
use crate::pass::{DepthPass, DirectionalLightingPass, GBufferPass, ScreenQuadPass, SkyBoxPass, ToneMappingPass, UiPass};
use crate::proxy::SceneRenderProxy;
use crate::renderer::screenshot::{readback_rgba8, ScreenshotRequest};

pub struct DeferredRenderer {
    scene_proxy: SceneRenderProxy,
    shadow_depth: DepthPass,
    gbuffer: GBufferPass,
    lighting: DirectionalLightingPass,
    sky_box: SkyBoxPass,
    tone_map: ToneMappingPass,
    screen_quad: ScreenQuadPass,
    pub ui: UiPass,
    pending_screenshot: Option<ScreenshotRequest>,
}

impl DeferredRenderer {
    #[must_use]
    pub fn new(rhi: &mut RhiContext) -> Self {
        Self {
            scene_proxy: SceneRenderProxy::new(rhi),
            shadow_depth: DepthPass::new(),
            gbuffer: GBufferPass::new(),
            lighting: DirectionalLightingPass::new(),
            sky_box: SkyBoxPass::new(),
            tone_map: ToneMappingPass::new(),
            screen_quad: ScreenQuadPass::new(),
            ui: UiPass::new(),
            pending_screenshot: None,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        let shadow_config = RenderConfig { image_width: config.shadow_map_resolution, image_height: config.shadow_map_resolution, ..config.clone() };
        self.shadow_depth.init_render_resources(rhi, &shadow_config);
        self.gbuffer.init_render_resources(rhi, config);
        self.lighting.init_render_resources(rhi, config);
        self.sky_box.init_render_resources(rhi, false);
        self.tone_map.init_render_resources(rhi, config);
        self.screen_quad.init_render_resources(rhi);
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.pending_screenshot = Some(request);
    }

    pub fn tick(&mut self, rhi: &mut RhiContext, scene: &mut Scene, config: &RenderConfig) {
        self.scene_proxy.update(rhi, scene, config);
        self.update(rhi, config);
        self.scene_proxy.end_update(scene);

        rhi.begin_frame();
        self.render(rhi, config);
        rhi.end_frame();
    }

    fn update(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.shadow_depth.update_frame_data(rhi, &self.scene_proxy);
        self.gbuffer.update_frame_data(rhi, &self.scene_proxy);
        self.lighting.update_frame_data(rhi, config);

        let has_cube_map = self.scene_proxy.sky().is_some_and(|s| s.env_map.is_some());
        self.sky_box.update_frame_data(rhi, has_cube_map);
    }

    fn render(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.shadow_depth.render(rhi);
        self.gbuffer.render(rhi);
        self.lighting.render(rhi);

        if self.scene_proxy.sky().is_some() {
            self.sky_box.render(rhi);
        }

        self.tone_map.render(rhi, self.scene_proxy.camera().map_or(1.0, |c| c.exposure));

        let debug_target = match config.debug_mode {
            DebugMode::Depth => self.shadow_depth.depth_target(),
            DebugMode::Albedo => self.gbuffer.albedo_metallic(),
            DebugMode::WorldNormal => self.gbuffer.normal_roughness(),
            DebugMode::None | DebugMode::PrimitiveId => None,
        };
        let present_source = debug_target.or_else(|| self.tone_map.output_target());

        self.screen_quad.render(rhi);
        self.ui.render(rhi);

        if let (Some(request), Some(texture)) = (self.pending_screenshot.take(), present_source) {
            let bytes = readback_rgba8(rhi, texture);
            request.complete(Ok(bytes));
        }
    }

    #[must_use]
    pub fn scene_proxy(&self) -> &SceneRenderProxy {
        &self.scene_proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::{CameraState, ComponentKind};

    #[test]
    fn tick_runs_a_full_frame_without_panicking() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 8, image_height: 8, shadow_map_resolution: 8, ..RenderConfig::default() };
        let mut renderer = DeferredRenderer::new(&mut rhi);
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        let material = scene.create_material(ember_scene::MaterialResource::new("m"), ember_scene::MaterialVariant::Pbr);
        let sphere_node = scene.create_node("sphere");
        scene.add_component(sphere_node, ComponentKind::Sphere { radius: 1.0, material });
        scene.update_dirty_transform();

        renderer.tick(&mut rhi, &mut scene, &config);
        assert_eq!(renderer.scene_proxy().primitive_count(), 1);
    }

    #[test]
    fn debug_mode_swaps_the_presented_target_without_panicking() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 4, image_height: 4, shadow_map_resolution: 4, debug_mode: DebugMode::Albedo, ..RenderConfig::default() };
        let mut renderer = DeferredRenderer::new(&mut rhi);
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        scene.update_dirty_transform();

        renderer.tick(&mut rhi, &mut scene, &config);
    }
}

//! `ForwardRenderer` (`SPEC_FULL.md` §4.F): shadow depth → optional depth
//! pre-pass → forward mesh pass → optional skybox → tone map → optional
//! debug swap → optional UI → present. IBL cooking runs a few steps every
//! frame alongside the rest of the pipeline rather than blocking on it,
//! synchronized across frames the way `ibl::adaptive_step_budget` is
//! documented to be used.

use ember_rhi::RhiContext;
use ember_scene::Scene;

use crate::config::{DebugMode, RenderConfig};
use crate::pass::{
    adaptive_step_budget, BrdfLutPass, DepthPass, DiffuseIblPass, ForwardMeshPass, ForwardVariant, ScreenQuadPass, SkyBoxPass, SpecularIblPass,
    ToneMappingPass, UiPass,
};
use crate::proxy::SceneRenderProxy;
use crate::renderer::screenshot::{readback_rgba8, ScreenshotRequest};

/// The environment map this renderer has IBL cookers built for; `None`
/// until the scene's sky first reports one, so a scene with no sky never
/// allocates cooking targets at all.
struct IblState {
    env_name: String,
    brdf: BrdfLutPass,
    diffuse: DiffuseIblPass,
    specular: SpecularIblPass,
}

pub struct ForwardRenderer {
    scene_proxy: SceneRenderProxy,
    shadow_depth: DepthPass,
    depth_prepass: DepthPass,
    mesh_pass: ForwardMeshPass,
    sky_box: SkyBoxPass,
    tone_map: ToneMappingPass,
    screen_quad: ScreenQuadPass,
    pub ui: UiPass,
    ibl: Option<IblState>,
    last_frame_time: f32,
    pending_screenshot: Option<ScreenshotRequest>,
}

impl ForwardRenderer {
    #[must_use]
    pub fn new(rhi: &mut RhiContext, variant: ForwardVariant) -> Self {
        Self {
            scene_proxy: SceneRenderProxy::new(rhi),
            shadow_depth: DepthPass::new(),
            depth_prepass: DepthPass::new(),
            mesh_pass: ForwardMeshPass::new(variant),
            sky_box: SkyBoxPass::new(),
            tone_map: ToneMappingPass::new(),
            screen_quad: ScreenQuadPass::new(),
            ui: UiPass::new(),
            ibl: None,
            last_frame_time: 0.0,
            pending_screenshot: None,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        let shadow_config = RenderConfig { image_width: config.shadow_map_resolution, image_height: config.shadow_map_resolution, ..config.clone() };
        self.shadow_depth.init_render_resources(rhi, &shadow_config);
        self.depth_prepass.init_render_resources(rhi, config);
        self.mesh_pass.init_render_resources(rhi, config);
        self.sky_box.init_render_resources(rhi, false);
        self.tone_map.init_render_resources(rhi, config);
        self.screen_quad.init_render_resources(rhi);
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.pending_screenshot = Some(request);
    }

    pub fn tick(&mut self, rhi: &mut RhiContext, scene: &mut Scene, config: &RenderConfig, frame_time_seconds: f32) {
        self.scene_proxy.update(rhi, scene, config);
        self.update(rhi, config);
        self.scene_proxy.end_update(scene);

        rhi.begin_frame();
        self.render(rhi, config);
        rhi.end_frame();
        self.last_frame_time = frame_time_seconds;
    }

    fn update(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.mesh_pass.update_frame_data(rhi, &self.scene_proxy, config);
        if config.use_prepass {
            self.depth_prepass.update_frame_data(rhi, &self.scene_proxy);
        }
        self.shadow_depth.update_frame_data(rhi, &self.scene_proxy);

        let has_cube_map = self.scene_proxy.sky().is_some_and(|s| s.env_map.is_some());
        self.sky_box.update_frame_data(rhi, has_cube_map);

        self.sync_ibl(rhi, config);
    }

    /// (Re)builds the IBL cookers for the scene's current sky environment
    /// and steps whichever of them hasn't converged yet, budgeted off how
    /// much headroom the last frame left (`SPEC_FULL.md` §4.E).
    fn sync_ibl(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        if !config.use_diffuse_ibl && !config.use_specular_ibl {
            return;
        }
        let Some(env_name) = self.scene_proxy.sky().and_then(|s| s.env_map).map(|_| "scene_sky".to_string()) else {
            self.ibl = None;
            return;
        };

        let needs_rebuild = match &self.ibl {
            Some(state) => state.env_name != env_name,
            None => true,
        };
        if needs_rebuild {
            let mut brdf = BrdfLutPass::new(256);
            brdf.init_render_resources(rhi);
            let mut diffuse = DiffuseIblPass::new(env_name.clone(), 32);
            diffuse.init_render_resources(rhi);
            let mut specular = SpecularIblPass::new(env_name.clone(), 128);
            specular.init_render_resources(rhi);
            self.ibl = Some(IblState { env_name, brdf, diffuse, specular });
        }

        let target_frame_time = 1.0 / config.target_framerate.max(1.0);
        let step_budget = adaptive_step_budget(self.last_frame_time / target_frame_time);
        if let Some(ibl) = &mut self.ibl {
            if !ibl.brdf.state().is_converged() {
                ibl.brdf.render(rhi, step_budget);
            }
            if config.use_diffuse_ibl && !ibl.diffuse.state().is_converged() {
                ibl.diffuse.render(rhi, step_budget);
            }
            if config.use_specular_ibl && !ibl.specular.state().is_converged() {
                ibl.specular.render(rhi, step_budget);
            }
        }
    }

    fn render(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.shadow_depth.render(rhi);
        if config.use_prepass {
            self.depth_prepass.render(rhi);
        }
        self.mesh_pass.render(rhi);

        if self.scene_proxy.sky().is_some() {
            self.sky_box.render(rhi);
        }

        self.tone_map.render(rhi, self.scene_proxy.camera().map_or(1.0, |c| c.exposure));

        let debug_target = match config.debug_mode {
            DebugMode::Depth => self.shadow_depth.depth_target(),
            DebugMode::None | DebugMode::WorldNormal | DebugMode::Albedo | DebugMode::PrimitiveId => None,
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
        let mut renderer = ForwardRenderer::new(&mut rhi, ForwardVariant::ClassicPbr);
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        let material = scene.create_material(ember_scene::MaterialResource::new("m"), ember_scene::MaterialVariant::Pbr);
        let sphere_node = scene.create_node("sphere");
        scene.add_component(sphere_node, ComponentKind::Sphere { radius: 1.0, material });
        scene.update_dirty_transform();

        renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);
        assert_eq!(renderer.scene_proxy().primitive_count(), 1);
    }

    #[test]
    fn screenshot_request_completes() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 4, image_height: 4, shadow_map_resolution: 4, ..RenderConfig::default() };
        let mut renderer = ForwardRenderer::new(&mut rhi, ForwardVariant::ClassicPbr);
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        scene.update_dirty_transform();

        let got = std::sync::Arc::new(std::sync::Mutex::new(false));
        let got_clone = got.clone();
        renderer.request_screenshot(ScreenshotRequest::new(move |result| {
            *got_clone.lock().unwrap() = result.is_ok();
        }));
        renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);
        assert!(*got.lock().unwrap());
    }
}

//! `CPURenderer` (`SPEC_FULL.md` §4.F): runs the software path tracer into a
//! half-precision image, uploads it to a texture, then the usual
//! quad/UI/present tail every renderer shares.

use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
use ember_rhi::resource::{Image, ImageDesc};
use ember_rhi::shader_resource::SamplerAttr;
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, PixelFormat, RhiContext, Transition};
use ember_scene::Scene;

use crate::config::RenderConfig;
use crate::image2d::Image2D;
use crate::pass::{ScreenQuadPass, UiPass};
use crate::path_tracer::PathTracer;
use crate::proxy::SceneRenderProxy;
use crate::renderer::screenshot::{readback_rgba8, ScreenshotRequest};

pub struct CpuRenderer {
    scene_proxy: SceneRenderProxy,
    path_tracer: PathTracer,
    output_image: Image2D,
    color_texture: Option<Handle<Image>>,
    screen_quad: ScreenQuadPass,
    pub ui: UiPass,
    pending_screenshot: Option<ScreenshotRequest>,
    use_bilateral_denoise: bool,
}

impl CpuRenderer {
    #[must_use]
    pub fn new(rhi: &mut RhiContext, config: &RenderConfig) -> Self {
        Self {
            scene_proxy: SceneRenderProxy::new(rhi),
            path_tracer: PathTracer::new(config.image_width, config.image_height),
            output_image: Image2D::new(config.image_width, config.image_height),
            color_texture: None,
            screen_quad: ScreenQuadPass::new(),
            ui: UiPass::new(),
            pending_screenshot: None,
            use_bilateral_denoise: false,
        }
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        let desc = ImageDesc {
            format: PixelFormat::RgbaFloat16,
            width: config.image_width,
            height: config.image_height,
            mip_levels: 1,
            sampler_attr: SamplerAttr::default(),
            image_type: ImageType::D2,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC,
            memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            initial_layout: ImageLayout::Undefined,
        };
        self.color_texture = rhi.create_render_target(desc).ok();
        self.screen_quad.init_render_resources(rhi);
    }

    /// Enables the optional bilateral post-filter over the path tracer's
    /// accumulation buffer (`SPEC_FULL.md` §4.H "optional denoise pass").
    pub fn set_bilateral_denoise(&mut self, enabled: bool) {
        self.use_bilateral_denoise = enabled;
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.pending_screenshot = Some(request);
    }

    /// Runs one full frame following the shared renderer skeleton
    /// (`SPEC_FULL.md` §4.F).
    pub fn tick(&mut self, rhi: &mut RhiContext, scene: &mut Scene, config: &RenderConfig) {
        self.scene_proxy.update(rhi, scene, config);
        self.update(config);
        self.scene_proxy.end_update(scene);

        rhi.begin_frame();
        self.render(rhi, config);
        rhi.end_frame();
    }

    fn update(&mut self, config: &RenderConfig) {
        self.output_image.resize_if_needed(config.image_width, config.image_height);
    }

    fn render(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.path_tracer.render(&self.scene_proxy, config, &mut self.output_image);
        if self.use_bilateral_denoise {
            self.path_tracer.denoise_bilateral(&mut self.output_image);
        }

        if let Some(texture) = &self.color_texture {
            rhi.transition_image(
                texture,
                Transition {
                    target_layout: ImageLayout::TransferDst,
                    after_stage: PipelineStage::Top,
                    before_stage: PipelineStage::Transfer,
                    base_mip: 0,
                    mip_count: 1,
                },
            );
            rhi.image_mut(texture).data_mut().copy_from_slice(&self.output_image.to_bytes());
        }

        self.screen_quad.render(rhi);
        self.ui.render(rhi);

        if let (Some(request), Some(texture)) = (self.pending_screenshot.take(), &self.color_texture) {
            let bytes = readback_rgba8(rhi, texture);
            request.complete(Ok(bytes));
        }
    }

    #[must_use]
    pub fn scene_proxy(&self) -> &SceneRenderProxy {
        &self.scene_proxy
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.path_tracer.sample_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::{CameraState, ComponentKind};

    #[test]
    fn tick_advances_sample_count_across_frames() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 8, image_height: 8, sample_per_pixel: 1, max_bounce: 1, ..RenderConfig::default() };
        let mut renderer = CpuRenderer::new(&mut rhi, &config);
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        scene.update_dirty_transform();

        renderer.tick(&mut rhi, &mut scene, &config);
        assert_eq!(renderer.sample_count(), 1);
        renderer.tick(&mut rhi, &mut scene, &config);
        assert_eq!(renderer.sample_count(), 2);
    }

    #[test]
    fn screenshot_request_completes_with_bytes() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 4, image_height: 4, sample_per_pixel: 1, max_bounce: 1, ..RenderConfig::default() };
        let mut renderer = CpuRenderer::new(&mut rhi, &config);
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
        renderer.tick(&mut rhi, &mut scene, &config);
        assert!(*got.lock().unwrap());
    }
}

//! `GPURenderer` (`SPEC_FULL.md` §4.F): a hardware-ray-traced direct
//! lighting pass (one primary ray and one shadow ray per pixel) with
//! ASVGF-denoised temporal accumulation, dynamically choosing its
//! samples-per-pixel from a running GPU-time estimate rather than a fixed
//! count. Modeled on
//! `original_source/libraries/include/renderer/renderer/GPURenderer.h`'s
//! `ComputePerformanceRecord` history.
//!
//! This crate's only RHI backend has no real ray-tracing hardware, so the
//! "compute shader" here is a CPU stand-in that fills the same five
//! feature buffers a real one would write; `Asvgf` and `ToneMappingPass`
//! downstream don't know the difference.

use std::collections::VecDeque;

use ember_rhi::flags::{ImageType, ImageUsage, MemoryProperties};
use ember_rhi::resource::{Image, ImageDesc};
use ember_rhi::shader_resource::SamplerAttr;
use ember_rhi::tracked::Handle;
use ember_rhi::{ImageLayout, PipelineStage, PixelFormat, RhiContext, Transition};
use ember_scene::Scene;

use ember_core::sampler::Sampler;
use ember_core::Ray;
use glam::{Vec3, Vec4};

use crate::asvgf::{Asvgf, GFeatures};
use crate::config::{AsvgfDebugView, RenderConfig};
use crate::error::{RenderError, Result};
use crate::pass::{ScreenQuadPass, ToneMappingPass, UiPass};
use crate::path_tracer::primary_ray_direction;
use crate::proxy::{CameraRenderProxy, SceneRenderProxy};
use crate::renderer::screenshot::{readback_rgba8, ScreenshotRequest};

/// One frame's {spp, measured GPU time} sample, kept for up to
/// `HISTORY_CAPACITY` frames to derive a running time-per-sample estimate.
#[derive(Debug, Clone, Copy)]
pub struct ComputePerformanceRecord {
    pub spp: u32,
    pub gpu_time_seconds: f32,
}

const HISTORY_CAPACITY: usize = 64;

pub struct GpuRenderer {
    scene_proxy: SceneRenderProxy,
    features: GFeatures,
    asvgf: Asvgf,
    tone_map: ToneMappingPass,
    screen_quad: ScreenQuadPass,
    pub ui: UiPass,
    color_texture: Option<Handle<Image>>,
    history: VecDeque<ComputePerformanceRecord>,
    last_frame_time: f32,
    last_gpu_time: f32,
    pending_screenshot: Option<ScreenshotRequest>,
}

impl GpuRenderer {
    /// Fails with `UnsupportedConfiguration` when the device has no
    /// hardware ray-tracing support, matching §7's "the renderer refuses
    /// to start" rule.
    pub fn new(rhi: &mut RhiContext, config: &RenderConfig, supports_hardware_rt: bool) -> Result<Self> {
        if !supports_hardware_rt {
            return Err(RenderError::UnsupportedConfiguration(
                "gpu pipeline requires hardware ray-tracing support".into(),
            ));
        }
        Ok(Self {
            scene_proxy: SceneRenderProxy::new(rhi),
            features: GFeatures::new(config.image_width, config.image_height),
            asvgf: Asvgf::new(config.image_width, config.image_height),
            tone_map: ToneMappingPass::new(),
            screen_quad: ScreenQuadPass::new(),
            ui: UiPass::new(),
            color_texture: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_frame_time: 0.0,
            last_gpu_time: 0.0,
            pending_screenshot: None,
        })
    }

    pub fn init_render_resources(&mut self, rhi: &mut RhiContext, config: &RenderConfig) {
        self.tone_map.init_render_resources(rhi, config);
        self.screen_quad.init_render_resources(rhi);
        let desc = ImageDesc {
            format: PixelFormat::RgbaFloat,
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
    }

    pub fn request_screenshot(&mut self, request: ScreenshotRequest) {
        self.pending_screenshot = Some(request);
    }

    /// `running_time_per_spp`: total history GPU time divided by total
    /// history spp, zero when no history exists yet (§2.1).
    #[must_use]
    pub fn running_time_per_spp(&self) -> f32 {
        let total_spp: u32 = self.history.iter().map(|r| r.spp).sum();
        let total_time: f32 = self.history.iter().map(|r| r.gpu_time_seconds).sum();
        if total_spp == 0 {
            0.0
        } else {
            total_time / total_spp as f32
        }
    }

    /// Sum of `spp` over roughly the last second of recorded frames, using
    /// `target_framerate` to estimate how many history entries that spans.
    #[must_use]
    pub fn last_second_total_spp(&self, target_framerate: f32) -> u32 {
        let frames = (target_framerate.max(1.0) as usize).min(self.history.len());
        self.history.iter().rev().take(frames).map(|r| r.spp).sum()
    }

    /// Dynamic spp for the next frame: `gpu_time_budget_ratio * (target_frame_time
    /// - last_frame_time + last_gpu_time)` divided by the running per-sample
    /// cost, clamped to `[1, max_sample_per_pixel]` (`SPEC_FULL.md` §4.F).
    #[must_use]
    pub fn dynamic_sample_per_pixel(&self, config: &RenderConfig) -> u32 {
        if !config.use_dynamic_spp {
            return config.sample_per_pixel.clamp(1, config.max_sample_per_pixel);
        }
        let running_time_per_spp = self.running_time_per_spp();
        if running_time_per_spp <= 0.0 {
            return config.sample_per_pixel.clamp(1, config.max_sample_per_pixel);
        }
        let target_frame_time = 1.0 / config.target_framerate.max(1.0);
        let budget = config.gpu_time_budget_ratio * (target_frame_time - self.last_frame_time + self.last_gpu_time);
        let spp = (budget.max(0.0) / running_time_per_spp).round().max(1.0) as u32;
        spp.clamp(1, config.max_sample_per_pixel)
    }

    fn record_frame(&mut self, spp: u32, gpu_time_seconds: f32) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(ComputePerformanceRecord { spp, gpu_time_seconds });
        self.last_gpu_time = gpu_time_seconds;
    }

    pub fn tick(&mut self, rhi: &mut RhiContext, scene: &mut Scene, config: &RenderConfig, frame_time_seconds: f32) {
        self.scene_proxy.update(rhi, scene, config);
        self.update(config);
        self.scene_proxy.end_update(scene);

        rhi.begin_frame();
        let gpu_time = self.render(rhi, config);
        rhi.end_frame();

        let spp = self.dynamic_sample_per_pixel(config);
        self.record_frame(spp, gpu_time);
        self.last_frame_time = frame_time_seconds;
    }

    fn update(&mut self, config: &RenderConfig) {
        if self.features.radiance.len() != (config.image_width as usize) * (config.image_height as usize) {
            self.features = GFeatures::new(config.image_width, config.image_height);
        }
    }

    /// Fills the feature buffers, runs ASVGF, tone-maps, and draws the
    /// present quad. Returns the wall-clock time the shading pass took, the
    /// stand-in for a real GPU timer query.
    fn render(&mut self, rhi: &mut RhiContext, config: &RenderConfig) -> f32 {
        let spp = self.dynamic_sample_per_pixel(config);
        let started = std::time::Instant::now();

        if let Some(camera) = self.scene_proxy.camera() {
            shade_frame(&self.scene_proxy, camera, &mut self.features, spp);

            self.asvgf.run(
                &mut self.features,
                camera,
                config.asvgf_atrous_iterations,
                config.asvgf_debug_view,
                config.asvgf_force_clear_history || config.asvgf_test_stage.is_some(),
                camera.sample_count,
            );
        }
        let gpu_time = started.elapsed().as_secs_f32();

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
            rhi.image_mut(texture).data_mut().copy_from_slice(&radiance_to_bytes(&self.features.radiance));
        }

        self.tone_map.render(rhi, self.scene_proxy.camera().map_or(1.0, |c| c.exposure));
        self.screen_quad.render(rhi);
        self.ui.render(rhi);

        if let (Some(request), Some(texture)) = (self.pending_screenshot.take(), &self.color_texture) {
            let bytes = readback_rgba8(rhi, texture);
            request.complete(Ok(bytes));
        }

        gpu_time
    }

    #[must_use]
    pub fn debug_view(&self) -> AsvgfDebugView {
        AsvgfDebugView::None
    }
}

fn radiance_to_bytes(radiance: &[Vec3]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(radiance.len() * 16);
    for c in radiance {
        bytes.extend_from_slice(&c.x.to_le_bytes());
        bytes.extend_from_slice(&c.y.to_le_bytes());
        bytes.extend_from_slice(&c.z.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
    }
    bytes
}

/// Single primary ray plus a next-event-estimation shadow ray per pixel,
/// `spp` times, averaged; also records the first sample's (normal,
/// roughness), (albedo, metallic), linear depth and primitive id for
/// ASVGF (`SPEC_FULL.md` §4.G input).
fn shade_frame(scene: &SceneRenderProxy, camera: &CameraRenderProxy, features: &mut GFeatures, spp: u32) {
    let width = camera.image_width;
    let height = camera.image_height;

    for row in 0..height {
        let mut sampler = Sampler::new(row.wrapping_mul(2_654_435_761).wrapping_add(camera.sample_count));
        for col in 0..width {
            let index = (row as usize) * (width as usize) + col as usize;
            let mut radiance_sum = Vec3::ZERO;
            let mut wrote_features = false;

            for _ in 0..spp.max(1) {
                let u = (col as f32 + sampler.random_unit()) / width as f32;
                let v = 1.0 - (row as f32 + sampler.random_unit()) / height as f32;
                let direction = primary_ray_direction(camera, u, v);
                let ray = Ray::new(camera.position, direction);
                let hit = scene.closest_hit(&ray);

                if !hit.is_hit() {
                    if let Some(sky) = scene.sky() {
                        radiance_sum += sky.clamp_sky(Vec3::splat(sky.intensity));
                    }
                    if !wrote_features {
                        features.normal_roughness[index] = Vec4::ZERO;
                        features.albedo_metallic[index] = Vec4::ZERO;
                        features.linear_depth[index] = f32::MAX;
                        features.primitive_id[index] = u32::MAX;
                        wrote_features = true;
                    }
                    continue;
                }

                let Some(primitive_index) = hit.primitive() else { continue };
                let material_id = scene.primitives()[primitive_index as usize].material_id();
                let material = scene.material(material_id);

                let mut radiance = material.map_or(Vec3::ZERO, |m| m.emissive);
                if let (Some(material), Some(light)) = (material, scene.directional_light()) {
                    let n_dot_l = hit.world_normal.dot(-light.direction).max(0.0);
                    if n_dot_l > 0.0 {
                        let shadow_origin = hit.world_point + hit.world_normal * 1e-3;
                        let shadow_ray = Ray::new(shadow_origin, -light.direction);
                        if !scene.any_hit(&shadow_ray, 1e-3, f32::MAX) {
                            radiance += material.base_color * light.color * light.intensity * n_dot_l * std::f32::consts::FRAC_1_PI;
                        }
                    }
                }
                radiance_sum += radiance;

                if !wrote_features {
                    let roughness = material.map_or(1.0, |m| m.roughness);
                    let (albedo, metallic) = material.map_or((Vec3::ZERO, 0.0), |m| (m.base_color, m.metallic));
                    features.normal_roughness[index] = hit.world_normal.extend(roughness);
                    features.albedo_metallic[index] = albedo.extend(metallic);
                    features.linear_depth[index] = hit.t();
                    features.primitive_id[index] = primitive_index;
                    wrote_features = true;
                }
            }

            features.radiance[index] = radiance_sum / spp.max(1) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::{CameraState, ComponentKind};

    #[test]
    fn refuses_to_start_without_hardware_rt() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig::default();
        let result = GpuRenderer::new(&mut rhi, &config, false);
        assert!(matches!(result, Err(RenderError::UnsupportedConfiguration(_))));
    }

    #[test]
    fn dynamic_spp_falls_back_to_static_value_with_no_history() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { sample_per_pixel: 4, ..RenderConfig::default() };
        let renderer = GpuRenderer::new(&mut rhi, &config, true).unwrap();
        assert_eq!(renderer.dynamic_sample_per_pixel(&config), 4);
    }

    #[test]
    fn tick_runs_without_panicking_and_records_history() {
        let mut rhi = RhiContext::new(2);
        let config = RenderConfig { image_width: 4, image_height: 4, max_sample_per_pixel: 16, ..RenderConfig::default() };
        let mut renderer = GpuRenderer::new(&mut rhi, &config, true).unwrap();
        renderer.init_render_resources(&mut rhi, &config);

        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(CameraState::default()));
        scene.active_camera = Some(camera_node);
        scene.update_dirty_transform();

        renderer.tick(&mut rhi, &mut scene, &config, 1.0 / 60.0);
        assert_eq!(renderer.history.len(), 1);
    }
}

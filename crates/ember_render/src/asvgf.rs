//! Adaptive-SVGF denoiser pipeline shared by the GPU path tracer
//! (`SPEC_FULL.md` §4.G), modeled on
//! `original_source/libraries/include/renderer/renderer/ASVGF.h`.
//!
//! Each stage is expressed as a plain CPU-side pass over feature buffers
//! rather than a compute-shader dispatch, since this crate's only RHI
//! backend is the software one; a hardware backend would translate these
//! same buffers into compute dispatches without changing the algorithm.

use glam::{Vec2, Vec3, Vec4};

use crate::config::AsvgfDebugView;
use crate::path_tracer::primary_ray_direction;
use crate::proxy::CameraRenderProxy;

/// The five feature textures the path-tracing compute shader writes each
/// frame, indexed `row * width + col`.
pub struct GFeatures {
    pub radiance: Vec<Vec3>,
    pub normal_roughness: Vec<Vec4>,
    pub albedo_metallic: Vec<Vec4>,
    pub linear_depth: Vec<f32>,
    pub primitive_id: Vec<u32>,
}

impl GFeatures {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            radiance: vec![Vec3::ZERO; count],
            normal_roughness: vec![Vec4::ZERO; count],
            albedo_metallic: vec![Vec4::ZERO; count],
            linear_depth: vec![f32::MAX; count],
            primitive_id: vec![u32::MAX; count],
        }
    }
}

#[derive(Clone)]
struct History {
    color: Vec<Vec3>,
    moments: Vec<Vec2>,
    normal_roughness: Vec<Vec4>,
    linear_depth: Vec<f32>,
    primitive_id: Vec<u32>,
    history_length: Vec<f32>,
}

impl History {
    fn new(width: u32, height: u32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            color: vec![Vec3::ZERO; count],
            moments: vec![Vec2::ZERO; count],
            normal_roughness: vec![Vec4::ZERO; count],
            linear_depth: vec![f32::MAX; count],
            primitive_id: vec![u32::MAX; count],
            history_length: vec![0.0; count],
        }
    }
}

const DEPTH_SIGMA: f32 = 0.05;
const NORMAL_COSINE_POWER: f32 = 64.0;
const ATROUS_MAX_ITERATIONS: u32 = 8;
const ATROUS_MAX_WHEN_RUNNING: u32 = 2;

pub struct Asvgf {
    width: u32,
    height: u32,
    history: [History; 2],
    write_index: usize,
    previous_camera: Option<CameraRenderProxy>,
    initialized: bool,
    last_debug_view: AsvgfDebugView,
}

impl Asvgf {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            history: [History::new(width, height), History::new(width, height)],
            write_index: 0,
            previous_camera: None,
            initialized: false,
            last_debug_view: AsvgfDebugView::None,
        }
    }

    /// Clears all history and resets the ping-pong index; called on
    /// enable/disable, scene change, debug-view toggle, explicit
    /// force-clear, and implicitly on the very first frame.
    pub fn clear_history(&mut self) {
        self.history = [History::new(self.width, self.height), History::new(self.width, self.height)];
        self.write_index = 0;
        self.previous_camera = None;
        self.initialized = false;
    }

    fn resize_if_needed(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.clear_history();
    }

    /// Runs the full denoiser pipeline for one frame, writing the
    /// denoised result back into `features.radiance` (or, when a debug
    /// view is selected, replacing it with the packed visualisation).
    pub fn run(
        &mut self,
        features: &mut GFeatures,
        camera: &CameraRenderProxy,
        atrous_iterations: u32,
        debug_view: AsvgfDebugView,
        force_clear: bool,
        accumulated_spp: u32,
    ) {
        self.resize_if_needed(camera.image_width, camera.image_height);

        if force_clear || !self.initialized || debug_view != self.last_debug_view {
            self.clear_history();
        }
        self.initialized = true;
        self.last_debug_view = debug_view;

        let read_index = 1 - self.write_index;
        self.reproject(features, camera, read_index, self.write_index);

        let variance = self.estimate_variance(self.write_index, features);

        let capped = atrous_iterations.min(ATROUS_MAX_ITERATIONS).min(ATROUS_MAX_WHEN_RUNNING);
        let iterations = if accumulated_spp >= 512 {
            0
        } else if accumulated_spp >= 128 {
            capped.min(1)
        } else {
            capped
        };
        self.atrous(features, &variance, iterations);

        if debug_view != AsvgfDebugView::None {
            self.write_debug_visualization(features, debug_view, variance.as_slice());
        }

        self.previous_camera = Some(clone_camera(camera));
        self.write_index = read_index;
    }

    /// Reprojects the previous frame's history into the current frame
    /// using the previous camera's focus-plane basis, validates it
    /// against a depth-sigma and cosine-power normal test, and writes the
    /// new history color/moments pair at `write_index`. When validated,
    /// mixes the reprojected color back into `features.radiance`.
    fn reproject(&mut self, features: &mut GFeatures, camera: &CameraRenderProxy, read_index: usize, write_index: usize) {
        let width = self.width;
        let height = self.height;
        let Some(prev_camera) = self.previous_camera.clone() else {
            // First frame after a history clear: nothing to reproject from.
            for index in 0..features.radiance.len() {
                seed_history(&mut self.history[write_index], index, features, camera);
            }
            return;
        };

        for y in 0..height {
            for x in 0..width {
                let index = (y as usize) * (width as usize) + x as usize;
                let depth = features.linear_depth[index];
                let current_normal = features.normal_roughness[index].truncate();

                let mut reprojected = None;
                if depth.is_finite() && depth < f32::MAX {
                    let u = (x as f32 + 0.5) / width as f32;
                    let v = 1.0 - (y as f32 + 0.5) / height as f32;
                    let direction = primary_ray_direction(camera, u, v);
                    let world_pos = camera.position + direction * depth;

                    let prev_clip = prev_camera.view_projection_matrix * world_pos.extend(1.0);
                    if prev_clip.w > 1e-5 {
                        let prev_ndc = prev_clip.truncate() / prev_clip.w;
                        let prev_u = (prev_ndc.x * 0.5 + 0.5).clamp(0.0, 1.0);
                        let prev_v = (prev_ndc.y * 0.5 + 0.5).clamp(0.0, 1.0);
                        let prev_x = ((prev_u * width as f32) as i64).clamp(0, width as i64 - 1) as usize;
                        let prev_y = (((1.0 - prev_v) * height as f32) as i64).clamp(0, height as i64 - 1) as usize;
                        let prev_index = prev_y * width as usize + prev_x;

                        let prev_depth = self.history[read_index].linear_depth[prev_index];
                        let prev_normal = self.history[read_index].normal_roughness[prev_index].truncate();
                        let depth_ok = (prev_depth - depth).abs() <= DEPTH_SIGMA * depth.max(1.0);
                        let normal_ok = current_normal.dot(prev_normal).max(0.0).powf(NORMAL_COSINE_POWER) > 0.05;
                        if depth_ok && normal_ok && prev_depth < f32::MAX {
                            reprojected = Some(prev_index);
                        }
                    }
                }

                if let Some(prev_index) = reprojected {
                    let prev_color = self.history[read_index].color[prev_index];
                    let prev_moments = self.history[read_index].moments[prev_index];
                    let prev_length = (self.history[read_index].history_length[prev_index] + 1.0).min(32.0);

                    let luminance = luminance_of(features.radiance[index]);
                    let new_moments = Vec2::new(
                        mix(prev_moments.x, luminance, 1.0 / prev_length),
                        mix(prev_moments.y, luminance * luminance, 1.0 / prev_length),
                    );
                    let mixed_color = prev_color.lerp(features.radiance[index], 1.0 / prev_length);

                    self.history[write_index].color[index] = mixed_color;
                    self.history[write_index].moments[index] = new_moments;
                    self.history[write_index].history_length[index] = prev_length;
                    features.radiance[index] = mixed_color;
                } else {
                    let luminance = luminance_of(features.radiance[index]);
                    self.history[write_index].color[index] = features.radiance[index];
                    self.history[write_index].moments[index] = Vec2::new(luminance, luminance * luminance);
                    self.history[write_index].history_length[index] = 1.0;
                }
                self.history[write_index].normal_roughness[index] = features.normal_roughness[index];
                self.history[write_index].linear_depth[index] = depth;
                self.history[write_index].primitive_id[index] = features.primitive_id[index];
            }
        }
    }

    /// Estimates per-pixel variance from the history moments, falling
    /// back to an edge-aware bilateral estimate over a small window for
    /// pixels with too little history to trust the temporal estimate.
    fn estimate_variance(&self, write_index: usize, features: &GFeatures) -> Vec<f32> {
        let width = self.width as i32;
        let height = self.height as i32;
        let history = &self.history[write_index];
        let mut variance = vec![0.0f32; history.color.len()];

        for y in 0..height {
            for x in 0..width {
                let index = (y as usize) * (width as usize) + x as usize;
                if history.history_length[index] >= 4.0 {
                    let m = history.moments[index];
                    variance[index] = (m.y - m.x * m.x).max(0.0);
                    continue;
                }

                let center_normal = features.normal_roughness[index].truncate();
                let center_depth = features.linear_depth[index];
                let mut sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for dy in -3..=3 {
                    for dx in -3..=3 {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let n_index = (ny as usize) * (width as usize) + nx as usize;
                        let n_normal = features.normal_roughness[n_index].truncate();
                        let n_depth = features.linear_depth[n_index];
                        let depth_weight = (-((n_depth - center_depth).abs()) / DEPTH_SIGMA.max(1e-4)).exp();
                        let normal_weight = center_normal.dot(n_normal).max(0.0).powf(NORMAL_COSINE_POWER);
                        let weight = depth_weight * normal_weight;
                        let m = history.moments[n_index];
                        sum += (m.y - m.x * m.x).max(0.0) * weight;
                        weight_sum += weight;
                    }
                }
                variance[index] = if weight_sum > 0.0 { sum / weight_sum } else { 0.0 };
            }
        }
        variance
    }

    /// Bounded edge-stopping à-trous iterations over `features.radiance`;
    /// the last iteration is the value callers see.
    fn atrous(&self, features: &mut GFeatures, variance: &[f32], iterations: u32) {
        let width = self.width as i32;
        let height = self.height as i32;
        let mut color = features.radiance.clone();
        let mut var = variance.to_vec();

        for iter in 0..iterations {
            let step_width = 1i32 << (iter / 2);
            let mut next_color = color.clone();
            let mut next_var = var.clone();

            for y in 0..height {
                for x in 0..width {
                    let index = (y as usize) * (width as usize) + x as usize;
                    let center_color = color[index];
                    let center_normal = features.normal_roughness[index].truncate();
                    let center_depth = features.linear_depth[index];
                    let center_albedo = features.albedo_metallic[index].truncate();
                    let color_sigma = (var[index].max(1e-6)).sqrt();

                    let mut sum = Vec3::ZERO;
                    let mut var_sum = 0.0f32;
                    let mut weight_sum = 0.0f32;
                    const KERNEL: [i32; 5] = [-2, -1, 0, 1, 2];
                    for &ky in &KERNEL {
                        for &kx in &KERNEL {
                            let nx = x + kx * step_width;
                            let ny = y + ky * step_width;
                            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                                continue;
                            }
                            let n_index = (ny as usize) * (width as usize) + nx as usize;
                            let n_color = color[n_index];
                            let n_normal = features.normal_roughness[n_index].truncate();
                            let n_depth = features.linear_depth[n_index];
                            let n_albedo = features.albedo_metallic[n_index].truncate();

                            let color_weight = (-(n_color - center_color).length_squared() / (2.0 * color_sigma * color_sigma + 1e-6)).exp();
                            let normal_weight = center_normal.dot(n_normal).max(0.0).powf(NORMAL_COSINE_POWER);
                            let depth_weight = (-((n_depth - center_depth).abs()) / DEPTH_SIGMA.max(1e-4)).exp();
                            let albedo_weight = (-(n_albedo - center_albedo).length_squared() / 0.1).exp();
                            let weight = color_weight * normal_weight * depth_weight * albedo_weight;

                            sum += n_color * weight;
                            var_sum += var[n_index] * weight * weight;
                            weight_sum += weight;
                        }
                    }

                    if weight_sum > 0.0 {
                        next_color[index] = sum / weight_sum;
                        next_var[index] = var_sum / (weight_sum * weight_sum);
                    }
                }
            }

            color = next_color;
            var = next_var;
        }

        features.radiance = color;
    }

    fn write_debug_visualization(&self, features: &mut GFeatures, view: AsvgfDebugView, variance: &[f32]) {
        let history = &self.history[self.write_index];
        for index in 0..features.radiance.len() {
            features.radiance[index] = match view {
                AsvgfDebugView::None => features.radiance[index],
                AsvgfDebugView::Reprojection => Vec3::splat(if history.history_length[index] > 1.0 { 1.0 } else { 0.0 }),
                AsvgfDebugView::Moments => history.moments[index].extend(0.0),
                AsvgfDebugView::Variance => Vec3::splat(variance[index].sqrt()),
                AsvgfDebugView::History => Vec3::splat((history.history_length[index] / 32.0).min(1.0)),
            };
        }
    }
}

fn seed_history(history: &mut History, index: usize, features: &GFeatures, _camera: &CameraRenderProxy) {
    let luminance = luminance_of(features.radiance[index]);
    history.color[index] = features.radiance[index];
    history.moments[index] = Vec2::new(luminance, luminance * luminance);
    history.history_length[index] = 1.0;
    history.normal_roughness[index] = features.normal_roughness[index];
    history.linear_depth[index] = features.linear_depth[index];
    history.primitive_id[index] = features.primitive_id[index];
}

fn luminance_of(c: Vec3) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn clone_camera(camera: &CameraRenderProxy) -> CameraRenderProxy {
    let mut clone = CameraRenderProxy::new(&crate::config::RenderConfig {
        image_width: camera.image_width,
        image_height: camera.image_height,
        ..crate::config::RenderConfig::default()
    });
    clone.view_matrix = camera.view_matrix;
    clone.projection_matrix = camera.projection_matrix;
    clone.view_projection_matrix = camera.view_projection_matrix;
    clone.lower_left = camera.lower_left;
    clone.max_u = camera.max_u;
    clone.max_v = camera.max_v;
    clone.position = camera.position;
    clone.aperture_radius = camera.aperture_radius;
    clone.exposure = camera.exposure;
    clone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    fn flat_camera(width: u32, height: u32) -> CameraRenderProxy {
        let config = RenderConfig {
            image_width: width,
            image_height: height,
            ..RenderConfig::default()
        };
        let mut camera = CameraRenderProxy::new(&config);
        camera.update(Vec3::ZERO, glam::Quat::IDENTITY, true, 60.0, 10.0, 0.0, 1.0, 0.1, 1000.0, width, height);
        camera
    }

    #[test]
    fn first_frame_seeds_history_without_panicking() {
        let mut asvgf = Asvgf::new(4, 4);
        let camera = flat_camera(4, 4);
        let mut features = GFeatures::new(4, 4);
        features.radiance.fill(Vec3::splat(1.0));
        features.linear_depth.fill(5.0);
        asvgf.run(&mut features, &camera, 4, AsvgfDebugView::None, false, 0);
        assert!(features.radiance.iter().all(|c| c.x.is_finite()));
    }

    #[test]
    fn atrous_iterations_are_clamped_at_high_sample_counts() {
        let mut asvgf = Asvgf::new(4, 4);
        let camera = flat_camera(4, 4);
        let mut features = GFeatures::new(4, 4);
        features.radiance.fill(Vec3::splat(1.0));
        features.linear_depth.fill(5.0);
        // Above the 512-spp threshold the pipeline should skip à-trous
        // entirely; this just exercises the path without panicking and
        // checks the radiance buffer is still well-formed.
        asvgf.run(&mut features, &camera, 4, AsvgfDebugView::None, false, 600);
        assert!(features.radiance.iter().all(|c| c.x.is_finite()));
    }

    #[test]
    fn force_clear_resets_history_length() {
        let mut asvgf = Asvgf::new(4, 4);
        let camera = flat_camera(4, 4);
        let mut features = GFeatures::new(4, 4);
        features.radiance.fill(Vec3::splat(1.0));
        features.linear_depth.fill(5.0);
        asvgf.run(&mut features, &camera, 4, AsvgfDebugView::None, false, 0);
        asvgf.run(&mut features, &camera, 4, AsvgfDebugView::None, true, 0);
        assert_eq!(asvgf.history[asvgf.write_index].history_length[0], 0.0);
    }
}

//! Software path tracer, shared by `CPURenderer` and used as the
//! reference ground truth the GPU compute path mirrors (`SPEC_FULL.md`
//! §4.H), modeled on
//! `original_source/libraries/include/renderer/renderer/CPURenderer.h`
//! and `scene/material/BxDF.h`.

use ember_core::sampler::Sampler;
use ember_core::Ray;
use glam::{Vec3, Vec4};

use crate::config::RenderConfig;
use crate::image2d::Image2D;
use crate::proxy::{CameraRenderProxy, SceneRenderProxy};

/// Bounces after which Russian roulette may terminate a path.
const ROULETTE_START_BOUNCE: u32 = 3;
/// Rows handed to a single worker task at a time.
const ROW_CHUNK: usize = 4;

/// Persistent temporal accumulation buffer plus the auxiliary first-hit
/// normal buffer the optional bilateral denoise reads.
pub struct PathTracer {
    width: u32,
    height: u32,
    accumulated: Vec<Vec3>,
    first_hit_normal: Vec<Vec3>,
    sample_count: u32,
    frame_index: u32,
}

impl PathTracer {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            accumulated: vec![Vec3::ZERO; count],
            first_hit_normal: vec![Vec3::ZERO; count],
            sample_count: 0,
            frame_index: 0,
        }
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn resize_if_needed(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        let count = (width as usize) * (height as usize);
        self.accumulated = vec![Vec3::ZERO; count];
        self.first_hit_normal = vec![Vec3::ZERO; count];
        self.sample_count = 0;
    }

    fn reset(&mut self) {
        self.accumulated.fill(Vec3::ZERO);
        self.sample_count = 0;
    }

    /// Renders one frame's worth of samples (`config.sample_per_pixel`,
    /// capped so the running total never exceeds
    /// `config.max_sample_per_pixel`) and tone-maps the running average
    /// into `output`.
    pub fn render(&mut self, scene: &SceneRenderProxy, config: &RenderConfig, output: &mut Image2D) {
        let Some(camera) = scene.camera() else {
            return;
        };
        self.resize_if_needed(camera.image_width, camera.image_height);
        output.resize_if_needed(camera.image_width, camera.image_height);
        if camera.pixels_dirty {
            self.reset();
        }

        let remaining = config.max_sample_per_pixel.saturating_sub(self.sample_count);
        let spp = config.sample_per_pixel.min(remaining.max(1)).max(1);
        if remaining == 0 {
            self.tonemap_into(output);
            return;
        }

        self.frame_index = self.frame_index.wrapping_add(1);
        let width = self.width;
        let height = self.height;
        let enable_nee = config.enable_nee;
        let max_bounce = config.max_bounce;
        let frame_index = self.frame_index;

        let worker_count = std::thread::available_parallelism()
            .map_or(1, std::num::NonZero::get)
            .min(height.max(1) as usize)
            .max(1);
        let rows_per_worker = height.div_ceil(worker_count as u32).max(1).max(ROW_CHUNK as u32).min(height.max(1));
        let width_usize = width as usize;

        let mut remaining_acc = self.accumulated.as_mut_slice();
        let mut remaining_norm = self.first_hit_normal.as_mut_slice();

        std::thread::scope(|scope| {
            let mut row_start = 0u32;
            while row_start < height {
                let row_end = (row_start + rows_per_worker).min(height);
                let rows = (row_end - row_start) as usize;
                let (acc_chunk, acc_rest) = remaining_acc.split_at_mut(rows * width_usize);
                remaining_acc = acc_rest;
                let (norm_chunk, norm_rest) = remaining_norm.split_at_mut(rows * width_usize);
                remaining_norm = norm_rest;

                scope.spawn(move || {
                    let mut sampler = Sampler::new(row_start.wrapping_mul(2_654_435_761).wrapping_add(frame_index));
                    for row in row_start..row_end {
                        sampler.reseed(row.wrapping_mul(2_654_435_761).wrapping_add(frame_index));
                        let local_row_base = (row - row_start) as usize * width_usize;
                        for col in 0..width {
                            let (color, normal) =
                                render_pixel(scene, camera, &mut sampler, col, row, width, height, spp, max_bounce, enable_nee);
                            let index = local_row_base + col as usize;
                            acc_chunk[index] += color;
                            if normal != Vec3::ZERO {
                                norm_chunk[index] = normal;
                            }
                        }
                    }
                });

                row_start = row_end;
            }
        });

        self.sample_count += spp;
        self.tonemap_into(output);
    }

    fn tonemap_into(&self, output: &mut Image2D) {
        for y in 0..self.height {
            for x in 0..self.width {
                let index = (y as usize) * (self.width as usize) + x as usize;
                let avg = if self.sample_count == 0 {
                    Vec3::ZERO
                } else {
                    self.accumulated[index] / self.sample_count as f32
                };
                let clamped = avg.min(Vec3::splat(CameraRenderProxy::OUTPUT_LIMIT));
                output.set(x, y, Vec4::new(clamped.x, clamped.y, clamped.z, 1.0));
            }
        }
    }

    /// Edge-aware bilateral pass over `output` using the cached first-hit
    /// normal buffer, run after the base accumulation pass
    /// (`SPEC_FULL.md` §4.H "optional denoise pass").
    pub fn denoise_bilateral(&self, output: &mut Image2D) {
        const RADIUS: i32 = 1;
        const SIGMA_COLOR: f32 = 0.1;
        const NORMAL_POWER: f32 = 32.0;

        let width = self.width as i32;
        let height = self.height as i32;
        let source = output.clone();
        for y in 0..height {
            for x in 0..width {
                let center_color = source.get(x as u32, y as u32).truncate();
                let center_normal = self.first_hit_normal[(y as usize) * (width as usize) + x as usize];
                let mut sum = Vec3::ZERO;
                let mut weight_sum = 0.0f32;
                for dy in -RADIUS..=RADIUS {
                    for dx in -RADIUS..=RADIUS {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || ny < 0 || nx >= width || ny >= height {
                            continue;
                        }
                        let sample_color = source.get(nx as u32, ny as u32).truncate();
                        let sample_normal = self.first_hit_normal[(ny as usize) * (width as usize) + nx as usize];
                        let color_dist2 = (sample_color - center_color).length_squared();
                        let normal_weight = center_normal.dot(sample_normal).max(0.0).powf(NORMAL_POWER);
                        let weight = (-color_dist2 / (2.0 * SIGMA_COLOR * SIGMA_COLOR)).exp() * normal_weight.max(1e-3);
                        sum += sample_color * weight;
                        weight_sum += weight;
                    }
                }
                let filtered = if weight_sum > 0.0 { sum / weight_sum } else { center_color };
                output.set(x as u32, y as u32, Vec4::new(filtered.x, filtered.y, filtered.z, 1.0));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_pixel(
    scene: &SceneRenderProxy,
    camera: &CameraRenderProxy,
    sampler: &mut Sampler,
    col: u32,
    row: u32,
    width: u32,
    height: u32,
    spp: u32,
    max_bounce: u32,
    enable_nee: bool,
) -> (Vec3, Vec3) {
    let strata = (spp as f32).sqrt().ceil().max(1.0) as u32;
    let mut color_sum = Vec3::ZERO;
    let mut first_normal = Vec3::ZERO;

    for sample in 0..spp {
        let stratum_x = sample % strata;
        let stratum_y = sample / strata;
        let jitter_x = (stratum_x as f32 + sampler.random_unit()) / strata as f32;
        let jitter_y = (stratum_y as f32 + sampler.random_unit()) / strata as f32;

        let u = (col as f32 + jitter_x) / width as f32;
        let v = 1.0 - (row as f32 + jitter_y) / height as f32;

        let lens = sampler.unit_disk() * camera.aperture_radius;
        let origin = camera.position + lens.x * right_basis(camera) + lens.y * up_basis(camera);
        let target = camera.lower_left + camera.max_u * u + camera.max_v * v;
        let direction = (target - origin).normalize();
        let ray = Ray::new(origin, direction);

        let (radiance, normal) = trace_path(scene, &ray, sampler, max_bounce, enable_nee);
        color_sum += radiance;
        if sample == 0 {
            first_normal = normal;
        }
    }

    (color_sum / spp as f32, first_normal)
}

/// World-space direction of the (un-jittered, pinhole) camera ray through
/// screen-space `(u, v)` (`u, v` both in `[0, 1]`, `v = 0` at the bottom).
/// Shared with `asvgf`'s reprojection stage, which needs the same mapping
/// to recover a pixel's world position from its linear depth.
#[must_use]
pub fn primary_ray_direction(camera: &CameraRenderProxy, u: f32, v: f32) -> Vec3 {
    let target = camera.lower_left + camera.max_u * u + camera.max_v * v;
    (target - camera.position).normalize_or_zero()
}

fn right_basis(camera: &CameraRenderProxy) -> Vec3 {
    camera.max_u.normalize_or_zero()
}

fn up_basis(camera: &CameraRenderProxy) -> Vec3 {
    camera.max_v.normalize_or_zero()
}

fn trace_path(scene: &SceneRenderProxy, primary_ray: &Ray, sampler: &mut Sampler, max_bounce: u32, enable_nee: bool) -> (Vec3, Vec3) {
    let mut radiance = Vec3::ZERO;
    let mut throughput = Vec3::ONE;
    let mut ray = *primary_ray;
    let mut first_normal = Vec3::ZERO;

    for bounce in 0..max_bounce {
        let hit = scene.closest_hit(&ray);
        if !hit.is_hit() {
            if let Some(sky) = scene.sky() {
                radiance += throughput * sky.clamp_sky(Vec3::splat(sky.intensity));
            }
            break;
        }

        let Some(primitive_index) = hit.primitive() else { break };
        let material_id = scene.primitives()[primitive_index as usize].material_id();
        let Some(material) = scene.material(material_id) else { break };

        if bounce == 0 {
            first_normal = hit.world_normal;
        }

        radiance += throughput * material.emissive;

        if enable_nee {
            if let Some(light) = scene.directional_light() {
                let n_dot_l = hit.world_normal.dot(-light.direction).max(0.0);
                if n_dot_l > 0.0 {
                    let shadow_origin = hit.world_point + hit.world_normal * 1e-3;
                    let shadow_ray = Ray::new(shadow_origin, -light.direction);
                    if !scene.any_hit(&shadow_ray, 1e-3, f32::MAX) {
                        radiance += throughput * material.base_color * light.color * light.intensity * n_dot_l * std::f32::consts::FRAC_1_PI;
                    }
                }
            }
        }

        let w_o = -ray.direction;
        let scatter = material.sample_surface(sampler, w_o, hit.world_normal, hit.world_tangent.extend(1.0), hit.uv);
        if scatter.throughput == Vec3::ZERO {
            break;
        }
        throughput *= scatter.throughput;

        if bounce >= ROULETTE_START_BOUNCE {
            let survive = throughput.max_element().clamp(0.05, 1.0);
            if sampler.random_unit() > survive {
                break;
            }
            throughput /= survive;
        }

        let origin = hit.world_point + hit.world_normal * 1e-3 * scatter.w_i.dot(hit.world_normal).signum();
        ray = Ray::new(origin, scatter.w_i);
    }

    (radiance, first_normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_rhi::software::RhiContext;
    use ember_scene::{ComponentKind, MaterialResource, MaterialVariant, Scene};

    fn ctx() -> RhiContext {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        rhi
    }

    #[test]
    fn miss_against_empty_scene_with_no_sky_stays_black() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let camera_node = scene.create_node("cam");
        scene.add_component(camera_node, ComponentKind::Camera(ember_scene::CameraState::default()));
        scene.active_camera = Some(camera_node);
        scene.update_dirty_transform();

        let config = RenderConfig {
            image_width: 8,
            image_height: 8,
            sample_per_pixel: 1,
            max_bounce: 2,
            ..RenderConfig::default()
        };
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        let mut tracer = PathTracer::new(8, 8);
        let mut image = Image2D::new(8, 8);
        tracer.render(&proxy, &config, &mut image);
        assert_eq!(image.get(4, 4), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn hitting_an_emissive_sphere_produces_nonzero_radiance() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();

        let mut resource = MaterialResource::new("emitter");
        resource.emissive = Vec3::splat(3.0);
        let material = scene.create_material(resource, MaterialVariant::Pbr);

        let sphere_node = scene.create_node("sphere");
        scene.add_component(sphere_node, ComponentKind::Sphere { radius: 1.0, material });

        let camera_node = scene.create_node("cam");
        let mut camera_state = ember_scene::CameraState::default();
        camera_state.vertical_fov_deg = 90.0;
        scene.add_component(camera_node, ComponentKind::Camera(camera_state));
        scene.active_camera = Some(camera_node);
        scene.node_mut(camera_node).unwrap().local.position = Vec3::new(0.0, -5.0, 0.0);
        scene.node_mut(camera_node).unwrap().mark_dirty();
        scene.update_dirty_transform();

        let config = RenderConfig {
            image_width: 16,
            image_height: 16,
            sample_per_pixel: 2,
            max_bounce: 1,
            ..RenderConfig::default()
        };
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        let mut tracer = PathTracer::new(16, 16);
        let mut image = Image2D::new(16, 16);
        tracer.render(&proxy, &config, &mut image);
        let center = image.get(8, 8);
        assert!(center.x > 0.0, "expected emissive contribution at screen center, got {center:?}");
    }
}

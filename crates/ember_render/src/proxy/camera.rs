//! Render-thread mirror of a camera component (`SPEC_FULL.md` §4.D).

use ember_core::math::z_up_to_y_up;
use glam::{Mat4, Quat, Vec3};

use crate::config::RenderConfig;

/// Right-handed perspective projection, depth range `[0, 1]`, with the Y
/// axis flipped relative to `glam`'s `perspective_rh` (`SPEC_FULL.md`
/// §4.D "reverse-Y").
fn perspective_reverse_y(vertical_fov_rad: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let flip = Mat4::from_diagonal(glam::Vec4::new(1.0, -1.0, 1.0, 1.0));
    flip * Mat4::perspective_rh(vertical_fov_rad, aspect, near, far)
}

pub struct CameraRenderProxy {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection_matrix: Mat4,

    /// Focus-plane basis for depth-of-field ray generation: world-space
    /// lower-left corner of the focus plane, plus the full-width/height
    /// basis vectors `max_u`/`max_v`.
    pub lower_left: Vec3,
    pub max_u: Vec3,
    pub max_v: Vec3,

    pub position: Vec3,
    pub aperture_radius: f32,
    pub exposure: f32,

    /// Forces the path tracer to discard its accumulation history;
    /// raised whenever the camera's transform or any config field that
    /// affects the image changes.
    pub pixels_dirty: bool,
    pub sample_count: u32,

    pub image_width: u32,
    pub image_height: u32,
}

impl CameraRenderProxy {
    /// Tone-map clamp applied to out-of-gamut radiance before display
    /// (`SPEC_FULL.md` §4.D, §2.1).
    pub const OUTPUT_LIMIT: f32 = 6.0;

    #[must_use]
    pub fn new(config: &RenderConfig) -> Self {
        let mut proxy = Self {
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            lower_left: Vec3::ZERO,
            max_u: Vec3::ZERO,
            max_v: Vec3::ZERO,
            position: Vec3::ZERO,
            aperture_radius: 0.0,
            exposure: 1.0,
            pixels_dirty: true,
            sample_count: 0,
            image_width: config.image_width,
            image_height: config.image_height,
        };
        proxy.pixels_dirty = true;
        proxy
    }

    /// Recomputes all derived matrices and the focus-plane basis from the
    /// node's world position/rotation and the component's camera state.
    /// `world_rotation` only carries the rotational part of the node's
    /// world matrix; non-uniform scale on a camera node is not
    /// meaningful and is ignored. Returns whether `pixels_dirty` ended up
    /// set (transform, resolution, or explicit dirty changed).
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        world_position: Vec3,
        world_rotation: Quat,
        transform_dirty: bool,
        vertical_fov_deg: f32,
        focus_distance: f32,
        aperture_radius: f32,
        exposure: f32,
        near: f32,
        far: f32,
        image_width: u32,
        image_height: u32,
    ) -> bool {
        let resolution_changed = self.image_width != image_width || self.image_height != image_height;

        self.position = world_position;
        self.image_width = image_width;
        self.image_height = image_height;
        self.aperture_radius = aperture_radius;
        self.exposure = exposure;

        let rotation_inv = Mat4::from_quat(world_rotation.inverse());
        let translate = Mat4::from_translation(-world_position);
        self.view_matrix = z_up_to_y_up() * rotation_inv * translate;

        let aspect = image_width as f32 / image_height.max(1) as f32;
        let fov_rad = vertical_fov_deg.to_radians();
        self.projection_matrix = perspective_reverse_y(fov_rad, aspect, near, far);
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;

        let half_height = focus_distance * (fov_rad * 0.5).tan();
        let half_width = half_height * aspect;
        let forward = (world_rotation * Vec3::Y).normalize_or_zero();
        let right = (world_rotation * Vec3::X).normalize_or_zero();
        let up = (world_rotation * Vec3::Z).normalize_or_zero();
        let center = world_position + forward * focus_distance;
        self.max_u = right * (2.0 * half_width);
        self.max_v = up * (2.0 * half_height);
        self.lower_left = center - self.max_u * 0.5 - self.max_v * 0.5;

        if transform_dirty || resolution_changed {
            self.pixels_dirty = true;
        }
        if self.pixels_dirty {
            self.sample_count = 0;
        }
        self.pixels_dirty
    }

    /// Advances the accumulated sample count by `added`, capped at
    /// `max_sample_per_pixel`. Called once per renderer tick after a
    /// successful accumulation pass.
    pub fn advance_samples(&mut self, added: u32, max_sample_per_pixel: u32) {
        self.sample_count = (self.sample_count + added).min(max_sample_per_pixel);
        self.pixels_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_dirty_resets_sample_count() {
        let config = RenderConfig::default();
        let mut proxy = CameraRenderProxy::new(&config);
        proxy.sample_count = 40;
        proxy.pixels_dirty = false;

        proxy.update(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::IDENTITY,
            true,
            60.0,
            10.0,
            0.0,
            1.0,
            0.1,
            1000.0,
            1280,
            720,
        );

        assert!(proxy.pixels_dirty);
        assert_eq!(proxy.sample_count, 0);
    }

    #[test]
    fn advance_samples_caps_at_max() {
        let config = RenderConfig::default();
        let mut proxy = CameraRenderProxy::new(&config);
        proxy.advance_samples(300, 256);
        assert_eq!(proxy.sample_count, 256);
    }
}

//! Render-thread mirrors of the two light kinds (`SPEC_FULL.md` §4.D).

use ember_core::math::{FRONT, UP};
use glam::{Mat4, Vec3};

/// Sky / image-based-lighting environment. Brightness is clamped
/// separately for the directly-visible sky (seen through camera rays)
/// and for IBL irradiance/specular contributions, matching the original
/// engine's two distinct clamp constants (`SPEC_FULL.md` §2.1).
pub struct SkyRenderProxy {
    pub env_map: Option<ember_scene::TextureSlot>,
    pub intensity: f32,
}

impl SkyRenderProxy {
    pub const MAX_BRIGHTNESS: f32 = 100.0;
    pub const MAX_IBL_BRIGHTNESS: f32 = 10.0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            env_map: None,
            intensity: 1.0,
        }
    }

    pub fn update(&mut self, env_map: Option<ember_scene::TextureSlot>, intensity: f32) {
        self.env_map = env_map;
        self.intensity = intensity;
    }

    /// Clamps a directly-visible sky sample.
    #[must_use]
    pub fn clamp_sky(&self, radiance: Vec3) -> Vec3 {
        radiance.min(Vec3::splat(Self::MAX_BRIGHTNESS))
    }

    /// Clamps an IBL irradiance/specular sample.
    #[must_use]
    pub fn clamp_ibl(&self, radiance: Vec3) -> Vec3 {
        radiance.min(Vec3::splat(Self::MAX_IBL_BRIGHTNESS))
    }
}

impl Default for SkyRenderProxy {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DirectionalLightRenderProxy {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub shadow_view_matrix: Mat4,
    pub shadow_projection_matrix: Mat4,
    pub shadow_view_projection_matrix: Mat4,
}

impl DirectionalLightRenderProxy {
    pub const SHADOW_DEPTH_BIAS: f32 = 1e-6;
    pub const SHADOW_NORMAL_BIAS: f32 = 1e-3;
    pub const SHADOW_FRUSTUM_HALF_EXTENT: f32 = 10.0;
    pub const SHADOW_NEAR: f32 = 0.1;
    pub const SHADOW_FAR: f32 = 1000.0;
    pub const SHADOW_VIEW_WIDTH: f32 = 20.0;
    pub const SHADOW_VIEW_HEIGHT: f32 = 20.0;

    #[must_use]
    pub fn new() -> Self {
        let direction = default_direction();
        let mut proxy = Self {
            direction,
            color: Vec3::ONE,
            intensity: 1.0,
            shadow_view_matrix: Mat4::IDENTITY,
            shadow_projection_matrix: Mat4::IDENTITY,
            shadow_view_projection_matrix: Mat4::IDENTITY,
        };
        proxy.rebuild_shadow_matrices();
        proxy
    }

    pub fn update(&mut self, direction: Vec3, color: Vec3, intensity: f32) {
        self.direction = direction.normalize_or_zero();
        self.color = color;
        self.intensity = intensity;
        self.rebuild_shadow_matrices();
    }

    /// Builds an orthographic shadow matrix from the fixed frustum around
    /// the light's direction, looking toward the origin from far along
    /// `-direction` (`SPEC_FULL.md` §4.D).
    fn rebuild_shadow_matrices(&mut self) {
        let world_up = if self.direction.abs_diff_eq(UP, 1e-3) || self.direction.abs_diff_eq(-UP, 1e-3) {
            FRONT
        } else {
            UP
        };
        let eye = -self.direction * Self::SHADOW_FRUSTUM_HALF_EXTENT * 10.0;
        self.shadow_view_matrix = Mat4::look_at_rh(eye, Vec3::ZERO, world_up);

        let half_w = Self::SHADOW_VIEW_WIDTH * 0.5;
        let half_h = Self::SHADOW_VIEW_HEIGHT * 0.5;
        self.shadow_projection_matrix =
            Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, Self::SHADOW_NEAR, Self::SHADOW_FAR);
        self.shadow_view_projection_matrix = self.shadow_projection_matrix * self.shadow_view_matrix;
    }
}

impl Default for DirectionalLightRenderProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// `(0, cos 20°, sin 45°)`, the original engine's default directional
/// light direction (`SPEC_FULL.md` §2.1), normalized.
fn default_direction() -> Vec3 {
    Vec3::new(0.0, 20f32.to_radians().cos(), 45f32.to_radians().sin()).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_clamps_use_distinct_limits() {
        let sky = SkyRenderProxy::new();
        let hot = Vec3::splat(1000.0);
        assert_eq!(sky.clamp_sky(hot), Vec3::splat(SkyRenderProxy::MAX_BRIGHTNESS));
        assert_eq!(sky.clamp_ibl(hot), Vec3::splat(SkyRenderProxy::MAX_IBL_BRIGHTNESS));
    }

    #[test]
    fn default_direction_is_unit_length() {
        let light = DirectionalLightRenderProxy::new();
        assert!((light.direction.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn shadow_view_matrix_looks_toward_origin() {
        let light = DirectionalLightRenderProxy::new();
        let eye = light.shadow_view_matrix.inverse().transform_point3(Vec3::ZERO);
        assert!((eye.normalize() + light.direction.normalize()).length() < 1e-3);
    }
}

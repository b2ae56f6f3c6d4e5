use glam::Vec2;
use glam::Vec3;

/// The closest hit found so far during a BVH/TLAS query.
///
/// Generic over the primitive handle type `P` so that `ember_core` does not
/// need to know about `ember_accel`'s or `ember_render`'s primitive-id
/// types; `ember_accel` instantiates this as `Intersection<u32>` (a
/// `primitive_index`).
///
/// Ported from `core/math/Intersection.h`.
#[derive(Debug, Clone, Copy)]
pub struct Intersection<P: Copy> {
    t: f32,
    primitive: Option<P>,
    pub world_point: Vec3,
    pub world_normal: Vec3,
    pub world_tangent: Vec3,
    pub uv: Vec2,
}

impl<P: Copy> Intersection<P> {
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            t: f32::MAX,
            primitive: None,
            world_point: Vec3::ZERO,
            world_normal: Vec3::ZERO,
            world_tangent: Vec3::ZERO,
            uv: Vec2::ZERO,
        }
    }

    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.primitive.is_some()
    }

    #[must_use]
    pub fn t(&self) -> f32 {
        self.t
    }

    #[must_use]
    pub fn primitive(&self) -> Option<P> {
        self.primitive
    }

    /// True when `new_t` would improve on the current hit: positive and
    /// either no hit yet or strictly closer.
    #[must_use]
    pub fn is_closer_hit(&self, new_t: f32) -> bool {
        new_t > 0.0 && (!self.is_hit() || new_t < self.t)
    }

    /// Sets `t` and `primitive` only -- used for any-hit queries, which
    /// don't need full shading data.
    pub fn update_hit(&mut self, t: f32, primitive: P) {
        self.t = t;
        self.primitive = Some(primitive);
    }

    /// Sets the full hit record, including shading data. `normal` must be
    /// normalized.
    pub fn update_full(
        &mut self,
        t: f32,
        primitive: P,
        world_point: Vec3,
        world_normal: Vec3,
        world_tangent: Vec3,
        uv: Vec2,
    ) {
        debug_assert!((world_normal.length_squared() - 1.0).abs() < 1e-2);
        self.t = t;
        self.primitive = Some(primitive);
        self.world_point = world_point;
        self.world_normal = world_normal;
        self.world_tangent = world_tangent;
        self.uv = uv;
    }

    pub fn invalidate(&mut self) {
        *self = Self::invalid();
    }

    /// Overwrites just the primitive tag, keeping `t`/shading data as-is.
    /// Used by TLAS traversal to swap a per-primitive placeholder tag for
    /// the primitive's real index in the scene-wide array once the
    /// winning primitive is known.
    pub fn set_primitive(&mut self, primitive: P) {
        self.primitive = Some(primitive);
    }
}

impl<P: Copy> Default for Intersection<P> {
    fn default() -> Self {
        Self::invalid()
    }
}

/// A work-in-progress candidate hit recorded during BVH leaf traversal,
/// before the full shading data has been derived. Mirrors
/// `IntersectionCandidate` in the original.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionCandidate<P: Copy> {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub face_idx: u32,
    pub geometry_normal: Vec3,
    pub primitive: Option<P>,
}

impl<P: Copy> IntersectionCandidate<P> {
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            t: f32::MAX,
            u: 0.0,
            v: 0.0,
            face_idx: 0,
            geometry_normal: Vec3::ZERO,
            primitive: None,
        }
    }

    #[must_use]
    pub fn is_closer_hit(&self, new_t: f32) -> bool {
        new_t > 0.0 && new_t < self.t
    }
}

impl<P: Copy> Default for IntersectionCandidate<P> {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closer_hit_logic() {
        let mut hit: Intersection<u32> = Intersection::invalid();
        assert!(!hit.is_hit());
        assert!(hit.is_closer_hit(5.0));
        hit.update_hit(5.0, 3);
        assert!(hit.is_hit());
        assert!(!hit.is_closer_hit(6.0));
        assert!(hit.is_closer_hit(2.0));
        assert!(!hit.is_closer_hit(-1.0));
    }
}

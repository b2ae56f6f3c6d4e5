use glam::Vec3;

use super::Transform;

/// Axis-aligned bounding box stored as center + half-size.
///
/// Ported from `core/math/AABB.h` in the original engine: a half-size with
/// any negative component marks the box invalid (the empty box), which is
/// how an accumulating union starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    center: Vec3,
    half_size: Vec3,
}

impl Aabb {
    /// An invalid (empty) box, suitable as the starting point of a union.
    pub const INVALID: Self = Self {
        center: Vec3::ZERO,
        half_size: Vec3::splat(-1.0),
    };

    #[must_use]
    pub fn from_center_half_size(center: Vec3, half_size: Vec3) -> Self {
        Self { center, half_size }
    }

    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_size: (max - min) * 0.5,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.half_size.x >= 0.0 && self.half_size.y >= 0.0 && self.half_size.z >= 0.0
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[must_use]
    pub fn half_size(&self) -> Vec3 {
        self.half_size
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.half_size * 2.0
    }

    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.half_size
    }

    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.half_size
    }

    #[must_use]
    pub fn contains_point(&self, p: Vec3) -> bool {
        let min = self.min();
        let max = self.max();
        p.x >= min.x - super::super::TOLERANCE
            && p.y >= min.y - super::super::TOLERANCE
            && p.z >= min.z - super::super::TOLERANCE
            && p.x <= max.x + super::super::TOLERANCE
            && p.y <= max.y + super::super::TOLERANCE
            && p.z <= max.z + super::super::TOLERANCE
    }

    /// AABB-AABB overlap test.
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();
        a_min.x <= b_max.x
            && a_max.x >= b_min.x
            && a_min.y <= b_max.y
            && a_max.y >= b_min.y
            && a_min.z <= b_max.z
            && a_max.z >= b_min.z
    }

    /// Transforms this box by `transform`, using the eight-corner method:
    /// transform every corner and min/max-reduce. Matches
    /// `AABB::TransformTo` in the original engine.
    #[must_use]
    pub fn transform_to(&self, transform: &Transform) -> Aabb {
        if !self.is_valid() {
            return *self;
        }
        let min = self.min();
        let max = self.max();
        let mut out_min = Vec3::splat(f32::MAX);
        let mut out_max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let world = transform.transform_point(corner);
            out_min = out_min.min(world);
            out_max = out_max.max(world);
        }
        Aabb::from_min_max(out_min, out_max)
    }

    /// Union of two boxes; an invalid operand is skipped, matching
    /// `AABB::operator+` in the original.
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        Aabb::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    pub fn union_with(&mut self, other: &Aabb) {
        *self = self.union(other);
    }

    /// Surface area, used by the SAH build in `ember_accel`.
    #[must_use]
    pub fn surface_area(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_union_yields_other() {
        let a = Aabb::INVALID;
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let u = a.union(&b);
        assert_eq!(u, b);
    }

    #[test]
    fn union_contains_both() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(0.5));
        let u = a.union(&b);
        for corner in [a.min(), a.max(), b.min(), b.max()] {
            assert!(u.contains_point(corner));
        }
    }

    #[test]
    fn transform_to_contains_all_corners() {
        let b = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let mut t = Transform::new();
        t.position = Vec3::new(5.0, 0.0, 0.0);
        t.update_if_dirty();
        let transformed = b.transform_to(&t);
        let min = b.min();
        let max = b.max();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let world = t.transform_point(corner);
            assert!(transformed.contains_point(world));
        }
    }
}

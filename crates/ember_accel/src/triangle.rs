//! Per-triangle precomputed data and the Möller–Trumbore ray-triangle
//! test (`SPEC_FULL.md` §4.C).

use ember_core::Ray;
use glam::Vec3;

/// `(p0, e1, e2, n)` precomputed once at BLAS build time so traversal never
/// re-derives edge vectors per ray.
#[derive(Debug, Clone, Copy)]
pub struct PackedTriangle {
    pub p0: Vec3,
    pub e1: Vec3,
    pub e2: Vec3,
    pub n: Vec3,
}

impl PackedTriangle {
    #[must_use]
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let n = e1.cross(e2).normalize_or_zero();
        Self { p0, e1, e2, n }
    }

    #[must_use]
    pub fn centroid(&self) -> Vec3 {
        (self.p0 + (self.p0 + self.e1) + (self.p0 + self.e2)) / 3.0
    }

    #[must_use]
    pub fn bounds(&self) -> ember_core::Aabb {
        let p1 = self.p0 + self.e1;
        let p2 = self.p0 + self.e2;
        let min = self.p0.min(p1).min(p2);
        let max = self.p0.max(p1).max(p2);
        ember_core::Aabb::from_min_max(min, max)
    }

    /// Möller–Trumbore intersection. Returns `(t, u, v)` on a hit within
    /// `(t_min, t_max)`, barycentric `w = 1 - u - v`.
    #[must_use]
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 1e-8;
        let pvec = ray.direction.cross(self.e2);
        let det = self.e1.dot(pvec);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = ray.origin - self.p0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(self.e1);
        let v = ray.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.e2.dot(qvec) * inv_det;
        if t < t_min || t > t_max {
            return None;
        }
        Some((t, u, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_xy_triangle() -> PackedTriangle {
        PackedTriangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn straight_on_hit_recovers_expected_t() {
        let tri = unit_xy_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = tri.intersect(&ray, 0.0, f32::MAX).expect("should hit");
        assert!((hit.0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn miss_outside_triangle_returns_none() {
        let tri = unit_xy_triangle();
        let ray = Ray::new(Vec3::new(5.0, 5.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(tri.intersect(&ray, 0.0, f32::MAX).is_none());
    }

    #[test]
    fn parallel_ray_returns_none() {
        let tri = unit_xy_triangle();
        let ray = Ray::new(Vec3::new(0.1, 0.1, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(tri.intersect(&ray, 0.0, f32::MAX).is_none());
    }

    #[test]
    fn t_outside_range_is_rejected() {
        let tri = unit_xy_triangle();
        let ray = Ray::new(Vec3::new(0.1, 0.1, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(tri.intersect(&ray, 0.0, 0.5).is_none());
        assert!(tri.intersect(&ray, 0.0, 2.0).is_some());
    }
}

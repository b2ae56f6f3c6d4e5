//! Render-thread mirror of an analytic sphere primitive
//! (`SPEC_FULL.md` §4.D).

use ember_core::{Aabb, Intersection, IntersectionCandidate, Ray};
use glam::{Vec2, Vec3};

pub struct SphereRenderProxy {
    pub center: Vec3,
    /// The squared radius after scale is applied, so the quadratic test
    /// avoids a `sqrt` on the hot path.
    pub radius_squared: f32,
    pub radius: f32,
    pub material_id: u32,
}

impl SphereRenderProxy {
    #[must_use]
    pub fn new(center: Vec3, scaled_radius: f32, material_id: u32) -> Self {
        Self {
            center,
            radius_squared: scaled_radius * scaled_radius,
            radius: scaled_radius,
            material_id,
        }
    }

    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        Aabb::from_center_half_size(self.center, Vec3::splat(self.radius))
    }

    /// Analytic ray/sphere quadratic; returns the nearer of the two roots
    /// that lies within `(t_min, *best_t)`, if any.
    fn solve(&self, ray: &Ray, t_min: f32, best_t: f32) -> Option<f32> {
        let oc = ray.origin - self.center;
        let b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius_squared;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        for t in [-b - sqrt_d, -b + sqrt_d] {
            if t > t_min && t < best_t {
                return Some(t);
            }
        }
        None
    }

    pub fn intersect_closest(&self, ray: &Ray, t_min: f32, candidate: &mut IntersectionCandidate<u32>) {
        if let Some(t) = self.solve(ray, t_min, candidate.t) {
            candidate.t = t;
            candidate.primitive = Some(0);
        }
    }

    #[must_use]
    pub fn intersect_any(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.solve(ray, t_min, t_max).is_some()
    }

    pub fn fill_intersection(&self, ray: &Ray, candidate: &IntersectionCandidate<u32>, out: &mut Intersection<u32>) {
        let point = ray.at(candidate.t);
        let normal = (point - self.center).normalize();
        let tangent = major_axis_orthogonal_to(normal);
        let uv = sphere_uv(normal);
        out.update_full(candidate.t, 0, point, normal, tangent, uv);
    }
}

/// Picks whichever world axis is least aligned with `normal` and returns
/// its component orthogonal to `normal`, giving a stable tangent
/// direction with no preferred seam beyond the one induced by the axis
/// choice itself (`SPEC_FULL.md` §4.D: "any vector orthogonal to the
/// normal, choosing a possible major axis not parallel to it").
fn major_axis_orthogonal_to(normal: Vec3) -> Vec3 {
    let axis = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    (axis - normal * normal.dot(axis)).normalize()
}

fn sphere_uv(normal: Vec3) -> Vec2 {
    let u = 0.5 + normal.z.atan2(normal.x) / (2.0 * std::f32::consts::PI);
    let v = 0.5 - normal.y.asin() / std::f32::consts::PI;
    Vec2::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_hit_picks_near_side_of_sphere() {
        let sphere = SphereRenderProxy::new(Vec3::new(0.0, 5.0, 0.0), 1.0, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let mut candidate = IntersectionCandidate::<u32>::invalid();
        sphere.intersect_closest(&ray, 0.0, &mut candidate);
        assert!((candidate.t - 4.0).abs() < 1e-4);
    }

    #[test]
    fn shading_normal_points_away_from_center() {
        let sphere = SphereRenderProxy::new(Vec3::ZERO, 2.0, 0);
        let ray = Ray::new(Vec3::new(0.0, -10.0, 0.0), Vec3::Y);
        let mut candidate = IntersectionCandidate::<u32>::invalid();
        sphere.intersect_closest(&ray, 0.0, &mut candidate);
        let mut hit = Intersection::invalid();
        sphere.fill_intersection(&ray, &candidate, &mut hit);
        assert!((hit.world_normal - Vec3::NEG_Y).length() < 1e-4);
        assert!(hit.world_tangent.dot(hit.world_normal).abs() < 1e-4);
    }

    #[test]
    fn tangent_is_orthogonal_to_normal_everywhere() {
        let sphere = SphereRenderProxy::new(Vec3::ZERO, 1.0, 0);
        for n in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 1.0, 1.0).normalize()] {
            let t = major_axis_orthogonal_to(n);
            assert!(t.dot(n).abs() < 1e-4);
        }
    }
}

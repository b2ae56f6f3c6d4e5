//! Scene-wide top-level acceleration structure: a binned-SAH BVH over
//! primitives' world-space bounding boxes, decoupled from `ember_render`'s
//! concrete primitive types via the [`TlasPrimitive`] trait
//! (`SPEC_FULL.md` §4.C).

use ember_core::{Aabb, Intersection, IntersectionCandidate, Ray};

use crate::bvh::{Bvh, BvhNodeKind};

/// What the TLAS needs from a scene primitive to traverse it. `ember_accel`
/// never stores primitives itself -- they are passed in as a slice on each
/// query, so this crate has no dependency on `ember_render`.
pub trait TlasPrimitive {
    fn world_aabb(&self) -> Aabb;

    /// Tests this primitive against `ray`, updating `candidate` in place if
    /// a closer hit (within `(t_min, candidate.t)`) is found.
    fn intersect_closest(&self, ray: &Ray, t_min: f32, candidate: &mut IntersectionCandidate<u32>);

    /// Tests this primitive for any hit within `(t_min, t_max)`.
    fn intersect_any(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool;

    /// Fills a full [`Intersection`] from a candidate already known to
    /// belong to this primitive (shading normal, uv, world point/tangent).
    fn fill_intersection(&self, ray: &Ray, candidate: &IntersectionCandidate<u32>, out: &mut Intersection<u32>);
}

/// Scene-wide acceleration structure built from the world AABBs of
/// `count` primitives. Rebuilding is the caller's responsibility whenever
/// the primitive set or any transform changes; `ember_render`'s
/// `need_bvh_update` flag (§4.D) gates when that happens.
pub struct Tlas {
    bvh: Bvh,
}

impl Tlas {
    /// Builds (or rebuilds) the TLAS from `count` primitives' world AABBs.
    pub fn build(count: u32, aabb_of: impl Fn(u32) -> Aabb) -> Self {
        let bvh = Bvh::build(count, aabb_of);
        Self { bvh }
    }

    #[must_use]
    pub fn world_bounds(&self) -> Aabb {
        self.bvh.root_bounds()
    }

    /// Closest-hit traversal against `primitives`, which must be the same
    /// slice (same length, same order) the TLAS was built from.
    #[must_use]
    pub fn closest_hit<P: TlasPrimitive>(&self, ray: &Ray, primitives: &[P]) -> Intersection<u32> {
        let mut candidate = IntersectionCandidate::<u32>::invalid();
        let mut winner = None;
        self.walk_closest(ray, primitives, &mut candidate, &mut winner);

        let mut out = Intersection::invalid();
        if let Some(index) = winner {
            primitives[index as usize].fill_intersection(ray, &candidate, &mut out);
            out.set_primitive(index);
        }
        out
    }

    /// Any-hit (shadow-ray-style) traversal against `primitives`.
    #[must_use]
    pub fn any_hit<P: TlasPrimitive>(&self, ray: &Ray, t_min: f32, t_max: f32, primitives: &[P]) -> bool {
        if self.bvh.nodes.is_empty() {
            return false;
        }
        let mut stack = smallvec::SmallVec::<[u32; 64]>::new();
        stack.push(0);
        while let Some(node_index) = stack.pop() {
            let node = &self.bvh.nodes[node_index as usize];
            if !aabb_overlaps_ray(&node.bounds, ray, t_min, t_max) {
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { first, count } => {
                    for slot in first..first + count {
                        let prim_index = self.bvh.order[slot as usize];
                        if primitives[prim_index as usize].intersect_any(ray, t_min, t_max) {
                            return true;
                        }
                    }
                }
                BvhNodeKind::Interior { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        false
    }

    /// Walks the BVH accumulating the closest hit into `candidate`, and
    /// separately tracks which primitive produced it in `winner`.
    ///
    /// Primitive implementations have no way to stamp their own index into
    /// `candidate.primitive` (the trait doesn't hand them one), so instead
    /// of trusting that field we compare `candidate.t` before and after
    /// each call: whichever primitive last improved it is the winner.
    fn walk_closest<P: TlasPrimitive>(
        &self,
        ray: &Ray,
        primitives: &[P],
        candidate: &mut IntersectionCandidate<u32>,
        winner: &mut Option<u32>,
    ) {
        if self.bvh.nodes.is_empty() {
            return;
        }
        let mut stack = smallvec::SmallVec::<[u32; 64]>::new();
        stack.push(0);
        while let Some(node_index) = stack.pop() {
            let node = &self.bvh.nodes[node_index as usize];
            if !aabb_overlaps_ray(&node.bounds, ray, 0.0, candidate.t) {
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { first, count } => {
                    for slot in first..first + count {
                        let prim_index = self.bvh.order[slot as usize];
                        let prev_t = candidate.t;
                        primitives[prim_index as usize].intersect_closest(ray, 0.0, candidate);
                        if candidate.t < prev_t {
                            *winner = Some(prim_index);
                        }
                    }
                }
                BvhNodeKind::Interior { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }
}

fn aabb_overlaps_ray(bounds: &Aabb, ray: &Ray, t_min: f32, t_max: f32) -> bool {
    if !bounds.is_valid() {
        return false;
    }
    let inv_dir = glam::Vec3::new(1.0 / ray.direction.x, 1.0 / ray.direction.y, 1.0 / ray.direction.z);
    let t0 = (bounds.min() - ray.origin) * inv_dir;
    let t1 = (bounds.max() - ray.origin) * inv_dir;
    let tsmaller = t0.min(t1);
    let tbigger = t0.max(t1);
    let tmin = t_min.max(tsmaller.x.max(tsmaller.y).max(tsmaller.z));
    let tmax = t_max.min(tbigger.x.min(tbigger.y).min(tbigger.z));
    tmin <= tmax
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// A sphere primitive, just enough to exercise the TLAS generically
    /// without pulling in `ember_render`.
    struct TestSphere {
        center: Vec3,
        radius: f32,
    }

    impl TlasPrimitive for TestSphere {
        fn world_aabb(&self) -> Aabb {
            Aabb::from_center_half_size(self.center, Vec3::splat(self.radius))
        }

        fn intersect_closest(&self, ray: &Ray, t_min: f32, candidate: &mut IntersectionCandidate<u32>) {
            let oc = ray.origin - self.center;
            let b = oc.dot(ray.direction);
            let c = oc.length_squared() - self.radius * self.radius;
            let disc = b * b - c;
            if disc < 0.0 {
                return;
            }
            let t = -b - disc.sqrt();
            if candidate.is_closer_hit(t) && t >= t_min {
                candidate.t = t;
                candidate.primitive = Some(0);
            }
        }

        fn intersect_any(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
            let mut candidate = IntersectionCandidate::<u32>::invalid();
            candidate.t = t_max;
            self.intersect_closest(ray, t_min, &mut candidate);
            candidate.primitive.is_some()
        }

        fn fill_intersection(&self, ray: &Ray, candidate: &IntersectionCandidate<u32>, out: &mut Intersection<u32>) {
            let point = ray.at(candidate.t);
            let normal = (point - self.center).normalize();
            out.update_full(candidate.t, 0, point, normal, Vec3::ZERO, glam::Vec2::ZERO);
        }
    }

    fn two_spheres() -> Vec<TestSphere> {
        vec![
            TestSphere {
                center: Vec3::new(0.0, 5.0, 0.0),
                radius: 1.0,
            },
            TestSphere {
                center: Vec3::new(0.0, 10.0, 0.0),
                radius: 1.0,
            },
        ]
    }

    #[test]
    fn closest_hit_finds_the_nearer_sphere() {
        let spheres = two_spheres();
        let tlas = Tlas::build(spheres.len() as u32, |i| spheres[i as usize].world_aabb());
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let hit = tlas.closest_hit(&ray, &spheres);
        assert!(hit.is_hit());
        assert!((hit.t() - 4.0).abs() < 1e-3, "expected t=4, got {}", hit.t());
    }

    #[test]
    fn any_hit_agrees_with_closest_hit_existence() {
        let spheres = two_spheres();
        let tlas = Tlas::build(spheres.len() as u32, |i| spheres[i as usize].world_aabb());
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let closest = tlas.closest_hit(&ray, &spheres);
        let any = tlas.any_hit(&ray, 0.0, f32::MAX, &spheres);
        assert_eq!(closest.is_hit(), any);
    }

    #[test]
    fn removing_a_primitive_from_the_scene_cannot_improve_the_closest_hit() {
        let spheres = two_spheres();
        let tlas_both = Tlas::build(spheres.len() as u32, |i| spheres[i as usize].world_aabb());
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let hit_both = tlas_both.closest_hit(&ray, &spheres);

        let subset = vec![spheres.into_iter().nth(1).unwrap()];
        let tlas_subset = Tlas::build(subset.len() as u32, |i| subset[i as usize].world_aabb());
        let hit_subset = tlas_subset.closest_hit(&ray, &subset);

        assert!(hit_subset.t() >= hit_both.t());
    }
}

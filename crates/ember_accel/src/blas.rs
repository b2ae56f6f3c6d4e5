//! Per-mesh bottom-level acceleration structure: a binned-SAH BVH over a
//! single mesh's triangles, traversed in mesh-local space
//! (`SPEC_FULL.md` §4.C).

use ember_core::{IntersectionCandidate, Ray};
use glam::Vec3;

use crate::bvh::{Bvh, BvhNodeKind};
use crate::error::{AccelError, Result};
use crate::triangle::PackedTriangle;

/// Result of a BLAS query: local-space `t` plus barycentrics and the face
/// index within this mesh. No scene-level primitive id -- the BLAS doesn't
/// know it; the caller (TLAS traversal) fills that in.
#[derive(Debug, Clone, Copy)]
pub struct BlasHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub face_idx: u32,
    pub geometry_normal: Vec3,
}

pub struct Blas {
    triangles: Vec<PackedTriangle>,
    bvh: Bvh,
}

impl Blas {
    /// Builds a BLAS from a flat vertex buffer and a triangle index list
    /// (3 indices per triangle). `SPEC_FULL.md` §4.C: a mesh with no
    /// triangles, or an out-of-range index, is a fatal logic error.
    pub fn build(positions: &[Vec3], indices: &[u32]) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(AccelError::InvalidMesh(format!(
                "triangle index count must be a positive multiple of 3, got {}",
                indices.len()
            )));
        }
        let triangle_count = indices.len() / 3;
        let mut triangles = Vec::with_capacity(triangle_count);
        for tri in indices.chunks_exact(3) {
            let get = |i: u32| -> Result<Vec3> {
                positions.get(i as usize).copied().ok_or_else(|| {
                    AccelError::InvalidMesh(format!("triangle index {i} out of range"))
                })
            };
            let p0 = get(tri[0])?;
            let p1 = get(tri[1])?;
            let p2 = get(tri[2])?;
            triangles.push(PackedTriangle::new(p0, p1, p2));
        }

        let bvh = Bvh::build(triangle_count as u32, |i| triangles[i as usize].bounds());

        Ok(Self { triangles, bvh })
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn local_bounds(&self) -> ember_core::Aabb {
        self.bvh.root_bounds()
    }

    /// Closest-hit traversal. `local_ray` must already be in mesh-local
    /// space; callers get there via `Ray::inverse_transformed_by`.
    #[must_use]
    pub fn intersect_closest(&self, local_ray: &Ray, t_min: f32, t_max: f32) -> Option<BlasHit> {
        let mut candidate = IntersectionCandidate::<u32>::invalid();
        let mut best_t = t_max;
        self.walk(local_ray, t_min, &mut best_t, &mut |tri_index, t, u, v| {
            candidate.t = t;
            candidate.u = u;
            candidate.v = v;
            candidate.face_idx = tri_index;
            candidate.geometry_normal = self.triangles[tri_index as usize].n;
            candidate.primitive = Some(tri_index);
            false
        });
        candidate.primitive.map(|_| BlasHit {
            t: candidate.t,
            u: candidate.u,
            v: candidate.v,
            face_idx: candidate.face_idx,
            geometry_normal: candidate.geometry_normal,
        })
    }

    /// Any-hit traversal: stops at the first triangle found within range,
    /// with no guarantee on which one (`SPEC_FULL.md` §8 scenario 5).
    #[must_use]
    pub fn intersect_any(&self, local_ray: &Ray, t_min: f32, t_max: f32) -> bool {
        let mut found = false;
        let mut best_t = t_max;
        self.walk(local_ray, t_min, &mut best_t, &mut |_, _, _, _| {
            found = true;
            true
        });
        found
    }

    /// Shared BVH descent. `on_hit(face_idx, t, u, v) -> stop_early` is
    /// invoked per candidate triangle hit closer than `*best_t`; when it
    /// returns `true` traversal halts immediately (any-hit mode).
    fn walk(
        &self,
        local_ray: &Ray,
        t_min: f32,
        best_t: &mut f32,
        on_hit: &mut dyn FnMut(u32, f32, f32, f32) -> bool,
    ) {
        let mut stack = smallvec::SmallVec::<[u32; 64]>::new();
        if self.bvh.nodes.is_empty() {
            return;
        }
        stack.push(0);
        while let Some(node_index) = stack.pop() {
            let node = &self.bvh.nodes[node_index as usize];
            if !aabb_hit(&node.bounds, local_ray, t_min, *best_t) {
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { first, count } => {
                    for slot in first..first + count {
                        let tri_index = self.bvh.order[slot as usize];
                        let tri = &self.triangles[tri_index as usize];
                        if let Some((t, u, v)) = tri.intersect(local_ray, t_min, *best_t) {
                            let stop = on_hit(tri_index, t, u, v);
                            *best_t = t.min(*best_t);
                            if stop {
                                return;
                            }
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

/// Slab-test ray/AABB intersection, used to cull BVH nodes during descent.
fn aabb_hit(bounds: &ember_core::Aabb, ray: &Ray, t_min: f32, t_max: f32) -> bool {
    if !bounds.is_valid() {
        return false;
    }
    let inv_dir = Vec3::new(1.0 / ray.direction.x, 1.0 / ray.direction.y, 1.0 / ray.direction.z);
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

    fn two_stacked_triangles() -> Blas {
        // Two axis-aligned triangles at y=1 and y=2, matching the
        // scenario used for closest-hit/any-hit comparison.
        let positions = vec![
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(-1.0, 2.0, -1.0),
            Vec3::new(1.0, 2.0, -1.0),
            Vec3::new(0.0, 2.0, 1.0),
        ];
        let indices = vec![0, 1, 2, 3, 4, 5];
        Blas::build(&positions, &indices).unwrap()
    }

    #[test]
    fn build_rejects_non_multiple_of_three_indices() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(Blas::build(&positions, &[0, 1]).is_err());
    }

    #[test]
    fn build_rejects_out_of_range_index() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(Blas::build(&positions, &[0, 1, 9]).is_err());
    }

    #[test]
    fn closest_hit_picks_the_nearer_triangle() {
        let blas = two_stacked_triangles();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let hit = blas.intersect_closest(&ray, 0.0, f32::MAX).expect("should hit");
        assert!((hit.t - 1.0).abs() < 1e-4, "expected t=1, got {}", hit.t);
    }

    #[test]
    fn any_hit_agrees_with_closest_hit_on_hit_existence() {
        let blas = two_stacked_triangles();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let closest = blas.intersect_closest(&ray, 0.0, f32::MAX);
        let any = blas.intersect_any(&ray, 0.0, f32::MAX);
        assert_eq!(closest.is_some(), any);
    }

    #[test]
    fn miss_when_ray_points_away() {
        let blas = two_stacked_triangles();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Y);
        assert!(blas.intersect_closest(&ray, 0.0, f32::MAX).is_none());
        assert!(!blas.intersect_any(&ray, 0.0, f32::MAX));
    }
}

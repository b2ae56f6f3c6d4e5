//! Raw mesh data (`SPEC_FULL.md` §3 "Mesh"): the CPU-side geometry a
//! `MeshRenderProxy` uploads and a `Blas` is built from.

use ember_core::Aabb;
use glam::{Vec2, Vec3};
use slotmap::new_key_type;

new_key_type! {
    /// Strongly-typed handle for raw mesh resources, shared across
    /// however many `Mesh` components reference the same geometry.
    pub struct MeshHandle;
}

/// Per-vertex attributes, packed the way `MeshRenderProxy` uploads them:
/// a unit normal, a tangent with its handedness sign in `w`, and a uv.
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub normal: Vec3,
    /// xyz: tangent direction, w: handedness sign (+1/-1), used to
    /// reconstruct the bitangent in tangent-space shading.
    pub tangent: glam::Vec4,
    pub uv: Vec2,
}

pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub attributes: Vec<VertexAttribute>,
    pub indices: Vec<u32>,
    local_aabb: Aabb,
}

impl Mesh {
    /// Builds a mesh and derives its local AABB from `positions`.
    ///
    /// # Panics
    /// Panics if `attributes.len() != positions.len()` or `indices.len()`
    /// is not a multiple of 3 -- a malformed mesh is a fatal logic error
    /// (`SPEC_FULL.md` §7), caught here rather than deferred to BLAS build.
    #[must_use]
    pub fn new(positions: Vec<Vec3>, attributes: Vec<VertexAttribute>, indices: Vec<u32>) -> Self {
        assert_eq!(
            positions.len(),
            attributes.len(),
            "mesh vertex attribute count must match position count"
        );
        assert_eq!(indices.len() % 3, 0, "mesh index count must be a multiple of 3");

        let local_aabb = positions
            .iter()
            .fold(Aabb::INVALID, |acc, &p| acc.union(&Aabb::from_center_half_size(p, Vec3::ZERO)));

        Self {
            positions,
            attributes,
            indices,
            local_aabb,
        }
    }

    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tri() -> Mesh {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let attr = VertexAttribute {
            normal: Vec3::Z,
            tangent: glam::Vec4::new(1.0, 0.0, 0.0, 1.0),
            uv: Vec2::ZERO,
        };
        Mesh::new(positions, vec![attr; 3], vec![0, 1, 2])
    }

    #[test]
    fn local_aabb_contains_all_vertices() {
        let mesh = unit_tri();
        for p in &mesh.positions {
            assert!(mesh.local_aabb().contains_point(*p));
        }
    }

    #[test]
    #[should_panic(expected = "multiple of 3")]
    fn bad_index_count_panics() {
        Mesh::new(vec![Vec3::ZERO], vec![VertexAttribute { normal: Vec3::Z, tangent: glam::Vec4::ZERO, uv: Vec2::ZERO }], vec![0, 1]);
    }
}

//! Render-thread mirror of a mesh primitive (`SPEC_FULL.md` §4.D).
//!
//! Owns the per-mesh BLAS (CPU: an `ember_accel::Blas` built once over
//! the raw mesh; GPU-RT: an RHI BLAS descriptor) plus the cached
//! world/inverse transform used to bring incoming world-space rays into
//! mesh-local space for traversal.

use ember_accel::Blas;
use ember_core::{Aabb, Intersection, IntersectionCandidate, Ray, Transform};
use ember_rhi::arena::ResourceId;
use ember_rhi::resource::Buffer;
use ember_scene::{Mesh, VertexAttribute};
use glam::{Mat4, Vec2, Vec3};

/// Per-mesh uniform uploaded alongside the vertex/index buffers.
#[derive(Debug, Clone, Copy)]
pub struct MeshUniform {
    pub model_matrix: Mat4,
    pub inverse_transpose_model_matrix: Mat4,
}

pub struct MeshRenderProxy {
    pub material_id: u32,
    pub vertex_buffer: Option<ResourceId<Buffer>>,
    pub index_buffer: Option<ResourceId<Buffer>>,
    pub attribute_buffer: Option<ResourceId<Buffer>>,
    pub uniform: MeshUniform,

    local_bvh: Option<Blas>,
    gpu_blas: Option<ResourceId<ember_rhi::resource::Blas>>,
    world: Transform,

    /// Cloned from the scene's `Mesh` on first `update`; the render-thread
    /// mirror never holds a live back-reference into the scene
    /// (`SPEC_FULL.md` §2.1 "Scene... SceneRenderProxy holds only raw
    /// pointers/ids, never live references back"), so shading needs its
    /// own copy of whatever raw attribute data it reads per hit.
    shading_indices: Vec<u32>,
    shading_attributes: Vec<VertexAttribute>,
}

impl MeshRenderProxy {
    #[must_use]
    pub fn new(material_id: u32) -> Self {
        Self {
            material_id,
            vertex_buffer: None,
            index_buffer: None,
            attribute_buffer: None,
            uniform: MeshUniform {
                model_matrix: Mat4::IDENTITY,
                inverse_transpose_model_matrix: Mat4::IDENTITY,
            },
            local_bvh: None,
            gpu_blas: None,
            world: Transform::new(),
            shading_indices: Vec::new(),
            shading_attributes: Vec::new(),
        }
    }

    /// Builds the CPU BLAS and clones the shading attributes on first call
    /// (the mesh's triangle data never changes afterwards --
    /// `SPEC_FULL.md` §4.C). Subsequent calls only refresh the cached
    /// world transform and per-mesh uniform.
    pub fn update(&mut self, mesh: &Mesh, world_matrix: glam::Affine3A) -> ember_accel::Result<()> {
        if self.local_bvh.is_none() {
            self.local_bvh = Some(Blas::build(&mesh.positions, &mesh.indices)?);
            self.shading_indices = mesh.indices.clone();
            self.shading_attributes = mesh.attributes.clone();
        }
        let (scale, rotation, translation) = world_matrix.to_scale_rotation_translation();
        self.world.position = translation;
        self.world.rotation = rotation;
        self.world.scale = scale;
        self.world.update_if_dirty();

        self.uniform.model_matrix = Mat4::from(world_matrix);
        let inv_transpose = Mat4::from(world_matrix.inverse()).transpose();
        self.uniform.inverse_transpose_model_matrix = inv_transpose;
        Ok(())
    }

    pub fn set_gpu_blas(&mut self, blas: ResourceId<ember_rhi::resource::Blas>) {
        self.gpu_blas = Some(blas);
    }

    #[must_use]
    pub fn gpu_blas(&self) -> Option<ResourceId<ember_rhi::resource::Blas>> {
        self.gpu_blas
    }

    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        self.local_bvh
            .as_ref()
            .map_or(Aabb::INVALID, |b| b.local_bounds().transform_to(&self.world))
    }

    pub fn intersect_closest(&self, ray: &Ray, t_min: f32, candidate: &mut IntersectionCandidate<u32>) {
        let Some(bvh) = &self.local_bvh else { return };
        let local_ray = ray.inverse_transformed_by(&self.world);
        let local_t_max = if candidate.t == f32::MAX {
            f32::MAX
        } else {
            local_ray.param_at(self.world.inverse_transform_point(ray.at(candidate.t)))
        };
        if let Some(hit) = bvh.intersect_closest(&local_ray, t_min, local_t_max) {
            let world_point = self.world.transform_point(local_ray.at(hit.t));
            let world_t = ray.param_at(world_point);
            if candidate.is_closer_hit(world_t) {
                candidate.t = world_t;
                candidate.u = hit.u;
                candidate.v = hit.v;
                candidate.face_idx = hit.face_idx;
                candidate.geometry_normal = self.world.transform_normal(hit.geometry_normal);
                candidate.primitive = Some(0);
            }
        }
    }

    #[must_use]
    pub fn intersect_any(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        let Some(bvh) = &self.local_bvh else { return false };
        let local_ray = ray.inverse_transformed_by(&self.world);
        let local_t_max = if t_max == f32::MAX {
            f32::MAX
        } else {
            local_ray.param_at(self.world.inverse_transform_point(ray.at(t_max)))
        };
        bvh.intersect_any(&local_ray, t_min, local_t_max)
    }

    /// Fills shading data by barycentric-interpolating the mesh's packed
    /// `{normal, tangent, uv}` attribute stream at the hit face.
    pub fn fill_intersection(&self, ray: &Ray, candidate: &IntersectionCandidate<u32>, out: &mut Intersection<u32>) {
        let face = candidate.face_idx as usize * 3;
        let i0 = self.shading_indices[face] as usize;
        let i1 = self.shading_indices[face + 1] as usize;
        let i2 = self.shading_indices[face + 2] as usize;
        let (a0, a1, a2) = (self.shading_attributes[i0], self.shading_attributes[i1], self.shading_attributes[i2]);
        let w = 1.0 - candidate.u - candidate.v;

        let normal_local = (a0.normal * w + a1.normal * candidate.u + a2.normal * candidate.v).normalize_or_zero();
        let tangent_local = a0.tangent * w + a1.tangent * candidate.u + a2.tangent * candidate.v;
        let uv = a0.uv * w + a1.uv * candidate.u + a2.uv * candidate.v;

        let world_point = ray.at(candidate.t);
        let world_normal = self.world.transform_normal(normal_local);
        let world_tangent = self.world.transform_direction(tangent_local.truncate()).normalize_or_zero();

        out.update_full(candidate.t, 0, world_point, world_normal, world_tangent, uv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad_mesh() -> Mesh {
        let positions = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        let attr = VertexAttribute {
            normal: Vec3::Z,
            tangent: glam::Vec4::new(1.0, 0.0, 0.0, 1.0),
            uv: Vec2::ZERO,
        };
        Mesh::new(positions, vec![attr; 4], vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn closest_hit_on_translated_mesh_matches_world_offset() {
        let mesh = unit_quad_mesh();
        let mut proxy = MeshRenderProxy::new(0);
        let world = glam::Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0));
        proxy.update(&mesh, world).unwrap();

        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let mut candidate = IntersectionCandidate::<u32>::invalid();
        proxy.intersect_closest(&ray, 0.0, &mut candidate);
        assert!(candidate.primitive.is_some());
        assert!((candidate.t - 5.0).abs() < 1e-3);
    }
}

//! Render-thread mirror of the whole scene (`SPEC_FULL.md` §3
//! "SceneRenderProxy", §4.D), modeled on
//! `original_source/libraries/include/renderer/proxy/SceneRenderProxy.{h,cpp}`.
//!
//! Ties together the per-kind proxies: a dense primitive array mirroring
//! `Scene`'s own (same indices, same swap-remove order), a material array
//! addressed by stable id, and the camera/light/sky singletons. `update`
//! replays one frame's worth of journal records and refreshes every
//! proxy's derived state; `end_update` writes the new primitive indices
//! back onto the scene and clears both journals.

use ember_accel::{Tlas, TlasPrimitive};
use ember_core::{Aabb, Intersection, IntersectionCandidate, Ray};
use ember_rhi::flags::{BufferUsage, MemoryProperties};
use ember_rhi::resource::{Buffer, BufferDesc};
use ember_rhi::software::RhiContext;
use ember_rhi::tracked::Handle;
use ember_scene::{
    ChangeKind, Component, ComponentKind, Material, NodeHandle, Scene, SceneNode, TextureSlot,
};
use glam::Affine3A;

use crate::bindless::{BindlessTable, MaterialRenderData, PrimitiveBuffers};
use crate::config::RenderConfig;
use crate::proxy::{CameraRenderProxy, DirectionalLightRenderProxy, MaterialRenderProxy, MeshRenderProxy, SkyRenderProxy, SphereRenderProxy};

/// Tagged union over the two primitive kinds this crate supports
/// (`SPEC_FULL.md` §9: enum-tagged proxies instead of a downcast-based
/// polymorphic base). Camera, material and light proxies are not folded
/// in here since `proxy/mod.rs` only re-exports this pair as
/// `PrimitiveRenderProxy`, and the scene's own primitive array is
/// Mesh/Sphere only.
pub enum PrimitiveRenderProxy {
    Mesh(MeshRenderProxy),
    Sphere(SphereRenderProxy),
}

impl PrimitiveRenderProxy {
    #[must_use]
    pub fn material_id(&self) -> u32 {
        match self {
            PrimitiveRenderProxy::Mesh(m) => m.material_id,
            PrimitiveRenderProxy::Sphere(s) => s.material_id,
        }
    }

    #[must_use]
    pub fn as_mesh(&self) -> Option<&MeshRenderProxy> {
        match self {
            PrimitiveRenderProxy::Mesh(m) => Some(m),
            PrimitiveRenderProxy::Sphere(_) => None,
        }
    }

    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        match self {
            PrimitiveRenderProxy::Mesh(m) => m.world_aabb(),
            PrimitiveRenderProxy::Sphere(s) => s.world_aabb(),
        }
    }
}

impl TlasPrimitive for PrimitiveRenderProxy {
    fn world_aabb(&self) -> Aabb {
        PrimitiveRenderProxy::world_aabb(self)
    }

    fn intersect_closest(&self, ray: &Ray, t_min: f32, candidate: &mut IntersectionCandidate<u32>) {
        match self {
            PrimitiveRenderProxy::Mesh(m) => m.intersect_closest(ray, t_min, candidate),
            PrimitiveRenderProxy::Sphere(s) => s.intersect_closest(ray, t_min, candidate),
        }
    }

    fn intersect_any(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        match self {
            PrimitiveRenderProxy::Mesh(m) => m.intersect_any(ray, t_min, t_max),
            PrimitiveRenderProxy::Sphere(s) => s.intersect_any(ray, t_min, t_max),
        }
    }

    fn fill_intersection(&self, ray: &Ray, candidate: &IntersectionCandidate<u32>, out: &mut Intersection<u32>) {
        match self {
            PrimitiveRenderProxy::Mesh(m) => m.fill_intersection(ray, candidate, out),
            PrimitiveRenderProxy::Sphere(s) => s.fill_intersection(ray, candidate, out),
        }
    }
}

/// Owns the GPU vertex/index/attribute buffers a mesh primitive
/// contributes to the bindless table. `MeshRenderProxy` itself only
/// stores the weak `ResourceId`s (`SPEC_FULL.md` §9 "no shared owning
/// pointers"); this struct is the one `Handle` that actually keeps them
/// alive, parallel to `primitives` and swap-removed alongside it.
struct MeshGpuBuffers {
    vertex: Handle<Buffer>,
    index: Handle<Buffer>,
    attribute: Handle<Buffer>,
}

impl MeshGpuBuffers {
    fn upload(rhi: &mut RhiContext, mesh: &ember_scene::Mesh) -> Self {
        let vertex_bytes = positions_to_bytes(&mesh.positions);
        let vertex = rhi
            .create_buffer(BufferDesc {
                size: vertex_bytes.len().max(1),
                usage: BufferUsage::VERTEX | BufferUsage::STORAGE,
                memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                is_dynamic: false,
            })
            .expect("uploading a mesh's vertex buffer must succeed");
        rhi.buffer_mut(&vertex).write(0, &vertex_bytes);

        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let index = rhi
            .create_buffer(BufferDesc {
                size: index_bytes.len().max(1),
                usage: BufferUsage::INDEX | BufferUsage::STORAGE,
                memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                is_dynamic: false,
            })
            .expect("uploading a mesh's index buffer must succeed");
        rhi.buffer_mut(&index).write(0, index_bytes);

        let attribute_bytes = attributes_to_bytes(&mesh.attributes);
        let attribute = rhi
            .create_buffer(BufferDesc {
                size: attribute_bytes.len().max(1),
                usage: BufferUsage::STORAGE,
                memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                is_dynamic: false,
            })
            .expect("uploading a mesh's attribute buffer must succeed");
        rhi.buffer_mut(&attribute).write(0, &attribute_bytes);

        Self { vertex, index, attribute }
    }
}

fn positions_to_bytes(positions: &[glam::Vec3]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(positions.len() * 12);
    for p in positions {
        bytes.extend_from_slice(&p.x.to_le_bytes());
        bytes.extend_from_slice(&p.y.to_le_bytes());
        bytes.extend_from_slice(&p.z.to_le_bytes());
    }
    bytes
}

fn attributes_to_bytes(attributes: &[ember_scene::VertexAttribute]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(attributes.len() * 36);
    for a in attributes {
        for c in [a.normal.x, a.normal.y, a.normal.z] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        for c in [a.tangent.x, a.tangent.y, a.tangent.z, a.tangent.w] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        for c in [a.uv.x, a.uv.y] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    bytes
}

fn mesh_primitive_buffers(primitive: &PrimitiveRenderProxy) -> Option<PrimitiveBuffers> {
    let mesh = primitive.as_mesh()?;
    Some(PrimitiveBuffers {
        index_buffer: mesh.index_buffer?,
        vertex_buffer: mesh.vertex_buffer?,
        attribute_buffer: mesh.attribute_buffer?,
    })
}

/// A material proxy plus the texture slots it needs resolved to bindless
/// ids for the GPU parameter record; `MaterialRenderProxy` itself carries
/// only pre-sampled scalar/vector values (`SPEC_FULL.md` §4.D), so the
/// texture references live alongside it here instead.
struct MaterialSlot {
    proxy: MaterialRenderProxy,
    textures: [Option<TextureSlot>; 4],
}

fn material_render_data(slot: Option<&MaterialSlot>, bindless: &BindlessTable) -> MaterialRenderData {
    use bytemuck::Zeroable;
    let Some(slot) = slot else {
        return MaterialRenderData::zeroed();
    };
    let m = &slot.proxy;
    let mut texture_ids = [u32::MAX; 4];
    for (slot_id, tex) in texture_ids.iter_mut().zip(slot.textures.iter()) {
        if let Some(tex) = tex {
            *slot_id = bindless.bindless_id_of(*tex).unwrap_or(u32::MAX);
        }
    }
    MaterialRenderData {
        base_color: m.base_color.into(),
        variant: match m.variant {
            ember_scene::MaterialVariant::Pbr => 0,
            ember_scene::MaterialVariant::Dielectric => 1,
        },
        emissive: m.emissive.into(),
        metallic: m.metallic,
        roughness: m.roughness,
        eta: m.eta,
        texture_ids,
        _pad: [0; 2],
    }
}

pub struct SceneRenderProxy {
    primitives: Vec<PrimitiveRenderProxy>,
    mesh_gpu_buffers: Vec<Option<MeshGpuBuffers>>,

    materials: Vec<Option<MaterialSlot>>,

    bindless: BindlessTable,
    tlas: Option<Tlas>,
    need_bvh_update: bool,

    camera: Option<CameraRenderProxy>,
    camera_last_world: Option<(glam::Vec3, glam::Quat)>,
    directional_light: Option<DirectionalLightRenderProxy>,
    sky: Option<SkyRenderProxy>,
}

impl SceneRenderProxy {
    #[must_use]
    pub fn new(rhi: &mut RhiContext) -> Self {
        Self {
            primitives: Vec::new(),
            mesh_gpu_buffers: Vec::new(),
            materials: Vec::new(),
            bindless: BindlessTable::new(rhi),
            tlas: None,
            need_bvh_update: true,
            camera: None,
            camera_last_world: None,
            directional_light: None,
            sky: None,
        }
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn primitives(&self) -> &[PrimitiveRenderProxy] {
        &self.primitives
    }

    #[must_use]
    pub fn material(&self, id: u32) -> Option<&MaterialRenderProxy> {
        self.materials.get(id as usize)?.as_ref().map(|slot| &slot.proxy)
    }

    #[must_use]
    pub fn bindless(&self) -> &BindlessTable {
        &self.bindless
    }

    pub fn bindless_mut(&mut self) -> &mut BindlessTable {
        &mut self.bindless
    }

    #[must_use]
    pub fn camera(&self) -> Option<&CameraRenderProxy> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut CameraRenderProxy> {
        self.camera.as_mut()
    }

    #[must_use]
    pub fn directional_light(&self) -> Option<&DirectionalLightRenderProxy> {
        self.directional_light.as_ref()
    }

    #[must_use]
    pub fn sky(&self) -> Option<&SkyRenderProxy> {
        self.sky.as_ref()
    }

    #[must_use]
    pub fn tlas(&self) -> Option<&Tlas> {
        self.tlas.as_ref()
    }

    #[must_use]
    pub fn closest_hit(&self, ray: &Ray) -> Intersection<u32> {
        self.tlas.as_ref().map_or_else(Intersection::invalid, |t| t.closest_hit(ray, &self.primitives))
    }

    #[must_use]
    pub fn any_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.tlas.as_ref().is_some_and(|t| t.any_hit(ray, t_min, t_max, &self.primitives))
    }

    /// Consumes this frame's journals from `scene`, refreshes every
    /// proxy's per-frame derived state (transforms, camera matrices,
    /// shadow frustum), rebuilds the TLAS, and pushes buffer/texture
    /// updates into the bindless table.
    pub fn update(&mut self, rhi: &mut RhiContext, scene: &Scene, config: &RenderConfig) {
        self.apply_material_journal(scene);
        self.apply_primitive_journal(rhi, scene);
        self.refresh_singletons(scene, config);
        self.refresh_primitive_transforms(scene);

        if self.primitives.is_empty() {
            self.tlas = None;
        } else {
            let primitives = &self.primitives;
            self.tlas = Some(Tlas::build(primitives.len() as u32, |i| primitives[i as usize].world_aabb()));
        }
        self.need_bvh_update = false;

        let material_data: Vec<MaterialRenderData> =
            (0..self.materials.len()).map(|m| material_render_data(self.materials[m].as_ref(), &self.bindless)).collect();
        let primitives = &self.primitives;
        self.bindless.update_frame_data(
            rhi,
            scene.primitive_journal(),
            primitives.len(),
            |p| primitives[p as usize].material_id(),
            |p| mesh_primitive_buffers(&primitives[p as usize]),
            scene.material_journal(),
            material_data.len(),
            |m| material_data[m as usize],
        );
    }

    #[must_use]
    pub fn need_bvh_update(&self) -> bool {
        self.need_bvh_update
    }

    /// Writes the new primitive index back onto each newly registered
    /// component and clears both journals (`SPEC_FULL.md` §5: "cleared at
    /// the end of each frame update"). Callers that run `update` on a
    /// separate render thread must serialize this with `MainThread`'s own
    /// scene access before the next `add_component`/`remove_component`.
    pub fn end_update(&mut self, scene: &mut Scene) {
        let new_records: Vec<_> = scene.primitive_journal().iter().filter(|r| r.kind == ChangeKind::New).copied().collect();
        for record in new_records {
            if let Some(handle) = scene.primitive_at(record.to_id) {
                scene.set_component_render_id(handle, Some(record.to_id));
            }
        }
        scene.clear_journals();
    }

    fn apply_material_journal(&mut self, scene: &Scene) {
        for record in scene.material_journal() {
            let id = record.to_id as usize;
            match record.kind {
                ChangeKind::New => {
                    if id >= self.materials.len() {
                        self.materials.resize_with(id + 1, || None);
                    }
                    if let Some(material) = scene.material_at(record.to_id).and_then(|h| scene.material(h)) {
                        self.materials[id] = Some(self.build_material_slot(material));
                    }
                }
                ChangeKind::Update => {
                    if let Some(material) = scene.material_at(record.to_id).and_then(|h| scene.material(h)) {
                        if let Some(old) = self.materials.get(id).and_then(Option::as_ref) {
                            self.unregister_material_textures(old);
                        }
                        self.materials[id] = Some(self.build_material_slot(material));
                    }
                }
                ChangeKind::Remove => {
                    if let Some(slot) = self.materials.get_mut(id).and_then(Option::take) {
                        self.unregister_material_textures(&slot);
                    }
                }
                ChangeKind::Move => {}
            }
        }
    }

    fn build_material_slot(&mut self, material: &Material) -> MaterialSlot {
        let mut textures = [None; 4];
        for (slot, tex) in textures.iter_mut().zip(material.resource.textures.iter()) {
            *slot = *tex;
            if let Some(tex) = tex {
                self.bindless.register_texture(*tex);
            }
        }
        let proxy = MaterialRenderProxy::new(
            material.variant,
            material.resource.base_color,
            material.resource.emissive,
            material.resource.metallic,
            material.resource.roughness,
            material.resource.eta,
        );
        MaterialSlot { proxy, textures }
    }

    fn unregister_material_textures(&mut self, slot: &MaterialSlot) {
        for tex in slot.textures.iter().flatten() {
            self.bindless.unregister_texture(*tex);
        }
    }

    fn apply_primitive_journal(&mut self, rhi: &mut RhiContext, scene: &Scene) {
        for record in scene.primitive_journal() {
            match record.kind {
                ChangeKind::New => {
                    let slot = record.to_id as usize;
                    debug_assert_eq!(slot, self.primitives.len(), "primitive journal must append in order");
                    let Some(handle) = scene.primitive_at(record.to_id) else { continue };
                    let Some(component) = scene.component(handle) else { continue };
                    let (primitive, gpu_buffers) = self.build_primitive(rhi, scene, component);
                    self.primitives.push(primitive);
                    self.mesh_gpu_buffers.push(gpu_buffers);
                    self.need_bvh_update = true;
                }
                ChangeKind::Remove => {
                    let slot = record.from_id as usize;
                    if slot < self.primitives.len() {
                        self.primitives.swap_remove(slot);
                        self.mesh_gpu_buffers.swap_remove(slot);
                        self.need_bvh_update = true;
                    }
                }
                ChangeKind::Move | ChangeKind::Update => {
                    // The dense arrays already reflect swap-remove moves via
                    // the matching `Remove` record handled above.
                }
            }
        }
    }

    fn build_primitive(&mut self, rhi: &mut RhiContext, scene: &Scene, component: &Component) -> (PrimitiveRenderProxy, Option<MeshGpuBuffers>) {
        let world = scene.node(component.owner()).map(SceneNode::world_matrix).unwrap_or(Affine3A::IDENTITY);
        match &component.kind {
            ComponentKind::Mesh { mesh, material } => {
                let material_id = scene.material_id(*material).unwrap_or(0);
                let mut proxy = MeshRenderProxy::new(material_id);
                let mut gpu_buffers = None;
                if let Some(mesh_data) = scene.mesh(*mesh) {
                    proxy.update(mesh_data, world).expect("building the BLAS for a newly registered mesh must succeed");
                    let buffers = MeshGpuBuffers::upload(rhi, mesh_data);
                    proxy.vertex_buffer = Some(buffers.vertex.id());
                    proxy.index_buffer = Some(buffers.index.id());
                    proxy.attribute_buffer = Some(buffers.attribute.id());
                    gpu_buffers = Some(buffers);
                } else {
                    log::warn!("mesh component references a missing mesh handle; primitive will never be hit");
                }
                (PrimitiveRenderProxy::Mesh(proxy), gpu_buffers)
            }
            ComponentKind::Sphere { radius, material } => {
                let material_id = scene.material_id(*material).unwrap_or(0);
                let (scale, _, translation) = world.to_scale_rotation_translation();
                let scaled_radius = radius * scale.x.max(scale.y).max(scale.z);
                (PrimitiveRenderProxy::Sphere(SphereRenderProxy::new(translation, scaled_radius, material_id)), None)
            }
            _ => unreachable!("only mesh/sphere components ever enter the primitive journal"),
        }
    }

    fn refresh_primitive_transforms(&mut self, scene: &Scene) {
        for (slot, primitive) in self.primitives.iter_mut().enumerate() {
            let Some(handle) = scene.primitive_at(slot as u32) else { continue };
            let Some(component) = scene.component(handle) else { continue };
            let world = scene.node(component.owner()).map(SceneNode::world_matrix).unwrap_or(Affine3A::IDENTITY);
            match (primitive, &component.kind) {
                (PrimitiveRenderProxy::Mesh(mesh_proxy), ComponentKind::Mesh { mesh, .. }) => {
                    if let Some(mesh_data) = scene.mesh(*mesh) {
                        let _ = mesh_proxy.update(mesh_data, world);
                    }
                }
                (PrimitiveRenderProxy::Sphere(sphere_proxy), ComponentKind::Sphere { radius, .. }) => {
                    let (scale, _, translation) = world.to_scale_rotation_translation();
                    let scaled_radius = radius * scale.x.max(scale.y).max(scale.z);
                    *sphere_proxy = SphereRenderProxy::new(translation, scaled_radius, sphere_proxy.material_id);
                }
                _ => {}
            }
        }
    }

    fn refresh_singletons(&mut self, scene: &Scene, config: &RenderConfig) {
        if let Some(node) = scene.active_camera {
            if let Some(ComponentKind::Camera(state)) = find_component(scene, node, |k| matches!(k, ComponentKind::Camera(_))).map(|c| &c.kind) {
                let world = scene.node(node).map(SceneNode::world_matrix).unwrap_or(Affine3A::IDENTITY);
                let (_, rotation, position) = world.to_scale_rotation_translation();
                let world_changed = self.camera_last_world != Some((position, rotation));
                self.camera_last_world = Some((position, rotation));
                let camera = self.camera.get_or_insert_with(|| CameraRenderProxy::new(config));
                camera.update(
                    position,
                    rotation,
                    world_changed,
                    state.vertical_fov_deg,
                    state.focus_distance,
                    state.aperture_radius,
                    state.exposure,
                    state.near,
                    state.far,
                    config.image_width,
                    config.image_height,
                );
            }
        } else {
            self.camera = None;
            self.camera_last_world = None;
        }

        if let Some(node) = scene.active_directional_light {
            if let Some(ComponentKind::DirectionalLight(state)) =
                find_component(scene, node, |k| matches!(k, ComponentKind::DirectionalLight(_))).map(|c| &c.kind)
            {
                let world = scene.node(node).map(SceneNode::world_matrix).unwrap_or(Affine3A::IDENTITY);
                let (_, rotation, _) = world.to_scale_rotation_translation();
                let direction = rotation * glam::Vec3::Y;
                let light = self.directional_light.get_or_insert_with(DirectionalLightRenderProxy::new);
                light.update(direction, state.color, state.intensity);
            }
        } else {
            self.directional_light = None;
        }

        if let Some(node) = scene.active_sky_light {
            if let Some(ComponentKind::SkyLight(state)) = find_component(scene, node, |k| matches!(k, ComponentKind::SkyLight(_))).map(|c| &c.kind) {
                let sky = self.sky.get_or_insert_with(SkyRenderProxy::new);
                sky.update(state.env_map, state.intensity);
            }
        } else {
            self.sky = None;
        }
    }
}

fn find_component<'s>(scene: &'s Scene, node: NodeHandle, matches_kind: impl Fn(&ComponentKind) -> bool) -> Option<&'s Component> {
    let handles = scene.node(node)?.components();
    handles.iter().find_map(|&h| scene.component(h).filter(|c| matches_kind(&c.kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::{ComponentKind, MaterialResource, MaterialVariant, Mesh, VertexAttribute};
    use glam::{Vec2, Vec3, Vec4};

    fn ctx() -> RhiContext {
        let mut rhi = RhiContext::new(2);
        rhi.begin_frame();
        rhi
    }

    fn unit_tri_mesh() -> Mesh {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let attr = VertexAttribute {
            normal: Vec3::Z,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            uv: Vec2::ZERO,
        };
        Mesh::new(positions, vec![attr; 3], vec![0, 1, 2])
    }

    #[test]
    fn new_sphere_primitive_is_registered_at_its_journaled_slot() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let node = scene.create_node("n");
        let material = scene.create_material(MaterialResource::new("m"), MaterialVariant::Pbr);
        scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        scene.update_dirty_transform();

        let config = RenderConfig::default();
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        assert_eq!(proxy.primitive_count(), 1);
        assert!(matches!(proxy.primitives()[0], PrimitiveRenderProxy::Sphere(_)));
        assert!(scene.primitive_journal().is_empty());
    }

    #[test]
    fn removing_a_primitive_keeps_the_proxy_array_in_sync_with_the_scene() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let node = scene.create_node("n");
        let material = scene.create_material(MaterialResource::new("m"), MaterialVariant::Pbr);
        let a = scene.add_component(node, ComponentKind::Sphere { radius: 1.0, material });
        let _b = scene.add_component(node, ComponentKind::Sphere { radius: 2.0, material });
        let _c = scene.add_component(node, ComponentKind::Sphere { radius: 3.0, material });
        scene.update_dirty_transform();

        let config = RenderConfig::default();
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);
        assert_eq!(proxy.primitive_count(), 3);

        scene.remove_component(node, a);
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        assert_eq!(proxy.primitive_count(), scene.primitive_count());
        for slot in 0..proxy.primitive_count() as u32 {
            let handle = scene.primitive_at(slot).unwrap();
            let expected_radius = match scene.component(handle).unwrap().kind {
                ComponentKind::Sphere { radius, .. } => radius,
                _ => unreachable!(),
            };
            match &proxy.primitives()[slot as usize] {
                PrimitiveRenderProxy::Sphere(s) => assert!((s.radius - expected_radius).abs() < 1e-4),
                PrimitiveRenderProxy::Mesh(_) => panic!("expected a sphere"),
            }
        }
    }

    #[test]
    fn mesh_primitive_uploads_gpu_buffers_and_registers_in_the_bindless_table() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let node = scene.create_node("n");
        let material = scene.create_material(MaterialResource::new("m"), MaterialVariant::Pbr);
        let mesh = scene.add_mesh(unit_tri_mesh());
        scene.add_component(node, ComponentKind::Mesh { mesh, material });
        scene.update_dirty_transform();

        let config = RenderConfig::default();
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        let mesh_proxy = proxy.primitives()[0].as_mesh().unwrap();
        assert!(mesh_proxy.vertex_buffer.is_some());
        assert!(mesh_proxy.index_buffer.is_some());
        assert!(mesh_proxy.attribute_buffer.is_some());
        assert_eq!(proxy.bindless().primitive_buffers(0).unwrap().index_buffer, mesh_proxy.index_buffer.unwrap());
    }

    #[test]
    fn camera_component_drives_the_camera_proxy() {
        let mut rhi = ctx();
        let mut proxy = SceneRenderProxy::new(&mut rhi);
        let mut scene = Scene::new();
        let node = scene.create_node("cam");
        scene.add_component(node, ComponentKind::Camera(ember_scene::CameraState::default()));
        scene.active_camera = Some(node);
        scene.update_dirty_transform();

        let config = RenderConfig::default();
        proxy.update(&mut rhi, &scene, &config);
        proxy.end_update(&mut scene);

        assert!(proxy.camera().is_some());
        assert!(proxy.camera().unwrap().pixels_dirty);
    }
}

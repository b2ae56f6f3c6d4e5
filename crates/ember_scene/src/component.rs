//! Scene components: the polymorphic payload a node owns
//! (`SPEC_FULL.md` §3 "Component"). A renderable component owns, by weak
//! index-based back-reference, a single render proxy of matching kind;
//! that back-reference is filled in by the render-thread mirror and is
//! never dereferenced by the scene.

use slotmap::new_key_type;

use crate::material::MaterialHandle;
use crate::node::NodeHandle;

new_key_type! {
    /// Strongly-typed handle for scene components.
    pub struct ComponentHandle;
}

#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    pub vertical_fov_deg: f32,
    pub focus_distance: f32,
    pub aperture_radius: f32,
    pub exposure: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            vertical_fov_deg: 60.0,
            focus_distance: 10.0,
            aperture_radius: 0.0,
            exposure: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionalLightState {
    pub color: glam::Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkyLightState {
    pub env_map: Option<crate::material::TextureSlot>,
    pub intensity: f32,
}

/// What kind of renderable (or non-renderable) payload a component
/// carries. Mesh/Sphere are the two supported primitive shapes
/// (`SPEC_FULL.md` §1 Non-goals: "indexed triangle meshes and analytic
/// spheres" only); `Tag` is the non-renderable case -- a node that exists
/// purely for its transform and hierarchy (a pivot, a bone-less group).
#[derive(Debug, Clone)]
pub enum ComponentKind {
    Mesh {
        mesh: crate::mesh::MeshHandle,
        material: MaterialHandle,
    },
    Sphere {
        radius: f32,
        material: MaterialHandle,
    },
    Camera(CameraState),
    DirectionalLight(DirectionalLightState),
    SkyLight(SkyLightState),
    Tag,
}

impl ComponentKind {
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        !matches!(self, ComponentKind::Tag)
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, ComponentKind::Mesh { .. } | ComponentKind::Sphere { .. })
    }

    #[must_use]
    pub fn material(&self) -> Option<MaterialHandle> {
        match self {
            ComponentKind::Mesh { material, .. } | ComponentKind::Sphere { material, .. } => Some(*material),
            _ => None,
        }
    }
}

pub struct Component {
    pub(crate) owner: NodeHandle,
    pub kind: ComponentKind,
    /// Weak, index-based back-reference to this component's render proxy.
    /// `None` until the render-thread mirror processes the `{New}` record
    /// for it; never dereferenced on the scene side.
    pub(crate) render_id: Option<u32>,
}

impl Component {
    #[must_use]
    pub fn owner(&self) -> NodeHandle {
        self.owner
    }

    #[must_use]
    pub fn render_id(&self) -> Option<u32> {
        self.render_id
    }

    pub(crate) fn set_render_id(&mut self, render_id: Option<u32>) {
        self.render_id = render_id;
    }
}

//! Material resources (`SPEC_FULL.md` §3 "Material").

use glam::Vec3;
use slotmap::new_key_type;

new_key_type! {
    /// Strongly-typed handle for materials.
    pub struct MaterialHandle;
}

/// An opaque reference to an externally loaded texture asset. Texture
/// loading/decoding is an external collaborator (`SPEC_FULL.md` §1); this
/// crate only carries the slot a material points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSlot(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialVariant {
    Pbr,
    Dielectric,
}

/// Up to four textures: base color, metallic-roughness, normal, emissive,
/// by convention (the render proxy decides how to sample each slot).
#[derive(Debug, Clone)]
pub struct MaterialResource {
    pub name: String,
    pub base_color: Vec3,
    pub emissive: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    /// Index of refraction, used only by the `Dielectric` variant.
    pub eta: f32,
    pub textures: [Option<TextureSlot>; 4],
}

impl MaterialResource {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: Vec3::splat(0.8),
            emissive: Vec3::ZERO,
            metallic: 0.0,
            roughness: 0.5,
            eta: 1.5,
            textures: [None; 4],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub resource: MaterialResource,
    pub variant: MaterialVariant,
}

impl Material {
    #[must_use]
    pub fn pbr(resource: MaterialResource) -> Self {
        Self {
            resource,
            variant: MaterialVariant::Pbr,
        }
    }

    #[must_use]
    pub fn dielectric(resource: MaterialResource) -> Self {
        Self {
            resource,
            variant: MaterialVariant::Dielectric,
        }
    }
}

/// A material plus its scene-side bookkeeping: usage is reference-counted
/// per scene (`SPEC_FULL.md` §3), and a dirty flag marks resource edits
/// that need an `{Update}` journal record on the next primitive using it.
pub(crate) struct MaterialEntry {
    pub material: Material,
    pub ref_count: u32,
    pub dirty: bool,
}

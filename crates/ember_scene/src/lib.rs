//! Game-thread scene graph (`SPEC_FULL.md` §3-§5): nodes, transforms,
//! components and materials, publishing a change journal that
//! `ember_render`'s `SceneRenderProxy` mirrors on the render thread.
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

mod component;
mod error;
mod journal;
mod material;
mod mesh;
mod node;
mod scene;

pub use component::{CameraState, Component, ComponentHandle, ComponentKind, DirectionalLightState, SkyLightState};
pub use error::{Result, SceneError};
pub use journal::{ChangeKind, ChangeRecord, Journal};
pub use material::{Material, MaterialHandle, MaterialResource, MaterialVariant, TextureSlot};
pub use mesh::{Mesh, MeshHandle, VertexAttribute};
pub use node::{NodeHandle, SceneNode};
pub use scene::Scene;

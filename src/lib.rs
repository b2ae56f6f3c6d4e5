//! Ember: a real-time renderer that drives one scene through four
//! pipelines -- a software path tracer, a hardware-ray-traced path
//! tracer, and forward/deferred rasterisation -- over a shared render
//! substrate (`SPEC_FULL.md` §1).
//!
//! This umbrella crate does not add rendering logic of its own; it wires
//! together the workspace's five crates behind one [`Engine`]:
//!
//! - [`ember_core`] -- math, sampling, the inter-thread task queue and the
//!   error/config primitives every other crate builds on.
//! - [`ember_rhi`] -- the backend-agnostic render-hardware interface:
//!   typed resource arena, deferred deletion, dynamic ring buffers, and a
//!   software reference backend.
//! - [`ember_accel`] -- the two-level BLAS/TLAS acceleration structures
//!   the CPU path tracer traverses.
//! - [`ember_scene`] -- the game-thread scene graph and its change
//!   journal.
//! - [`ember_render`] -- render proxies, the bindless table, pipeline
//!   passes, the ASVGF denoiser, the CPU path tracer, and the four
//!   renderers themselves.
//!
//! # Example
//!
//! ```
//! use ember::{Engine, Pipeline, RenderConfig};
//!
//! let config = RenderConfig {
//!     pipeline: Pipeline::Cpu,
//!     image_width: 8,
//!     image_height: 8,
//!     sample_per_pixel: 1,
//!     max_bounce: 1,
//!     ..RenderConfig::default()
//! };
//! let mut engine = Engine::new(config, false).expect("cpu pipeline never needs hardware RT");
//! engine.tick();
//! assert_eq!(engine.frame_count(), 1);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod engine;
pub mod errors;

pub use engine::{ActiveRenderer, Engine, FRAMES_IN_FLIGHT};
pub use errors::{EmberError, Result};

pub use ember_accel::{Blas, Tlas, TlasPrimitive};
pub use ember_core::sampler::Sampler;
pub use ember_core::task::{Role, Task, TaskCtx, TaskQueue, TaskTarget};
pub use ember_core::{Aabb, Ray, Transform};
pub use ember_render::{
    pass, AsvgfDebugView, CameraRenderProxy, CpuRenderer, DebugMode, DeferredRenderer, ForwardRenderer, GpuRenderer, MaterialRenderProxy,
    MeshRenderProxy, Pipeline, RenderConfig, SceneRenderProxy, ScreenshotRequest, SphereRenderProxy,
};
pub use ember_rhi::RhiContext;
pub use ember_scene::{CameraState, Component, ComponentKind, Material, MaterialResource, Mesh, Scene, SceneNode};

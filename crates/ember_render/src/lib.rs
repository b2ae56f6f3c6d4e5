//! Render-thread mirror of the scene (`SPEC_FULL.md` §3-§4): render
//! proxies, the bindless resource table, pipeline passes, the CPU path
//! tracer, the ASVGF denoiser, and the four renderers that compose passes
//! into a frame.
//!
//! This crate owns everything downstream of the scene's change journal: it
//! never mutates `ember_scene::Scene` except to write back a primitive's
//! assigned render-side id after mirroring it.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod asvgf;
pub mod bindless;
pub mod config;
pub mod error;
pub mod image2d;
pub mod pass;
pub mod path_tracer;
pub mod proxy;
pub mod renderer;

pub use asvgf::{Asvgf, GFeatures};
pub use bindless::{BindlessTable, MaterialRenderData, PrimitiveBuffers};
pub use config::{AsvgfDebugView, DebugMode, Pipeline, RenderConfig};
pub use error::{RenderError, Result};
pub use image2d::Image2D;
pub use path_tracer::PathTracer;
pub use proxy::{
    CameraRenderProxy, DirectionalLightRenderProxy, MaterialRenderProxy, MeshRenderProxy, PrimitiveRenderProxy, SceneRenderProxy,
    SkyRenderProxy, SphereRenderProxy,
};
pub use renderer::{ComputePerformanceRecord, CpuRenderer, DeferredRenderer, ForwardRenderer, GpuRenderer, ScreenshotRequest};

//! Backend-agnostic render-hardware-interface (`SPEC_FULL.md` §4.A).
//!
//! `ember_rhi` never talks to a real graphics API: it defines the resource
//! arena, the deferred-deletion model, dynamic ring buffers, bindless
//! growth bookkeeping and shader-resource bind-diffing that every backend
//! would share, plus a `software` reference backend sufficient to drive
//! and unit-test the CPU renderer and the rest of the workspace. A
//! hardware Vulkan/Metal backend is explicitly out of scope (`SPEC_FULL.md`
//! §1): platform-specific RHI backends are an external collaborator.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod arena;
mod deletion;
pub mod dynamic_buffer;
pub mod error;
pub mod flags;
pub mod format;
pub mod resource;
pub mod shader_resource;
pub mod software;
pub mod tracked;

pub use arena::{Arena, ResourceId};
pub use error::{Result, RhiError};
pub use format::{ImageLayout, PipelineStage, PixelFormat, Transition};
pub use software::RhiContext;
pub use tracked::Handle;

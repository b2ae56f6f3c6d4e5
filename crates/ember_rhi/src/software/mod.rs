//! The software reference backend (`SPEC_FULL.md` §4.A.1): implements the
//! full RHI contract over plain `Vec<u8>`-backed buffers and images. This
//! is the backend every test in the workspace runs against, since a
//! hardware Vulkan/Metal/wgpu backend is explicitly out of scope (§1) --
//! platform-specific RHI backends are an external collaborator.

mod context;

pub use context::{PassKind, RhiContext};

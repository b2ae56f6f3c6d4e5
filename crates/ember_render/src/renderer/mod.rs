//! The four renderers (`SPEC_FULL.md` §4.F), each composing the passes in
//! `crate::pass` into one frame. Every renderer follows the same
//! `new` → `init_render_resources` → `tick` shape; what differs is which
//! passes it owns and the order it runs them in.

mod cpu;
mod deferred;
mod forward;
mod gpu;
mod screenshot;

pub use cpu::CpuRenderer;
pub use deferred::DeferredRenderer;
pub use forward::ForwardRenderer;
pub use gpu::{ComputePerformanceRecord, GpuRenderer};
pub use screenshot::ScreenshotRequest;

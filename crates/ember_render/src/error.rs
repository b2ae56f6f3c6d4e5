//! Error taxonomy for `ember_render` (`SPEC_FULL.md` §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] ember_rhi::RhiError),

    /// A cache read or a screenshot write failed; recovered locally (§7):
    /// IBL falls back to on-the-fly cooking, screenshot failure is
    /// reported through its completion callback.
    #[error("io failure: {0}")]
    Io(String),

    /// The requested pipeline needs a capability the device lacks (e.g.
    /// `gpu` pipeline without hardware ray tracing). The caller must pick
    /// another pipeline; the renderer refuses to start.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

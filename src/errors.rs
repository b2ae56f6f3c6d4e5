//! Top-level error type for the umbrella crate.
//!
//! Every per-crate error taxonomy (`SPEC_FULL.md` §7) folds into
//! [`EmberError`] via `#[from]`, so a caller driving the engine through
//! this crate only ever has to match one enum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmberError {
    #[error(transparent)]
    Core(#[from] ember_core::CoreError),

    #[error(transparent)]
    Rhi(#[from] ember_rhi::RhiError),

    #[error(transparent)]
    Accel(#[from] ember_accel::AccelError),

    #[error(transparent)]
    Scene(#[from] ember_scene::SceneError),

    #[error(transparent)]
    Render(#[from] ember_render::RenderError),
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;

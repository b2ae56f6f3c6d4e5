//! Error taxonomy for `ember_rhi` (`SPEC_FULL.md` §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    /// A requested resource could not be allocated. Fatal per §7: callers in
    /// debug builds should let this propagate into `fatal_logic_error`-style
    /// handling; release builds surface it as a failed initialisation.
    #[error("failed to create {kind}: {reason}")]
    ResourceCreation { kind: &'static str, reason: String },

    /// Binding a resource that has been destroyed, or whose type does not
    /// match the declared slot.
    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    /// Missing shader file or failed reflection.
    #[error("shader load failed: {0}")]
    ShaderLoad(String),

    /// Requesting a capability the device/backend does not support (e.g.
    /// hardware ray tracing on the software backend).
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, RhiError>;

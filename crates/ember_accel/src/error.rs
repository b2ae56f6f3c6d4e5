//! Error taxonomy for `ember_accel` (`SPEC_FULL.md` §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccelError {
    /// A mesh with no triangles (or a triangle index out of range) was
    /// handed to `Blas::build`. Fatal per §7's `LogicError` class.
    #[error("invalid mesh for BLAS build: {0}")]
    InvalidMesh(String),
}

pub type Result<T> = std::result::Result<T, AccelError>;

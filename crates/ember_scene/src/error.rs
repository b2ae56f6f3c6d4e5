//! Error taxonomy for `ember_scene` (`SPEC_FULL.md` §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("node has no parent to detach from")]
    NoParent,
    #[error("attaching a node to itself is not allowed")]
    SelfAttach,
    #[error("material is still referenced by {0} primitive(s)")]
    MaterialStillInUse(u32),
}

pub type Result<T> = std::result::Result<T, SceneError>;

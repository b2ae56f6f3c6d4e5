//! Two-level acceleration structures for CPU ray tracing
//! (`SPEC_FULL.md` §4.C): a binned-SAH [`bvh::Bvh`] shared by the per-mesh
//! [`blas::Blas`] and the scene-wide [`tlas::Tlas`].
//!
//! `ember_accel` knows nothing about `ember_render`'s concrete scene
//! types; the TLAS is generic over any primitive implementing
//! [`tlas::TlasPrimitive`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod blas;
pub mod bvh;
pub mod error;
pub mod tlas;
pub mod triangle;

pub use blas::{Blas, BlasHit};
pub use bvh::{Bvh, BvhNode, BvhNodeKind};
pub use error::{AccelError, Result};
pub use tlas::{Tlas, TlasPrimitive};
pub use triangle::PackedTriangle;

//! Math, sampling and error primitives shared by every Ember crate.
//!
//! This crate carries no rendering-API knowledge; it is the substrate that
//! `ember_rhi`, `ember_accel`, `ember_scene` and `ember_render` all build on.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod math;
pub mod sampler;
pub mod task;

pub use error::{CoreError, Result};
pub use math::{Aabb, Intersection, IntersectionCandidate, Ray, Transform};

/// Numerical tolerance used throughout the core for "close enough" comparisons
/// (matrix round-trips, AABB containment, etc).
pub const TOLERANCE: f32 = 1e-4;

/// Epsilon used for degenerate-direction / near-zero guards.
pub const EPS: f32 = 1e-6;

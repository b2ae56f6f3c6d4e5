//! Core math types shared by the whole render substrate.
//!
//! World space is right-handed and Z-up (`Up = +Z`, `Front = +Y`,
//! `Right = +X`), matching the convention the camera proxy's
//! `Z_up_to_Y_up` view-matrix factor implies (see `SPEC_FULL.md` §2.1 and
//! §4.D). View space remains the usual Y-up convention GPU pipelines
//! expect; the change of basis happens once, in the camera proxy.

mod aabb;
mod intersection;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use intersection::{Intersection, IntersectionCandidate};
pub use ray::Ray;
pub use transform::Transform;

/// World-space up vector under the Z-up convention.
pub const UP: glam::Vec3 = glam::Vec3::Z;
/// World-space forward vector under the Z-up convention.
pub const FRONT: glam::Vec3 = glam::Vec3::Y;
/// World-space right vector under the Z-up convention.
pub const RIGHT: glam::Vec3 = glam::Vec3::X;

/// Change-of-basis matrix used once by `CameraRenderProxy` to turn a
/// Z-up world-space camera orientation into the Y-up view space the
/// rest of the render substrate (and any GPU backend) expects.
///
/// Maps world `+Z -> view +Y`, world `+Y -> view -Z`, world `+X -> view +X`,
/// i.e. a -90 degree rotation about the world X axis.
#[must_use]
pub fn z_up_to_y_up() -> glam::Mat4 {
    glam::Mat4::from_cols(
        glam::Vec4::new(1.0, 0.0, 0.0, 0.0),
        glam::Vec4::new(0.0, 0.0, 1.0, 0.0),
        glam::Vec4::new(0.0, -1.0, 0.0, 0.0),
        glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
    )
}

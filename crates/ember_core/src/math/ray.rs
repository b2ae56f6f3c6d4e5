use glam::Vec3;

use super::Transform;

/// A ray with a normalized direction.
///
/// Ported from `core/math/Ray.h`. The original's `InverseAt` (projecting a
/// point back to a parameter `t`) is reproduced as `param_at`, used by the
/// BLAS/TLAS traversal to recover a world-space `t` after transforming a
/// ray into mesh-local space and back.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        debug_assert!(
            (direction.length_squared() - 1.0).abs() < 1e-3,
            "Ray direction must be normalized"
        );
        Self { origin, direction }
    }

    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Recovers the parameter `t` such that `self.at(t) == p`, assuming `p`
    /// lies on the ray. Matches the original's `InverseAt`, which projects
    /// `p - origin` onto `direction`.
    #[must_use]
    pub fn param_at(&self, p: Vec3) -> f32 {
        (p - self.origin).dot(self.direction)
    }

    #[must_use]
    pub fn transformed_by(&self, transform: &Transform) -> Ray {
        Ray {
            origin: transform.transform_point(self.origin),
            direction: transform.transform_direction(self.direction).normalize(),
        }
    }

    /// Transforms a ray into another space using the given `transform`'s
    /// inverse -- used to bring a world-space ray into mesh-local space for
    /// BLAS traversal.
    #[must_use]
    pub fn inverse_transformed_by(&self, transform: &Transform) -> Ray {
        Ray {
            origin: transform.inverse_transform_point(self.origin),
            direction: transform.inverse_transform_direction(self.direction).normalize(),
        }
    }
}

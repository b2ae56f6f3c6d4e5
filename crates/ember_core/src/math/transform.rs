use glam::{Affine3A, Mat3, Mat4, Quat, Vec3};

/// A lazily-cached TRS transform.
///
/// Ported from `core/math/Transform.h` in the original engine (which keeps
/// a dual TRS / matrix representation with dirty flags so that repeated
/// reads of an unchanged transform are free) fused with the dirty-checking
/// idiom already used by the teacher's `scene::Transform`
/// (`update_local_matrix`/`force_update`).
///
/// World space is right-handed, Z-up (see `super::UP`).
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    matrix: Affine3A,
    inverse: Affine3A,

    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    dirty: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            matrix: Affine3A::IDENTITY,
            inverse: Affine3A::IDENTITY,
            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            dirty: true,
        }
    }

    #[must_use]
    pub fn from_trs(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut t = Self::new();
        t.position = position;
        t.rotation = rotation;
        t.scale = scale;
        t.update_if_dirty();
        t
    }

    /// Recomputes the cached matrix (and its inverse) if the TRS values
    /// changed since the last call. Returns whether an update happened.
    pub fn update_if_dirty(&mut self) -> bool {
        let changed = self.dirty
            || self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale;

        if changed {
            self.matrix =
                Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);
            self.inverse = self.matrix.inverse();

            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.dirty = false;
        }
        changed
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
            || self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
    }

    #[must_use]
    pub fn matrix(&self) -> Affine3A {
        self.matrix
    }

    #[must_use]
    pub fn matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.matrix)
    }

    /// The cached inverse. `update_if_dirty` must have been called since
    /// the last mutation for this to reflect the current TRS values; this
    /// mirrors the original's `GetInverse` fast path of swapping cached
    /// transform/inverse pairs instead of recomputing from scratch.
    #[must_use]
    pub fn inverse(&self) -> Affine3A {
        self.inverse
    }

    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.matrix.transform_point3(p)
    }

    #[must_use]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        self.matrix.transform_vector3(d)
    }

    /// Transforms a tangent-space direction (e.g. a decoded normal map
    /// sample) using the inverse-transpose of the 3x3 linear part, which is
    /// the correct transform for directions under non-uniform scale.
    ///
    /// The original computes this via `GetInverse().GetMatrix()` rather
    /// than the forward matrix (`SPEC_FULL.md` §2.1) -- using the forward
    /// matrix directly would skew normals whenever scale is non-uniform.
    #[must_use]
    pub fn transform_normal(&self, n: Vec3) -> Vec3 {
        let linear: Mat3 = Mat3::from_mat4(Mat4::from(self.inverse));
        linear.transpose().mul_vec3(n).normalize_or_zero()
    }

    #[must_use]
    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.inverse.transform_point3(p)
    }

    #[must_use]
    pub fn inverse_transform_direction(&self, d: Vec3) -> Vec3 {
        self.inverse.transform_vector3(d)
    }

    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO || forward.cross(up).length_squared() < super::super::EPS {
            return;
        }
        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();
        let rot_mat = Mat3::from_cols(right, new_up, -forward);
        self.rotation = Quat::from_mat3(&rot_mat);
        self.mark_dirty();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.rotation == other.rotation && self.scale == other.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips_identity() {
        let mut t = Transform::from_trs(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(0.7),
            Vec3::new(1.0, 2.0, 0.5),
        );
        t.update_if_dirty();
        let p = Vec3::new(4.0, -1.0, 2.0);
        let world = t.transform_point(p);
        let back = t.inverse_transform_point(world);
        assert!((back - p).length() < super::super::super::TOLERANCE);
    }

    #[test]
    fn dirty_flag_tracks_trs_mutation() {
        let mut t = Transform::new();
        t.update_if_dirty();
        assert!(!t.is_dirty());
        t.position.x += 1.0;
        assert!(t.is_dirty());
        assert!(t.update_if_dirty());
        assert!(!t.is_dirty());
    }
}

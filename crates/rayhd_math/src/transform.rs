// Transform utilities for Mat4
//
// glam::Mat4 already provides transform_point3(), transform_vector3() and
// inverse(); these add the bits ray casting needs on top.

use crate::Aabb;
use glam::{Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a surface normal (inverse transpose of the upper 3x3),
    /// returning a unit vector. Degenerate inputs return `Vec3::ZERO`.
    fn transform_normal(&self, normal: Vec3) -> Vec3;

    /// True for a perspective projection matrix (w row is not `[0, 0, 0, 1]`).
    fn is_perspective(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }

        let (lo, hi) = (aabb.min, aabb.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];

        Aabb::enclosing(corners.iter().map(|&corner| self.transform_point3(corner)))
    }

    fn transform_normal(&self, normal: Vec3) -> Vec3 {
        let normal_matrix = self.inverse().transpose();
        normal_matrix.transform_vector3(normal).normalize_or_zero()
    }

    fn is_perspective(&self) -> bool {
        self.w_axis.w == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::splat(5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let mat = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let transformed = mat.transform_aabb(&aabb);

        let expected = std::f32::consts::SQRT_2;
        assert!((transformed.max.x - expected).abs() < 0.001);
        assert!((transformed.max.z - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_normal_non_uniform_scale() {
        // Plane tilted 45 degrees, squashed along x
        let mat = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        let transformed = mat.transform_normal(n);

        assert!((transformed.length() - 1.0).abs() < 0.001);
        // Scaling x up pushes the normal toward y
        assert!(transformed.y > transformed.x);
    }

    #[test]
    fn test_is_perspective() {
        let persp = Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        let ortho = Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0);

        assert!(persp.is_perspective());
        assert!(!ortho.is_perspective());
    }
}

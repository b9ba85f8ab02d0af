use crate::Vec3;

/// A world-space ray `P(t) = origin + t * direction`.
///
/// The direction is not required to be unit length; every distance the
/// intersection code reports is measured in multiples of it. Camera rays
/// are normalized so that `t` is a world-space distance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Create a ray leaving a surface point, nudged along `normal` so the
    /// ray does not immediately re-hit the surface it starts on.
    #[inline]
    pub fn leaving_surface(point: Vec3, normal: Vec3, direction: Vec3, epsilon: f32) -> Self {
        let side = if direction.dot(normal) >= 0.0 { 1.0 } else { -1.0 };
        Self::new(point + normal * (epsilon * side), direction)
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the point along the ray at parameter t.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_leaving_surface_offsets_toward_direction() {
        let normal = Vec3::Z;

        let out = Ray::leaving_surface(Vec3::ZERO, normal, Vec3::new(0.0, 1.0, 1.0), 0.01);
        assert!(out.origin.z > 0.0);

        // A ray heading into the surface is pushed to the other side
        let inward = Ray::leaving_surface(Vec3::ZERO, normal, Vec3::new(0.0, 0.0, -1.0), 0.01);
        assert!(inward.origin.z < 0.0);
        assert_eq!(inward.direction, Vec3::new(0.0, 0.0, -1.0));
    }
}

//! Result of a ray/geometry intersection query.

use rayhd_math::Vec3;

/// Nearest intersection found along a ray.
///
/// A miss is always `t == f32::INFINITY`; use [`IntersectResult::is_hit`]
/// rather than comparing distances. Boundaries that speak the `-1` miss
/// convention convert through [`IntersectResult::distance_or_negative`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectResult {
    /// Parametric distance along the ray
    pub t: f32,
    /// Unit geometric normal, oriented against the incoming ray
    pub normal: Vec3,
    /// World-space hit point
    pub point: Vec3,
    /// Whether the ray struck the side the triangle winding faces
    pub front_face: bool,
    /// Index of the hit mesh in the scene's mesh list
    pub mesh: Option<usize>,
}

impl IntersectResult {
    pub const MISS: IntersectResult = IntersectResult {
        t: f32::INFINITY,
        normal: Vec3::ZERO,
        point: Vec3::ZERO,
        front_face: false,
        mesh: None,
    };

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.t.is_finite() && self.t >= 0.0
    }

    /// Distance, or `-1.0` on a miss.
    #[inline]
    pub fn distance_or_negative(&self) -> f32 {
        if self.is_hit() {
            self.t
        } else {
            -1.0
        }
    }

    /// True if `self` should replace `best`: a valid hit strictly nearer.
    /// Equal distances keep the earlier result.
    #[inline]
    pub fn is_closer_than(&self, best: &IntersectResult) -> bool {
        self.is_hit() && self.t < best.t
    }
}

impl Default for IntersectResult {
    fn default() -> Self {
        Self::MISS
    }
}

//! Ray/triangle intersection.
//!
//! Uses the Möller-Trumbore algorithm. Degenerate triangles and rays
//! parallel to the triangle plane fall out as misses through the
//! determinant check; no other special casing is needed.

use rayhd_math::{Ray, Vec3};

/// Determinant threshold below which the ray is treated as parallel.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A single ray/triangle hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Parametric distance along the ray
    pub t: f32,
    /// Barycentric weight of `v1`
    pub u: f32,
    /// Barycentric weight of `v2`
    pub v: f32,
    /// True if the ray approaches from the side `(v1 - v0) x (v2 - v0)` points to
    pub front_face: bool,
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Both faces are reported; the caller decides what to do with
/// `front_face`. Hits behind the origin (`t < 0`) are rejected.
pub fn intersect_triangle(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle, or the triangle has no area
    if a.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t < 0.0 || t.is_nan() {
        return None;
    }

    Some(TriangleHit {
        t,
        u,
        v,
        // a > 0 means the ray direction opposes the winding normal
        front_face: a > 0.0,
    })
}

/// Unit face normal of a triangle from its winding, `Vec3::ZERO` if degenerate.
#[inline]
pub fn face_normal(v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    (v1 - v0).cross(v2 - v0).normalize_or_zero()
}

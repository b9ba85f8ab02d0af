use crate::{Ray, Vec3};

/// Axis-aligned bounding box stored as its min/max corners.
///
/// The empty box has `min = +inf` and `max = -inf` so that it is the
/// identity for [`Aabb::union`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// A box that contains nothing.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two opposite corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box enclosing every point of the iterator.
    ///
    /// Returns [`Aabb::EMPTY`] for an empty iterator.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| acc.grow(p))
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box extended to include `point`.
    pub fn grow(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True when `other` lies entirely inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        if other.is_empty() {
            return true;
        }
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test against the parametric range `[t_min, t_max]`.
    ///
    /// Returns the parametric distance at which the ray enters the box
    /// (clamped to `t_min`), or `None` if the ray misses. Flat boxes are
    /// accepted: a ray crossing a zero-thickness slab yields an interval
    /// of length zero, which still counts as a hit.
    pub fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let mut near = t_min;
        let mut far = t_max;

        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (self.min[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (self.max[axis] - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // f32::max/min drop a NaN operand, which happens when the origin
            // sits exactly on a slab the ray runs parallel to.
            near = t0.max(near);
            far = t1.min(far);
            if far < near {
                return None;
            }
        }

        Some(near)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

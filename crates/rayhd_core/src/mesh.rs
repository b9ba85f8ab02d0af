//! Triangulated mesh geometry.
//!
//! A `Mesh` is the renderer-side copy of one scene-graph mesh prim:
//! object-space points, triangle index triples and a world transform.
//! World-space points and bounds are derived once at construction, so
//! a mesh is read-only for its whole life; edits replace the mesh in the
//! [`MeshRegistry`](crate::MeshRegistry).

use std::fmt;

use rayhd_math::{Aabb, Mat4, Ray, Vec3};

use crate::error::MeshError;
use crate::hit::IntersectResult;
use crate::triangle::{face_normal, intersect_triangle};

/// Default surface colour when the scene graph supplies none.
pub const DEFAULT_DISPLAY_COLOR: Vec3 = Vec3::new(0.5, 0.5, 0.5);

/// Scene-graph path identifying a mesh, e.g. `/World/Cube`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(String);

impl MeshId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeshId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// A triangle soup with a world transform.
#[derive(Clone, Debug)]
pub struct Mesh {
    id: MeshId,

    /// Object-space vertex positions
    points: Vec<Vec3>,

    /// Triangles as indices into `points`
    triangles: Vec<[u32; 3]>,

    /// Object-to-world transform
    transform: Mat4,

    /// `points` run through `transform`
    world_points: Vec<Vec3>,

    /// World-space bounds of `world_points`
    bounds: Aabb,

    /// Surface colour used by shading
    display_color: Vec3,
}

impl Mesh {
    /// Create a mesh, validating that every triangle index names a point.
    pub fn new(
        id: MeshId,
        points: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        transform: Mat4,
    ) -> Result<Self, MeshError> {
        if !transform.is_finite() {
            return Err(MeshError::NonFiniteTransform(id.to_string()));
        }

        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= points.len()) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count: points.len(),
                });
            }
        }

        Ok(Self::assemble(id, points, triangles, transform))
    }

    fn assemble(id: MeshId, points: Vec<Vec3>, triangles: Vec<[u32; 3]>, transform: Mat4) -> Self {
        let world_points: Vec<Vec3> = points
            .iter()
            .map(|&p| transform.transform_point3(p))
            .collect();
        let bounds = Aabb::enclosing(world_points.iter().copied());

        Self {
            id,
            points,
            triangles,
            transform,
            world_points,
            bounds,
            display_color: DEFAULT_DISPLAY_COLOR,
        }
    }

    /// Build a mesh from a flat index list (every 3 indices form a triangle).
    ///
    /// Trailing indices that do not complete a triangle are ignored.
    pub fn from_flat_indices(
        id: MeshId,
        points: Vec<Vec3>,
        indices: &[u32],
        transform: Mat4,
    ) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            log::warn!(
                "Mesh '{}' has {} indices, dropping {} trailing",
                id,
                indices.len(),
                indices.len() % 3
            );
        }
        let triangles = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::new(id, points, triangles, transform)
    }

    /// Axis-aligned cube of edge length 1 centred on the origin, placed by
    /// `transform`. Faces wind counter-clockwise seen from outside.
    pub fn cube(id: MeshId, transform: Mat4) -> Self {
        let points = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        let triangles = vec![
            [4, 5, 6], [4, 6, 7], // +z
            [0, 2, 1], [0, 3, 2], // -z
            [1, 2, 6], [1, 6, 5], // +x
            [0, 4, 7], [0, 7, 3], // -x
            [3, 7, 6], [3, 6, 2], // +y
            [0, 1, 5], [0, 5, 4], // -y
        ];
        Self::assemble(id, points, triangles, transform)
    }

    /// Set the surface colour used by shading.
    pub fn with_display_color(mut self, color: Vec3) -> Self {
        self.display_color = color;
        self
    }

    pub fn id(&self) -> &MeshId {
        &self.id
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn display_color(&self) -> Vec3 {
        self.display_color
    }

    /// World-space bounding box.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// World-space vertices of every triangle.
    pub fn world_triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.triangles.iter().map(move |&[a, b, c]| {
            [
                self.world_points[a as usize],
                self.world_points[b as usize],
                self.world_points[c as usize],
            ]
        })
    }

    /// Nearest triangle hit within `[0, t_max]`.
    ///
    /// The returned normal is the unit face normal of the winning triangle,
    /// flipped to face the incoming ray. Back faces are hit like front
    /// faces; `front_face` records which side was struck. `mesh` is left
    /// `None` for the scene to fill in.
    pub fn intersect(&self, ray: &Ray, t_max: f32) -> IntersectResult {
        let mut best = IntersectResult::MISS;

        for [v0, v1, v2] in self.world_triangles() {
            let Some(hit) = intersect_triangle(ray, v0, v1, v2) else {
                continue;
            };
            if hit.t > t_max || hit.t >= best.t {
                continue;
            }

            let outward = face_normal(v0, v1, v2);
            best = IntersectResult {
                t: hit.t,
                normal: if hit.front_face { outward } else { -outward },
                point: ray.at(hit.t),
                front_face: hit.front_face,
                mesh: None,
            };
        }

        best
    }
}

//! rayhd core - scene geometry and ray queries.
//!
//! This crate provides:
//!
//! - **Geometry**: `Mesh`, a triangle soup with a world transform
//! - **Registry**: `MeshRegistry`, the typed mesh list handed over by the
//!   scene graph, with a version counter bumped on every edit
//! - **Acceleration**: `BvhNode`, a median-split hierarchy over mesh bounds
//! - **Queries**: `Scene`, an immutable snapshot answering nearest-hit queries
//!
//! # Example
//!
//! ```ignore
//! use rayhd_core::{Mesh, MeshId, MeshRegistry, Scene};
//!
//! let mut registry = MeshRegistry::new();
//! registry.insert(Mesh::new(MeshId::new("/World/tri"), points, triangles, Mat4::IDENTITY)?);
//! let scene = Scene::from_registry(&registry);
//! let hit = scene.intersect(&ray, f32::INFINITY);
//! ```

pub mod bvh;
pub mod error;
pub mod hit;
pub mod mesh;
pub mod registry;
pub mod scene;
pub mod triangle;

pub use bvh::BvhNode;
pub use error::MeshError;
pub use hit::IntersectResult;
pub use mesh::{Mesh, MeshId};
pub use registry::{MeshRegistry, SceneVersion};
pub use scene::Scene;
pub use triangle::{intersect_triangle, TriangleHit};

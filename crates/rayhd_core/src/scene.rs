//! Immutable scene snapshot used while rendering.
//!
//! A `Scene` pairs the registry's mesh handles with a BVH built over them.
//! It is never edited; when the registry version moves on, a new snapshot
//! replaces the old one wholesale.

use std::sync::Arc;

use rayhd_math::Ray;

use crate::bvh::BvhNode;
use crate::hit::IntersectResult;
use crate::mesh::Mesh;
use crate::registry::MeshRegistry;

#[derive(Debug, Clone)]
pub struct Scene {
    meshes: Vec<Arc<Mesh>>,
    bvh: BvhNode,
    version: u64,
}

impl Scene {
    /// Build a snapshot over `meshes`, tagged with the registry version it
    /// was taken at.
    pub fn new(meshes: Vec<Arc<Mesh>>, version: u64) -> Self {
        let bvh = BvhNode::build(&meshes);

        log::info!(
            "Scene v{}: {} meshes, {} triangles, BVH depth {}",
            version,
            meshes.len(),
            meshes.iter().map(|m| m.triangle_count()).sum::<usize>(),
            bvh.depth()
        );

        Self {
            meshes,
            bvh,
            version,
        }
    }

    /// Snapshot the current contents of `registry`.
    pub fn from_registry(registry: &MeshRegistry) -> Self {
        Self::new(registry.meshes(), registry.version())
    }

    /// A scene with no geometry.
    pub fn empty() -> Self {
        Self {
            meshes: Vec::new(),
            bvh: BvhNode::Empty,
            version: 0,
        }
    }

    /// Nearest hit along `ray` within `[0, t_max]`, via the BVH.
    pub fn intersect(&self, ray: &Ray, t_max: f32) -> IntersectResult {
        self.bvh
            .intersect(ray, &self.meshes, IntersectResult::MISS, t_max)
    }

    /// Nearest hit by testing every mesh in order, skipping the BVH.
    ///
    /// Reference for checking the BVH; ties resolve to the lower mesh index.
    pub fn intersect_brute_force(&self, ray: &Ray, t_max: f32) -> IntersectResult {
        let mut best = IntersectResult::MISS;
        for (index, mesh) in self.meshes.iter().enumerate() {
            let mut hit = mesh.intersect(ray, t_max);
            if hit.is_closer_than(&best) {
                hit.mesh = Some(index);
                best = hit;
            }
        }
        best
    }

    /// True if anything lies along `ray` within `[0, t_max]`.
    pub fn occluded(&self, ray: &Ray, t_max: f32) -> bool {
        self.intersect(ray, t_max).is_hit()
    }

    pub fn mesh(&self, index: usize) -> Option<&Arc<Mesh>> {
        self.meshes.get(index)
    }

    pub fn meshes(&self) -> &[Arc<Mesh>] {
        &self.meshes
    }

    pub fn bvh(&self) -> &BvhNode {
        &self.bvh
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::empty()
    }
}

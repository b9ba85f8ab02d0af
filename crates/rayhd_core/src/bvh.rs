//! Bounding Volume Hierarchy (BVH) over scene meshes.
//!
//! One leaf per mesh. Construction is a median split along X: meshes are
//! sorted by the minimum X of their world bounds and the list is halved
//! by count. Cheap to build, which matters because the tree is rebuilt
//! from scratch on every scene version.

use std::sync::Arc;

use rayhd_math::{Aabb, Ray};

use crate::hit::IntersectResult;
use crate::mesh::Mesh;

/// BVH node - either a branch with two children or a leaf with one mesh.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Internal node; `bbox` is the union of both children's boxes.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf referencing one mesh by its index in the scene's mesh list.
    Leaf { mesh: usize, bbox: Aabb },
    /// No geometry; every ray misses.
    Empty,
}

impl BvhNode {
    /// Build a BVH over `meshes`. Returns [`BvhNode::Empty`] for no meshes.
    pub fn build(meshes: &[Arc<Mesh>]) -> Self {
        if meshes.is_empty() {
            return BvhNode::Empty;
        }

        let items = meshes
            .iter()
            .enumerate()
            .map(|(index, mesh)| (index, mesh.bounds()))
            .collect();
        Self::build_recursive(items)
    }

    fn build_recursive(mut items: Vec<(usize, Aabb)>) -> Self {
        if items.len() == 1 {
            let (mesh, bbox) = items[0];
            return BvhNode::Leaf { mesh, bbox };
        }

        let bounds = items
            .iter()
            .fold(Aabb::EMPTY, |acc, (_, bbox)| acc.union(bbox));

        // Stable sort keeps input order among equal keys, so rebuilds of
        // the same mesh list produce the same tree.
        items.sort_by(|a, b| a.1.min.x.total_cmp(&b.1.min.x));

        let right_items = items.split_off(items.len() / 2);
        let left = Self::build_recursive(items);
        let right = Self::build_recursive(right_items);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox: bounds,
        }
    }

    /// Nearest hit in this subtree that beats `best`.
    ///
    /// `meshes` must be the list the tree was built from. Children are
    /// visited left then right; a candidate replaces `best` only if it is
    /// strictly nearer, so equal distances keep the first one found.
    /// Subtrees whose box starts beyond `min(best.t, t_max)` are skipped.
    pub fn intersect(
        &self,
        ray: &Ray,
        meshes: &[Arc<Mesh>],
        best: IntersectResult,
        t_max: f32,
    ) -> IntersectResult {
        match self {
            BvhNode::Empty => best,

            BvhNode::Leaf { mesh, bbox } => {
                if bbox.hit(ray, 0.0, t_max.min(best.t)).is_none() {
                    return best;
                }

                let mut candidate = meshes[*mesh].intersect(ray, t_max);
                if candidate.is_closer_than(&best) {
                    candidate.mesh = Some(*mesh);
                    candidate
                } else {
                    best
                }
            }

            BvhNode::Branch { left, right, bbox } => {
                if bbox.hit(ray, 0.0, t_max.min(best.t)).is_none() {
                    return best;
                }

                let best = left.intersect(ray, meshes, best, t_max);
                right.intersect(ray, meshes, best, t_max)
            }
        }
    }

    /// Bounding box of the whole subtree.
    pub fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BvhNode::Empty)
    }

    /// Number of levels; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Call `f(mesh_index, leaf_bbox)` for every leaf, left to right.
    pub fn for_each_leaf<F: FnMut(usize, &Aabb)>(&self, f: &mut F) {
        match self {
            BvhNode::Empty => {}
            BvhNode::Leaf { mesh, bbox } => f(*mesh, bbox),
            BvhNode::Branch { left, right, .. } => {
                left.for_each_leaf(f);
                right.for_each_leaf(f);
            }
        }
    }
}

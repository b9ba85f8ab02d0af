//! Typed mesh registry handed to the renderer by the scene graph.
//!
//! The registry owns the meshes (as shared handles) and a version counter
//! that is bumped on every structural edit. Render code snapshots the
//! registry into a [`Scene`](crate::Scene) and compares versions each pass
//! to decide when that snapshot is stale.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mesh::{Mesh, MeshId};

/// Shared, monotonically increasing scene version.
///
/// Cloning yields another handle to the same counter.
#[derive(Clone, Debug, Default)]
pub struct SceneVersion(Arc<AtomicU64>);

impl SceneVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Increment the version, returning the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Renderable meshes keyed by scene-graph path.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: BTreeMap<MeshId, Arc<Mesh>>,
    version: SceneVersion,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that bumps an existing version counter.
    pub fn with_version(version: SceneVersion) -> Self {
        Self {
            meshes: BTreeMap::new(),
            version,
        }
    }

    /// Insert or replace a mesh. Returns the previous mesh with that id.
    pub fn insert(&mut self, mesh: Mesh) -> Option<Arc<Mesh>> {
        let id = mesh.id().clone();
        log::debug!(
            "Registry: sync mesh '{}' ({} triangles)",
            id,
            mesh.triangle_count()
        );
        let previous = self.meshes.insert(id, Arc::new(mesh));
        self.version.bump();
        previous
    }

    /// Remove a mesh. The version is only bumped if something was removed.
    pub fn remove(&mut self, id: &MeshId) -> Option<Arc<Mesh>> {
        let removed = self.meshes.remove(id);
        if removed.is_some() {
            log::debug!("Registry: removed mesh '{}'", id);
            self.version.bump();
        }
        removed
    }

    /// Remove every mesh.
    pub fn clear(&mut self) {
        if !self.meshes.is_empty() {
            self.meshes.clear();
            self.version.bump();
        }
    }

    pub fn get(&self, id: &MeshId) -> Option<&Arc<Mesh>> {
        self.meshes.get(id)
    }

    /// Handles to every mesh, ordered by id.
    pub fn meshes(&self) -> Vec<Arc<Mesh>> {
        self.meshes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Current version number.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Handle to the version counter, for readers on other threads.
    pub fn version_handle(&self) -> SceneVersion {
        self.version.clone()
    }
}

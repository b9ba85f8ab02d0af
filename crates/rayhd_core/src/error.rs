use thiserror::Error;

/// Errors raised while building mesh geometry from scene-graph data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Triangle {triangle} references vertex {index}, but mesh has {vertex_count} points")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("Transform for mesh '{0}' contains non-finite values")]
    NonFiniteTransform(String),
}

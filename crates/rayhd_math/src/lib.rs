// Re-export glam for convenience
pub use glam::*;

// rayhd math types
mod aabb;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use ray::Ray;
pub use transform::Mat4Ext;

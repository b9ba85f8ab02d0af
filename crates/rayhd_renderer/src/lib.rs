//! rayhd renderer - progressive tiled ray casting.
//!
//! Renders a [`rayhd_core::Scene`] into a set of AOV render buffers. Each
//! render runs a fixed number of passes; every pass adds one jittered
//! sample per pixel, so multisampled buffers refine progressively and are
//! averaged on [`RenderBuffer::resolve`].
//!
//! [`RenderSession`] ties the pieces together: a mesh registry, a
//! [`Renderer`] and a background [`RenderThread`] that is stopped before
//! every edit.

mod aov;
mod camera;
mod config;
mod error;
mod format;
mod render_buffer;
mod render_thread;
mod renderer;
mod session;
mod shading;
mod tile;

pub use aov::{clear_color, validate_aov_bindings, AovBinding, AovName, ClearValue};
pub use camera::Camera;
pub use config::{
    RendererConfig, ENV_MAX_BOUNCES, ENV_PRINT_CONFIGURATION, ENV_RANDOM_SEED,
    ENV_SAMPLES_PER_PIXEL, ENV_TILE_SIZE,
};
pub use error::{ConfigError, RenderBufferError, RenderError, RenderResult};
pub use format::{ComponentFormat, Format};
pub use render_buffer::{lock_buffer, Component, RenderBuffer, SharedRenderBuffer};
pub use render_thread::{RenderControl, RenderState, RenderThread, RunToCompletion};
pub use renderer::{RenderStats, Renderer};
pub use session::RenderSession;
pub use shading::{random_hemisphere_direction, shade, trace, HitData};
pub use tile::{generate_tiles, DataWindow, Tile, DEFAULT_TILE_SIZE};

/// Re-export the scene types a renderer client needs
pub use rayhd_core::{IntersectResult, Mesh, MeshId, MeshRegistry, Scene};
pub use rayhd_math::{Mat4, Vec3, Vec4};

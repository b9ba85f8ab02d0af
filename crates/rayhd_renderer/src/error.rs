use thiserror::Error;

/// Errors raised by [`RenderBuffer`](crate::RenderBuffer) and pixel formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderBufferError {
    #[error("Render buffers must have depth 1, got {0}")]
    InvalidDepth(u32),

    #[error("Pixel formats have 1 to 4 components, got {0}")]
    InvalidArity(usize),
}

/// Contract violations detected while rendering.
///
/// These mean the caller handed the renderer an impossible setup. Plain
/// validation failures (bad AOV formats and the like) are not errors; they
/// are reported through [`RenderStats::validated`](crate::RenderStats).
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(
        "Render buffers have inconsistent sizes: '{aov}' is {found_width}x{found_height}, \
         expected {width}x{height}"
    )]
    InconsistentBufferSizes {
        aov: String,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("Data window {window} is larger than the {width}x{height} render buffers")]
    DataWindowOutOfBounds {
        window: String,
        width: u32,
        height: u32,
    },

    #[error("Failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Malformed configuration overrides.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}")]
    InvalidValue { var: String, value: String },
}

pub type RenderResult<T> = Result<T, RenderError>;

//! Pixel formats understood by [`RenderBuffer`](crate::RenderBuffer).
//!
//! A format is a component encoding times an arity of 1 to 4. The set of
//! encodings is closed; every buffer operation matches on it exhaustively.

use std::fmt;

use crate::error::RenderBufferError;

/// Storage type of a single pixel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentFormat {
    /// `[0, 1]` stored as `u8`, scaled by 255
    UNorm8,
    /// `[-1, 1]` stored as `i8`, scaled by 127
    SNorm8,
    /// IEEE half float
    Float16,
    Float32,
    Int32,
}

impl ComponentFormat {
    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentFormat::UNorm8 | ComponentFormat::SNorm8 => 1,
            ComponentFormat::Float16 => 2,
            ComponentFormat::Float32 | ComponentFormat::Int32 => 4,
        }
    }

    /// True if multisample sums for this encoding are kept as integers.
    pub fn is_integer(self) -> bool {
        matches!(self, ComponentFormat::Int32)
    }
}

/// A component encoding with 1 to 4 components per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    component: ComponentFormat,
    arity: u8,
}

impl Format {
    pub const UNORM8: Format = Format::of(ComponentFormat::UNorm8, 1);
    pub const UNORM8_VEC3: Format = Format::of(ComponentFormat::UNorm8, 3);
    pub const UNORM8_VEC4: Format = Format::of(ComponentFormat::UNorm8, 4);
    pub const SNORM8_VEC3: Format = Format::of(ComponentFormat::SNorm8, 3);
    pub const SNORM8_VEC4: Format = Format::of(ComponentFormat::SNorm8, 4);
    pub const FLOAT16: Format = Format::of(ComponentFormat::Float16, 1);
    pub const FLOAT16_VEC4: Format = Format::of(ComponentFormat::Float16, 4);
    pub const FLOAT32: Format = Format::of(ComponentFormat::Float32, 1);
    pub const FLOAT32_VEC2: Format = Format::of(ComponentFormat::Float32, 2);
    pub const FLOAT32_VEC3: Format = Format::of(ComponentFormat::Float32, 3);
    pub const FLOAT32_VEC4: Format = Format::of(ComponentFormat::Float32, 4);
    pub const INT32: Format = Format::of(ComponentFormat::Int32, 1);

    const fn of(component: ComponentFormat, arity: u8) -> Self {
        Self { component, arity }
    }

    /// Create a format, checking the arity.
    pub fn new(component: ComponentFormat, arity: usize) -> Result<Self, RenderBufferError> {
        match arity {
            1..=4 => Ok(Self::of(component, arity as u8)),
            _ => Err(RenderBufferError::InvalidArity(arity)),
        }
    }

    pub fn component(&self) -> ComponentFormat {
        self.component
    }

    /// Components per pixel.
    pub fn arity(&self) -> usize {
        self.arity as usize
    }

    /// Bytes per pixel.
    pub fn pixel_size(&self) -> usize {
        self.component.size() * self.arity()
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::UNORM8_VEC4
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.component {
            ComponentFormat::UNorm8 => "UNorm8",
            ComponentFormat::SNorm8 => "SNorm8",
            ComponentFormat::Float16 => "Float16",
            ComponentFormat::Float32 => "Float32",
            ComponentFormat::Int32 => "Int32",
        };
        if self.arity == 1 {
            f.write_str(base)
        } else {
            write!(f, "{}Vec{}", base, self.arity)
        }
    }
}

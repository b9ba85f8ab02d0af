//! Format-aware pixel storage with multisample accumulation.
//!
//! A single-sampled buffer is written directly in its output format. A
//! multisampled buffer keeps a running per-component sum and a per-pixel
//! sample count next to the output pixels; [`RenderBuffer::resolve`]
//! divides one by the other and converts into the output format.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use half::f16;

use crate::error::RenderBufferError;
use crate::format::{ComponentFormat, Format};

/// Render buffer shared between the renderer and whoever displays it.
pub type SharedRenderBuffer = Arc<Mutex<RenderBuffer>>;

/// Lock a shared buffer. A panic on another thread does not leave the
/// pixel data in a state worse than partially written, so poisoning is
/// ignored.
pub fn lock_buffer(buffer: &SharedRenderBuffer) -> MutexGuard<'_, RenderBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A value that can be written into a render buffer component.
pub trait Component: Copy + Default {
    fn to_f32(self) -> f32;
    fn to_i32(self) -> i32;
}

impl Component for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }
}

impl Component for i32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn to_i32(self) -> i32 {
        self
    }
}

/// Output pixels, one variant per component encoding.
#[derive(Clone, PartialEq)]
enum PixelData {
    UNorm8(Vec<u8>),
    SNorm8(Vec<i8>),
    /// Half floats kept as their bit patterns
    Float16(Vec<u16>),
    Float32(Vec<f32>),
    Int32(Vec<i32>),
}

impl PixelData {
    fn zeroed(component: ComponentFormat, len: usize) -> Self {
        match component {
            ComponentFormat::UNorm8 => PixelData::UNorm8(vec![0; len]),
            ComponentFormat::SNorm8 => PixelData::SNorm8(vec![0; len]),
            ComponentFormat::Float16 => PixelData::Float16(vec![0; len]),
            ComponentFormat::Float32 => PixelData::Float32(vec![0.0; len]),
            ComponentFormat::Int32 => PixelData::Int32(vec![0; len]),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::UNorm8(v) => v,
            PixelData::SNorm8(v) => bytemuck::cast_slice(v),
            PixelData::Float16(v) => bytemuck::cast_slice(v),
            PixelData::Float32(v) => bytemuck::cast_slice(v),
            PixelData::Int32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Convert `value` to the output encoding and store it at component `i`.
    #[inline]
    fn store<T: Component>(&mut self, i: usize, value: T) {
        match self {
            PixelData::UNorm8(v) => v[i] = (value.to_f32() * 255.0) as u8,
            PixelData::SNorm8(v) => v[i] = (value.to_f32() * 127.0) as i8,
            PixelData::Float16(v) => v[i] = f16::from_f32(value.to_f32()).to_bits(),
            PixelData::Float32(v) => v[i] = value.to_f32(),
            PixelData::Int32(v) => v[i] = value.to_i32(),
        }
    }

    /// Store the average of `count` float samples summing to `sum`.
    #[inline]
    fn store_average(&mut self, i: usize, sum: f64, count: u32) {
        self.store(i, (sum / count as f64) as f32);
    }

    /// Decode component `i` back to a float in the value's natural range.
    #[inline]
    fn load(&self, i: usize) -> f32 {
        match self {
            PixelData::UNorm8(v) => v[i] as f32 / 255.0,
            PixelData::SNorm8(v) => v[i] as f32 / 127.0,
            PixelData::Float16(v) => f16::from_bits(v[i]).to_f32(),
            PixelData::Float32(v) => v[i],
            PixelData::Int32(v) => v[i] as f32,
        }
    }
}

/// Multisample running sums, kept wider than the samples. Integer
/// formats sum as integers.
#[derive(Clone, PartialEq)]
enum SampleSums {
    Float(Vec<f64>),
    Int(Vec<i64>),
}

impl SampleSums {
    fn zeroed(component: ComponentFormat, len: usize) -> Self {
        if component.is_integer() {
            SampleSums::Int(vec![0; len])
        } else {
            SampleSums::Float(vec![0.0; len])
        }
    }

    fn reset(&mut self) {
        match self {
            SampleSums::Float(v) => v.fill(0.0),
            SampleSums::Int(v) => v.fill(0),
        }
    }

    #[inline]
    fn add<T: Component>(&mut self, i: usize, value: T) {
        match self {
            SampleSums::Float(v) => v[i] += value.to_f32() as f64,
            SampleSums::Int(v) => v[i] += value.to_i32() as i64,
        }
    }
}

/// A 2D render target.
pub struct RenderBuffer {
    width: u32,
    height: u32,
    format: Format,
    multi_sampled: bool,

    /// Resolved pixels in `format`, row-major
    buffer: PixelData,

    /// Running sums, present only when multisampled
    sums: Option<SampleSums>,

    /// Samples accumulated per pixel
    sample_count: Vec<u32>,

    mappers: usize,
    converged: bool,
}

impl RenderBuffer {
    /// An unallocated buffer.
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            format: Format::default(),
            multi_sampled: false,
            buffer: PixelData::zeroed(Format::default().component(), 0),
            sums: None,
            sample_count: Vec::new(),
            mappers: 0,
            converged: false,
        }
    }

    /// Create and allocate a buffer in one step.
    pub fn with_size(
        width: u32,
        height: u32,
        format: Format,
        multi_sampled: bool,
    ) -> Result<Self, RenderBufferError> {
        let mut buffer = Self::new();
        buffer.allocate(width, height, 1, format, multi_sampled)?;
        Ok(buffer)
    }

    /// Wrap in an `Arc<Mutex<_>>` for binding to an AOV.
    pub fn into_shared(self) -> SharedRenderBuffer {
        Arc::new(Mutex::new(self))
    }

    /// (Re)allocate storage. Any previous contents are released first,
    /// even when the new request is rejected.
    pub fn allocate(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        format: Format,
        multi_sampled: bool,
    ) -> Result<(), RenderBufferError> {
        self.deallocate();

        if depth != 1 {
            log::warn!("Render buffer allocated with depth {}; only depth 1 is supported", depth);
            return Err(RenderBufferError::InvalidDepth(depth));
        }

        let pixels = width as usize * height as usize;
        let len = pixels * format.arity();

        self.width = width;
        self.height = height;
        self.format = format;
        self.multi_sampled = multi_sampled;
        self.buffer = PixelData::zeroed(format.component(), len);
        if multi_sampled {
            self.sums = Some(SampleSums::zeroed(format.component(), len));
            self.sample_count = vec![0; pixels];
        }

        log::debug!(
            "Allocated {}x{} {} render buffer{}",
            width,
            height,
            format,
            if multi_sampled { " (multisampled)" } else { "" }
        );
        Ok(())
    }

    /// Release all storage.
    pub fn deallocate(&mut self) {
        debug_assert!(!self.is_mapped(), "deallocating a mapped render buffer");

        self.width = 0;
        self.height = 0;
        self.format = Format::default();
        self.multi_sampled = false;
        self.buffer = PixelData::zeroed(self.format.component(), 0);
        self.sums = None;
        self.sample_count = Vec::new();
        self.mappers = 0;
        self.converged = false;
    }

    pub fn map(&mut self) {
        self.mappers += 1;
    }

    pub fn unmap(&mut self) {
        debug_assert!(self.mappers > 0, "unmapping a render buffer that is not mapped");
        self.mappers = self.mappers.saturating_sub(1);
    }

    pub fn is_mapped(&self) -> bool {
        self.mappers > 0
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn set_converged(&mut self, converged: bool) {
        self.converged = converged;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        1
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_multi_sampled(&self) -> bool {
        self.multi_sampled
    }

    /// Samples accumulated at a pixel since the last clear.
    pub fn sample_count(&self, x: u32, y: u32) -> u32 {
        self.pixel_index(x, y)
            .and_then(|i| self.sample_count.get(i).copied())
            .unwrap_or(0)
    }

    fn pixel_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Write one sample at `(x, y)`.
    ///
    /// Multisampled buffers add the sample to the running sum; others
    /// overwrite the output pixel. Components beyond the format's arity
    /// are dropped and missing ones are taken as zero.
    pub fn write<T: Component>(&mut self, x: u32, y: u32, values: &[T]) {
        debug_assert!(self.is_mapped(), "writing to an unmapped render buffer");

        let Some(pixel) = self.pixel_index(x, y) else {
            debug_assert!(false, "write at ({}, {}) outside {}x{}", x, y, self.width, self.height);
            return;
        };

        let arity = self.format.arity();
        let base = pixel * arity;
        let component = |c: usize| values.get(c).copied().unwrap_or_default();

        match (&mut self.sums, self.multi_sampled) {
            (Some(sums), true) => {
                for c in 0..arity {
                    sums.add(base + c, component(c));
                }
                self.sample_count[pixel] += 1;
            }
            _ => {
                for c in 0..arity {
                    self.buffer.store(base + c, component(c));
                }
            }
        }
    }

    /// Set every output pixel to `values` and drop all accumulated samples.
    pub fn clear<T: Component>(&mut self, values: &[T]) {
        let arity = self.format.arity();
        let pixels = self.width as usize * self.height as usize;

        for pixel in 0..pixels {
            for c in 0..arity {
                let value = values.get(c).copied().unwrap_or_default();
                self.buffer.store(pixel * arity + c, value);
            }
        }

        if self.multi_sampled {
            if let Some(sums) = &mut self.sums {
                sums.reset();
            }
            self.sample_count.fill(0);
        }
    }

    /// Average the accumulated samples into the output pixels.
    ///
    /// Pixels that have received no samples keep their current value.
    pub fn resolve(&mut self) {
        if !self.multi_sampled {
            return;
        }
        let Some(sums) = &self.sums else {
            return;
        };

        let arity = self.format.arity();
        let buffer = &mut self.buffer;

        for (pixel, &count) in self.sample_count.iter().enumerate() {
            if count == 0 {
                continue;
            }
            for c in 0..arity {
                let i = pixel * arity + c;
                match sums {
                    SampleSums::Int(s) => buffer.store(i, (s[i] / count as i64) as i32),
                    SampleSums::Float(s) => buffer.store_average(i, s[i], count),
                }
            }
        }
    }

    /// Decode the output pixel at `(x, y)` to floats, one per component.
    ///
    /// UNorm8 and SNorm8 decode back to `[0, 1]` and `[-1, 1]`.
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<Vec<f32>> {
        let pixel = self.pixel_index(x, y)?;
        let arity = self.format.arity();
        Some((0..arity).map(|c| self.buffer.load(pixel * arity + c)).collect())
    }

    /// Raw output pixels, row-major, `format().pixel_size()` bytes each.
    pub fn data(&self) -> &[u8] {
        self.buffer.as_bytes()
    }
}

impl Default for RenderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("multi_sampled", &self.multi_sampled)
            .field("mapped", &self.mappers)
            .field("converged", &self.converged)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(width: u32, height: u32, format: Format, multi_sampled: bool) -> RenderBuffer {
        let mut buffer = RenderBuffer::with_size(width, height, format, multi_sampled).unwrap();
        buffer.map();
        buffer
    }

    #[test]
    fn test_depth_must_be_one() {
        let mut buffer = RenderBuffer::with_size(4, 4, Format::FLOAT32, false).unwrap();
        let err = buffer.allocate(4, 4, 2, Format::FLOAT32, false).unwrap_err();

        assert_eq!(err, RenderBufferError::InvalidDepth(2));
        // Previous contents are gone
        assert_eq!(buffer.width(), 0);
        assert!(buffer.data().is_empty());
    }

    #[test]
    fn test_map_is_counted() {
        let mut buffer = RenderBuffer::new();
        assert!(!buffer.is_mapped());

        buffer.map();
        buffer.map();
        buffer.unmap();
        assert!(buffer.is_mapped());
        buffer.unmap();
        assert!(!buffer.is_mapped());
    }

    #[test]
    fn test_single_sample_write_overwrites() {
        let mut buffer = mapped(2, 2, Format::FLOAT32_VEC3, false);
        buffer.write(1, 0, &[0.1f32, 0.2, 0.3]);
        buffer.write(1, 0, &[0.4f32, 0.5, 0.6]);

        assert_eq!(buffer.read_pixel(1, 0).unwrap(), vec![0.4, 0.5, 0.6]);
        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_extra_and_missing_components() {
        let mut buffer = mapped(1, 1, Format::FLOAT32_VEC3, false);

        buffer.write(0, 0, &[1.0f32, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![1.0, 2.0, 3.0]);

        buffer.write(0, 0, &[5.0f32]);
        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_format_conversions() {
        let mut unorm = mapped(1, 1, Format::UNORM8_VEC4, false);
        unorm.write(0, 0, &[1.0f32, 0.5, 0.0, 1.0]);
        assert_eq!(unorm.data(), &[255, 127, 0, 255]);

        let mut snorm = mapped(1, 1, Format::SNORM8_VEC4, false);
        snorm.write(0, 0, &[1.0f32, -1.0, 0.5, 0.0]);
        assert_eq!(snorm.data(), &[127u8, (-127i8) as u8, 63, 0]);

        let mut int = mapped(1, 1, Format::INT32, false);
        int.write(0, 0, &[7.9f32]);
        assert_eq!(int.read_pixel(0, 0).unwrap(), vec![7.0]);

        let mut half = mapped(1, 1, Format::FLOAT16, false);
        half.write(0, 0, &[0.333f32]);
        let v = half.read_pixel(0, 0).unwrap()[0];
        assert!((v - 0.333).abs() < 1e-3);
        assert_eq!(half.data().len(), 2);
    }

    #[test]
    fn test_multisample_average() {
        let mut buffer = mapped(1, 1, Format::FLOAT32, true);
        buffer.write(0, 0, &[1.0f32]);
        buffer.write(0, 0, &[2.0f32]);
        buffer.write(0, 0, &[6.0f32]);

        // Nothing visible until resolved
        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![0.0]);
        assert_eq!(buffer.sample_count(0, 0), 3);

        buffer.resolve();
        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_int_resolve_uses_integer_division() {
        let mut buffer = mapped(1, 1, Format::INT32, true);
        buffer.write(0, 0, &[1i32]);
        buffer.write(0, 0, &[2i32]);
        buffer.resolve();

        assert_eq!(buffer.data(), bytemuck::bytes_of(&1i32));
    }

    #[test]
    fn test_large_int_samples_do_not_overflow() {
        let mut buffer = mapped(1, 1, Format::INT32, true);
        for _ in 0..3 {
            buffer.write(0, 0, &[1_000_000_000i32]);
        }
        buffer.resolve();

        assert_eq!(buffer.data(), bytemuck::bytes_of(&1_000_000_000i32));
    }

    #[test]
    fn test_float_average_does_not_drift() {
        let mut buffer = mapped(1, 1, Format::FLOAT32_VEC3, true);
        for _ in 0..1000 {
            buffer.write(0, 0, &[0.1f32, 0.7, 0.3]);
        }
        buffer.resolve();

        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![0.1, 0.7, 0.3]);
    }

    #[test]
    fn test_unsampled_pixels_keep_value() {
        let mut buffer = mapped(2, 1, Format::FLOAT32, true);
        buffer.clear(&[9.0f32]);
        buffer.write(0, 0, &[1.0f32]);
        buffer.resolve();

        assert_eq!(buffer.read_pixel(0, 0).unwrap(), vec![1.0]);
        assert_eq!(buffer.read_pixel(1, 0).unwrap(), vec![9.0]);
    }

    #[test]
    fn test_clear_resets_accumulation() {
        let mut buffer = mapped(2, 2, Format::FLOAT32_VEC4, true);
        buffer.write(1, 1, &[1.0f32, 1.0, 1.0, 1.0]);
        buffer.clear(&[0.0f32, 0.0, 0.0, 1.0]);

        assert_eq!(buffer.sample_count(1, 1), 0);
        buffer.resolve();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(buffer.read_pixel(x, y).unwrap(), vec![0.0, 0.0, 0.0, 1.0]);
            }
        }
    }

    #[test]
    fn test_unorm_multisample_resolve() {
        let mut buffer = mapped(1, 1, Format::UNORM8_VEC4, true);
        for _ in 0..4 {
            buffer.write(0, 0, &[1.0f32, 0.5, 0.0, 1.0]);
        }
        buffer.resolve();
        assert_eq!(buffer.data(), &[255, 127, 0, 255]);
    }

    #[test]
    fn test_data_size_matches_format() {
        let buffer = RenderBuffer::with_size(3, 2, Format::FLOAT32_VEC3, false).unwrap();
        assert_eq!(buffer.data().len(), 3 * 2 * 12);
        assert!(buffer.read_pixel(3, 0).is_none());
    }
}

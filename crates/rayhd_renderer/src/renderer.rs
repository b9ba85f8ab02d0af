//! Progressive tiled renderer.
//!
//! Each call to [`Renderer::render`] runs up to `samples_per_pixel`
//! passes. A pass splits the data window into tiles, renders them in
//! parallel with rayon (one jittered sample per pixel), then adds the
//! samples to every unconverged AOV buffer. Pause is honoured between
//! passes; stop is also checked before every pixel.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayhd_core::Scene;
use rayhd_math::{Mat4, Mat4Ext, Vec4};
use rayon::prelude::*;

use crate::aov::{clear_color, validate_aov_bindings, AovBinding, AovName, ClearValue};
use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::error::{RenderError, RenderResult};
use crate::render_buffer::{lock_buffer, SharedRenderBuffer};
use crate::render_thread::RenderControl;
use crate::shading::{trace, HitData};
use crate::tile::{generate_tiles, DataWindow, Tile};

/// Summary of the last render.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// Passes that ran to the end without being stopped
    pub passes_completed: u32,
    pub passes_requested: u32,
    /// A stop request cut the render short
    pub stopped: bool,
    /// False if the AOV bindings failed validation and nothing was rendered
    pub validated: bool,
    /// Pixel samples taken across all passes
    pub samples: u64,
    pub elapsed: Duration,
}

/// A binding that will actually receive samples.
struct AovTarget {
    name: AovName,
    buffer: SharedRenderBuffer,
    /// Written to the colour AOV where the camera ray misses
    miss_color: Vec4,
}

/// Samples from one tile, `targets` values per pixel in row-major order.
struct TileSamples {
    tile: Tile,
    /// Pixels finished before a stop request, if any
    completed: usize,
    samples: Vec<Option<Vec4>>,
}

pub struct Renderer {
    config: RendererConfig,
    camera: Camera,
    data_window: DataWindow,
    aov_bindings: Vec<AovBinding>,
    bindings_need_validation: bool,
    bindings_valid: bool,
    last_stats: RenderStats,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            camera: Camera::default(),
            data_window: DataWindow::default(),
            aov_bindings: Vec::new(),
            bindings_need_validation: true,
            bindings_valid: false,
            last_stats: RenderStats::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RendererConfig) {
        self.config = config;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Set the view and projection matrices. Returns `true` if they changed.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) -> bool {
        self.camera.set_matrices(view, projection)
    }

    pub fn data_window(&self) -> DataWindow {
        self.data_window
    }

    /// Set the region to render. Returns `true` if it changed, in which
    /// case the bindings are validated again before the next render.
    pub fn set_data_window(&mut self, window: DataWindow) -> bool {
        if window == self.data_window {
            return false;
        }
        self.data_window = window;
        self.bindings_need_validation = true;
        true
    }

    pub fn aov_bindings(&self) -> &[AovBinding] {
        &self.aov_bindings
    }

    /// Replace the AOV bindings. Returns `true` if the list changed.
    pub fn set_aov_bindings(&mut self, bindings: Vec<AovBinding>) -> bool {
        if bindings == self.aov_bindings {
            return false;
        }
        self.aov_bindings = bindings;
        self.bindings_need_validation = true;
        true
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    /// Validate the bindings if they changed since the last check.
    pub fn validate(&mut self) -> bool {
        if self.bindings_need_validation {
            self.bindings_need_validation = false;
            self.bindings_valid = validate_aov_bindings(&self.aov_bindings);
        }
        self.bindings_valid
    }

    fn bound_buffers(&self) -> impl Iterator<Item = &SharedRenderBuffer> {
        self.aov_bindings
            .iter()
            .filter_map(|b| b.render_buffer.as_ref())
    }

    /// Reset every buffer that has a clear value and mark it unconverged.
    pub fn clear(&mut self) {
        if !self.validate() {
            return;
        }

        for binding in &self.aov_bindings {
            let (Some(buffer), Some(value)) = (&binding.render_buffer, &binding.clear_value)
            else {
                continue;
            };

            let mut buffer = lock_buffer(buffer);
            buffer.map();
            if binding.name == AovName::Color {
                buffer.clear(&clear_color(Some(value)).to_array());
            } else {
                match value {
                    ClearValue::Float(v) => buffer.clear(&[*v]),
                    ClearValue::Double(v) => buffer.clear(&[*v as f32]),
                    ClearValue::Int(v) => buffer.clear(&[*v]),
                    ClearValue::Vec3(v) => buffer.clear(&v.to_array()),
                    ClearValue::Vec4(v) => buffer.clear(&v.to_array()),
                    ClearValue::DVec3(v) => buffer.clear(&v.as_vec3().to_array()),
                    ClearValue::DVec4(v) => buffer.clear(&v.as_vec4().to_array()),
                    ClearValue::FloatArray(_) => {}
                }
            }
            buffer.unmap();
            buffer.set_converged(false);
        }
    }

    /// Flag every bound buffer as needing more samples.
    pub fn mark_aov_buffers_unconverged(&self) {
        for buffer in self.bound_buffers() {
            lock_buffer(buffer).set_converged(false);
        }
    }

    /// True once every bound buffer is converged.
    pub fn is_converged(&self) -> bool {
        self.bound_buffers().all(|b| lock_buffer(b).is_converged())
    }

    /// All bound buffers must share one size that contains the data window.
    fn check_buffer_sizes(&self) -> RenderResult<()> {
        let mut size: Option<(u32, u32)> = None;

        for binding in &self.aov_bindings {
            let Some(buffer) = &binding.render_buffer else {
                continue;
            };
            let buffer = lock_buffer(buffer);
            let found = (buffer.width(), buffer.height());

            match size {
                None => size = Some(found),
                Some((width, height)) if (width, height) != found => {
                    return Err(RenderError::InconsistentBufferSizes {
                        aov: binding.name.to_string(),
                        width,
                        height,
                        found_width: found.0,
                        found_height: found.1,
                    });
                }
                Some(_) => {}
            }
        }

        if let Some((width, height)) = size {
            if !self.data_window.is_empty() && !self.data_window.is_contained_in(width, height) {
                return Err(RenderError::DataWindowOutOfBounds {
                    window: self.data_window.to_string(),
                    width,
                    height,
                });
            }
        }

        Ok(())
    }

    fn aov_targets(&self) -> Vec<AovTarget> {
        self.aov_bindings
            .iter()
            .filter(|b| !matches!(b.name, AovName::Other(_)))
            .filter_map(|b| {
                let buffer = b.render_buffer.clone()?;
                let miss_color = match &b.clear_value {
                    Some(value) => clear_color(Some(value)),
                    None => self.config.background,
                };
                Some(AovTarget {
                    name: b.name.clone(),
                    buffer,
                    miss_color,
                })
            })
            .collect()
    }

    /// Render `scene` into the bound AOV buffers.
    ///
    /// Every bound buffer is marked converged on return, whether all
    /// passes ran, a stop was requested or the bindings were invalid.
    /// Inconsistent buffer sizes or a data window that does not fit the
    /// buffers are caller errors and abort the render.
    pub fn render(
        &mut self,
        scene: &Scene,
        control: &dyn RenderControl,
    ) -> RenderResult<RenderStats> {
        let start = Instant::now();
        let mut stats = RenderStats {
            passes_requested: self.config.samples_per_pixel,
            ..RenderStats::default()
        };

        if !self.validate() {
            for buffer in self.bound_buffers() {
                lock_buffer(buffer).set_converged(true);
            }
            log::warn!("Could not validate AOVs; render will not complete");
            stats.elapsed = start.elapsed();
            self.last_stats = stats;
            return Ok(stats);
        }
        stats.validated = true;

        let buffers: Vec<SharedRenderBuffer> = self.bound_buffers().cloned().collect();
        for buffer in &buffers {
            lock_buffer(buffer).map();
        }

        if let Err(err) = self.check_buffer_sizes() {
            log::error!("{}", err);
            for buffer in &buffers {
                lock_buffer(buffer).unmap();
            }
            return Err(err);
        }

        let targets = self.aov_targets();
        let tiles = generate_tiles(&self.data_window, self.config.tile_size);
        let base_seed = self.config.resolve_seed();

        log::debug!(
            "Rendering {} into {} AOVs: {} tiles, {} passes",
            self.data_window,
            targets.len(),
            tiles.len(),
            self.config.samples_per_pixel
        );

        for pass in 0..self.config.samples_per_pixel {
            control.wait_while_paused();
            if control.is_stop_requested() {
                stats.stopped = true;
                break;
            }

            let active: Vec<&AovTarget> = targets
                .iter()
                .filter(|t| !lock_buffer(&t.buffer).is_converged())
                .collect();
            if active.is_empty() || tiles.is_empty() {
                break;
            }
            let wants_color = active.iter().any(|t| t.name == AovName::Color);

            let results: Vec<TileSamples> = tiles
                .par_iter()
                .map(|tile| {
                    self.render_tile(scene, tile, pass, base_seed, &active, wants_color, control)
                })
                .collect();

            stats.samples += commit(&active, &results);

            if control.is_stop_requested() {
                stats.stopped = true;
                break;
            }
            stats.passes_completed += 1;
            log::debug!("Pass {}/{} complete", pass + 1, self.config.samples_per_pixel);
        }

        for buffer in &buffers {
            let mut buffer = lock_buffer(buffer);
            buffer.unmap();
            buffer.set_converged(true);
        }

        stats.elapsed = start.elapsed();
        log::info!(
            "Render finished: {}/{} passes, {} samples in {:.2?}{}",
            stats.passes_completed,
            stats.passes_requested,
            stats.samples,
            stats.elapsed,
            if stats.stopped { " (stopped)" } else { "" }
        );
        self.last_stats = stats;
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_tile(
        &self,
        scene: &Scene,
        tile: &Tile,
        pass: u32,
        base_seed: u64,
        targets: &[&AovTarget],
        wants_color: bool,
        control: &dyn RenderControl,
    ) -> TileSamples {
        let mut rng = StdRng::seed_from_u64(tile_seed(base_seed, pass, tile.index));
        let mut samples = Vec::with_capacity(tile.pixel_count() * targets.len());
        let mut completed = 0;

        let window = self.data_window;
        let view = self.camera.view();

        for (x, y) in tile.pixels() {
            if control.is_stop_requested() {
                break;
            }

            let jitter_x: f32 = rng.gen();
            let jitter_y: f32 = rng.gen();
            let ray = self.camera.generate_ray(
                (x - window.x) as f32 + jitter_x,
                (y - window.y) as f32 + jitter_y,
                window.width,
                window.height,
            );
            let hit = trace(
                scene,
                &ray,
                self.config.max_bounces,
                wants_color,
                &mut rng,
                &self.config,
            );

            for target in targets {
                samples.push(aov_sample(&target.name, &hit, target.miss_color, view));
            }
            completed += 1;
        }

        TileSamples {
            tile: *tile,
            completed,
            samples,
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

/// Write tile samples into the target buffers. Returns pixels sampled.
fn commit(targets: &[&AovTarget], results: &[TileSamples]) -> u64 {
    let stride = targets.len();

    for (t, target) in targets.iter().enumerate() {
        let mut buffer = lock_buffer(&target.buffer);
        for result in results {
            for (i, (x, y)) in result.tile.pixels().take(result.completed).enumerate() {
                if let Some(value) = result.samples[i * stride + t] {
                    buffer.write(x, y, &value.to_array());
                }
            }
        }
    }

    results.iter().map(|r| r.completed as u64).sum()
}

/// Value one AOV receives for one camera ray, `None` to skip the write.
///
/// Geometric AOVs are left alone where the ray misses; colour gets the
/// miss colour. Primvars are not interpolated and read as zero.
fn aov_sample(name: &AovName, hit: &HitData, miss_color: Vec4, view: Mat4) -> Option<Vec4> {
    match name {
        AovName::Color => Some(if hit.is_hit() { hit.color } else { miss_color }),
        AovName::Primvar(_) => Some(Vec4::ZERO),
        AovName::Other(_) => None,
        _ if !hit.is_hit() => None,
        AovName::Depth => Some(Vec4::new(hit.t, 0.0, 0.0, 0.0)),
        AovName::CameraDepth => {
            let depth = -view.transform_point3(hit.point).z;
            Some(Vec4::new(depth, 0.0, 0.0, 0.0))
        }
        AovName::Normal => Some(hit.normal.extend(0.0)),
        AovName::NormalEye => Some(view.transform_normal(hit.normal).extend(0.0)),
        AovName::Position => Some(hit.point.extend(1.0)),
        AovName::PositionEye => Some(view.transform_point3(hit.point).extend(1.0)),
    }
}

/// Independent deterministic stream per (seed, pass, tile).
fn tile_seed(base: u64, pass: u32, tile: usize) -> u64 {
    splitmix64(splitmix64(base ^ pass as u64) ^ tile as u64)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

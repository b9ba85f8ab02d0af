//! Renderer settings.
//!
//! Defaults match the behaviour of the plain progressive loop: ten passes,
//! one directional light and a single diffuse bounce. A handful of
//! settings can be overridden from the environment for quick experiments.

use rayhd_math::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tile::DEFAULT_TILE_SIZE;

pub const ENV_SAMPLES_PER_PIXEL: &str = "RAYHD_SAMPLES_PER_PIXEL";
pub const ENV_TILE_SIZE: &str = "RAYHD_TILE_SIZE";
pub const ENV_MAX_BOUNCES: &str = "RAYHD_MAX_BOUNCES";
pub const ENV_RANDOM_SEED: &str = "RAYHD_RANDOM_SEED";
pub const ENV_PRINT_CONFIGURATION: &str = "RAYHD_PRINT_CONFIGURATION";

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Progressive passes per render; each pass adds one sample per pixel
    pub samples_per_pixel: u32,
    /// Edge length of the square tiles handed to worker threads
    pub tile_size: u32,
    /// Shading recursion budget; 2 gives direct light plus one bounce
    pub max_bounces: u32,
    /// Direction the light travels in (towards the scene)
    pub light_direction: Vec3,
    pub light_intensity: f32,
    /// Offset applied to shadow and bounce ray origins
    pub ray_epsilon: f32,
    /// Far limit for shadow and bounce rays
    pub max_ray_distance: f32,
    /// `-1` picks a new seed per render, anything else is deterministic
    pub random_seed: i64,
    /// Colour written on a miss when the colour AOV has no clear value
    pub background: Vec4,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 10,
            tile_size: DEFAULT_TILE_SIZE,
            max_bounces: 2,
            light_direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
            light_intensity: 1.0,
            ray_epsilon: 1e-4,
            max_ray_distance: 1e4,
            random_seed: -1,
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

impl RendererConfig {
    /// Defaults with `RAYHD_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_SAMPLES_PER_PIXEL)? {
            self.samples_per_pixel = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TILE_SIZE)? {
            self.tile_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_BOUNCES)? {
            self.max_bounces = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_RANDOM_SEED)? {
            self.random_seed = v;
        }

        let print: Option<i32> = parse_var(&lookup, ENV_PRINT_CONFIGURATION)?;
        if print.is_some_and(|p| p > 0) {
            log::info!("Renderer configuration: {:#?}", self);
        }

        Ok(self)
    }

    /// Base seed for this render. Deterministic unless `random_seed` is negative.
    pub fn resolve_seed(&self) -> u64 {
        if self.random_seed >= 0 {
            return self.random_seed as u64;
        }
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.samples_per_pixel, 10);
        assert_eq!(config.tile_size, 64);
        assert_eq!(config.random_seed, -1);
        assert!((config.light_direction.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_env_overrides() {
        let config = RendererConfig::default()
            .with_overrides(lookup(&[
                (ENV_SAMPLES_PER_PIXEL, "4"),
                (ENV_TILE_SIZE, " 16 "),
                (ENV_RANDOM_SEED, "42"),
            ]))
            .unwrap();

        assert_eq!(config.samples_per_pixel, 4);
        assert_eq!(config.tile_size, 16);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.max_bounces, 2);
        assert_eq!(config.resolve_seed(), 42);
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let err = RendererConfig::default()
            .with_overrides(lookup(&[(ENV_MAX_BOUNCES, "lots")]))
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: ENV_MAX_BOUNCES.to_string(),
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_partial_json() {
        let config: RendererConfig =
            serde_json::from_str(r#"{ "samples_per_pixel": 3, "max_ray_distance": 50.0 }"#)
                .unwrap();

        assert_eq!(config.samples_per_pixel, 3);
        assert_eq!(config.max_ray_distance, 50.0);
        assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
    }
}

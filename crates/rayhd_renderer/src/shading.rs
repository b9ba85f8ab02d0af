//! Shading: one directional light with hard shadows plus diffuse bounces.
//!
//! Surface colour is the mesh's display colour. Indirect light comes from
//! one random hemisphere sample per bounce.

use rand::{Rng, RngCore};
use rayhd_core::mesh::DEFAULT_DISPLAY_COLOR;
use rayhd_core::{IntersectResult, Scene};
use rayhd_math::{Ray, Vec3, Vec4};

use crate::config::RendererConfig;

/// Everything the AOVs need from one camera ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitData {
    /// Shaded colour, alpha 1
    pub color: Vec4,
    /// Unit world-space normal facing the ray
    pub normal: Vec3,
    /// World-space hit point
    pub point: Vec3,
    /// Distance along the ray; infinite on a miss
    pub t: f32,
}

impl HitData {
    pub const MISS: HitData = HitData {
        color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        normal: Vec3::ZERO,
        point: Vec3::ZERO,
        t: f32::INFINITY,
    };

    pub fn is_hit(&self) -> bool {
        self.t.is_finite()
    }
}

/// Trace a camera ray and shade what it hits.
///
/// `shade_color` can be turned off when no colour output is wanted; the
/// geometric fields are filled in either way.
pub fn trace(
    scene: &Scene,
    ray: &Ray,
    bounces: u32,
    shade_color: bool,
    rng: &mut dyn RngCore,
    config: &RendererConfig,
) -> HitData {
    let hit = scene.intersect(ray, f32::INFINITY);
    if !hit.is_hit() {
        return HitData::MISS;
    }

    let color = if shade_color {
        shade(scene, &hit, ray, bounces, rng, config)
    } else {
        HitData::MISS.color
    };

    HitData {
        color,
        normal: hit.normal,
        point: hit.point,
        t: hit.t,
    }
}

/// Colour of a surface hit with `remaining` bounces of budget left.
pub fn shade(
    scene: &Scene,
    hit: &IntersectResult,
    ray: &Ray,
    remaining: u32,
    rng: &mut dyn RngCore,
    config: &RendererConfig,
) -> Vec4 {
    if remaining == 0 {
        return Vec4::new(0.0, 0.0, 0.0, 1.0);
    }

    // Normals come back facing the ray already; guard against callers
    // passing an unoriented one.
    let normal = if hit.normal.dot(ray.direction) > 0.0 {
        -hit.normal
    } else {
        hit.normal
    };

    let base = hit
        .mesh
        .and_then(|i| scene.mesh(i))
        .map(|m| m.display_color())
        .unwrap_or(DEFAULT_DISPLAY_COLOR);

    let to_light = -config.light_direction.normalize_or_zero();
    let mut illumination = normal.dot(to_light).max(0.0) * config.light_intensity;
    if illumination > 0.0 {
        let shadow = Ray::leaving_surface(hit.point, normal, to_light, config.ray_epsilon);
        if scene.occluded(&shadow, config.max_ray_distance) {
            illumination = 0.0;
        }
    }

    let mut color = (base * illumination).min(Vec3::ONE);

    let bounce_dir = random_hemisphere_direction(normal, rng);
    let bounce = Ray::leaving_surface(hit.point, normal, bounce_dir, config.ray_epsilon);
    let next = scene.intersect(&bounce, config.max_ray_distance);
    if next.is_hit() {
        let indirect = shade(scene, &next, &bounce, remaining - 1, rng, config);
        color += indirect.truncate() * base.length();
    }

    color.extend(1.0)
}

/// Uniform random unit vector in the hemisphere around `normal`.
///
/// Rejection-sampled from the cube `[-1, 1]^3`, normalized, and flipped
/// if it points into the surface.
pub fn random_hemisphere_direction(normal: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let direction = loop {
        let p = Vec3::new(
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
        );
        let len_sq = p.length_squared();
        if len_sq > 1e-8 && len_sq <= 1.0 {
            break p / len_sq.sqrt();
        }
    };

    if direction.dot(normal) < 0.0 {
        -direction
    } else {
        direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rayhd_core::{Mesh, MeshId, MeshRegistry};
    use rayhd_math::Mat4;

    fn lit_from_camera() -> RendererConfig {
        RendererConfig {
            // Light travels down -Z, the same way as the camera ray
            light_direction: Vec3::NEG_Z,
            ..RendererConfig::default()
        }
    }

    #[test]
    fn test_hemisphere_samples() {
        let mut rng = StdRng::seed_from_u64(3);
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();

        for _ in 0..500 {
            let d = random_hemisphere_direction(normal, &mut rng);
            assert!((d.length() - 1.0).abs() < 1e-5);
            assert!(d.dot(normal) >= 0.0);
        }
    }

    #[test]
    fn test_zero_budget_is_black() {
        let scene = Scene::empty();
        let hit = IntersectResult {
            t: 1.0,
            normal: Vec3::Z,
            ..IntersectResult::MISS
        };
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(0);

        let c = shade(&scene, &hit, &ray, 0, &mut rng, &RendererConfig::default());
        assert_eq!(c, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_direct_light_on_single_cube() {
        let mut registry = MeshRegistry::new();
        registry.insert(
            Mesh::cube(MeshId::new("/cube"), Mat4::IDENTITY)
                .with_display_color(Vec3::new(0.8, 0.4, 0.2)),
        );
        let scene = Scene::from_registry(&registry);
        let config = lit_from_camera();
        let mut rng = StdRng::seed_from_u64(1);

        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let hit = trace(&scene, &ray, config.max_bounces, true, &mut rng, &config);

        // Head-on light, nothing to bounce off: colour is exactly the base
        assert!((hit.t - 4.5).abs() < 1e-4);
        assert!((hit.color - Vec4::new(0.8, 0.4, 0.2, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_shadowed_surface_gets_no_direct_light() {
        let mut registry = MeshRegistry::new();
        registry.insert(Mesh::cube(MeshId::new("/floor"), Mat4::IDENTITY));
        // Blocker between the floor's top face and the light
        registry.insert(Mesh::cube(
            MeshId::new("/blocker"),
            Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)),
        ));
        let scene = Scene::from_registry(&registry);

        let config = RendererConfig {
            light_direction: Vec3::NEG_Y,
            max_bounces: 1,
            ..RendererConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);

        // Straight down onto the top of the floor cube
        let ray = Ray::new(Vec3::new(0.0, 2.0, 0.1), Vec3::NEG_Y);
        let hit = trace(&scene, &ray, config.max_bounces, true, &mut rng, &config);

        assert!((hit.t - 1.5).abs() < 1e-4);
        assert_eq!(hit.color, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_trace_miss() {
        let scene = Scene::empty();
        let mut rng = StdRng::seed_from_u64(0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        let hit = trace(&scene, &ray, 2, true, &mut rng, &RendererConfig::default());
        assert!(!hit.is_hit());
    }
}

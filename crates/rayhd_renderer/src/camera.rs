//! Camera for ray generation.
//!
//! The camera is defined by the host's view and projection matrices, not
//! by look-at parameters. Rays are produced by unprojecting a point on the
//! near plane through the inverse projection and inverse view.

use rayhd_math::{Mat4, Mat4Ext, Ray, Vec3};

/// View/projection pair with cached inverses.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    inverse_view: Mat4,
    inverse_projection: Mat4,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            inverse_view: view.inverse(),
            inverse_projection: projection.inverse(),
        }
    }

    /// Perspective camera at `eye` looking at `target`.
    ///
    /// `vfov` is the vertical field of view in degrees.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, vfov: f32, aspect: f32) -> Self {
        Self::new(
            Mat4::look_at_rh(eye, target, up),
            Mat4::perspective_rh_gl(vfov.to_radians(), aspect, 0.1, 1000.0),
        )
    }

    /// Replace the matrices. Inverses are only recomputed, and `true`
    /// returned, when either matrix actually changed.
    pub fn set_matrices(&mut self, view: Mat4, projection: Mat4) -> bool {
        if view == self.view && projection == self.projection {
            return false;
        }
        *self = Self::new(view, projection);
        true
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        self.inverse_view.transform_point3(Vec3::ZERO)
    }

    pub fn is_perspective(&self) -> bool {
        self.projection.is_perspective()
    }

    /// Ray through the image point `(x, y)` of a `width` x `height` image.
    ///
    /// Coordinates are in pixels, y down, so `(0.5, 0.5)` is the centre of
    /// the top-left pixel. The direction is unit length.
    pub fn generate_ray(&self, x: f32, y: f32, width: u32, height: u32) -> Ray {
        let ndc_x = 2.0 * (x / width.max(1) as f32) - 1.0;
        let ndc_y = 1.0 - 2.0 * (y / height.max(1) as f32);

        let near = self
            .inverse_projection
            .project_point3(Vec3::new(ndc_x, ndc_y, -1.0));

        let (origin, direction) = if self.is_perspective() {
            (Vec3::ZERO, near)
        } else {
            let far = self
                .inverse_projection
                .project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
            (near, far - near)
        };

        Ray::new(
            self.inverse_view.transform_point3(origin),
            self.inverse_view
                .transform_vector3(direction)
                .normalize_or_zero(),
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_looks_down_view_axis() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 90.0, 1.0);
        let ray = camera.generate_ray(50.0, 50.0, 100, 100);

        assert!((ray.origin - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn test_pixel_y_runs_down() {
        let camera = Camera::look_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 90.0, 1.0);

        let top = camera.generate_ray(50.0, 0.0, 100, 100);
        let bottom = camera.generate_ray(50.0, 100.0, 100, 100);
        assert!(top.direction.y > 0.0);
        assert!(bottom.direction.y < 0.0);

        // 90 degree fov: image edge is 45 degrees off axis
        assert!((top.direction.y - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);

        let left = camera.generate_ray(0.0, 50.0, 100, 100);
        assert!(left.direction.x < 0.0);
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::orthographic_rh_gl(-2.0, 2.0, -2.0, 2.0, 0.1, 100.0);
        let camera = Camera::new(view, proj);
        assert!(!camera.is_perspective());

        let a = camera.generate_ray(0.0, 0.0, 4, 4);
        let b = camera.generate_ray(4.0, 4.0, 4, 4);

        assert!((a.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((b.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((a.origin.x - (-2.0)).abs() < 1e-4);
        assert!((a.origin.y - 2.0).abs() < 1e-4);
        assert!((b.origin.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_matrices_detects_change() {
        let mut camera = Camera::default();
        assert!(!camera.set_matrices(Mat4::IDENTITY, Mat4::IDENTITY));

        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        assert!(camera.set_matrices(view, Mat4::IDENTITY));
        assert!((camera.position() - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-5);
        assert!(!camera.set_matrices(view, Mat4::IDENTITY));
    }
}

//! Render a few cubes through a render session and save the colour AOV.
//!
//! ```text
//! RUST_LOG=debug cargo run --example cube_render -- out.png
//! ```
//!
//! `RAYHD_SAMPLES_PER_PIXEL`, `RAYHD_MAX_BOUNCES` and friends override the
//! renderer defaults.

use anyhow::{Context, Result};
use rayhd_renderer::{
    lock_buffer, AovBinding, ClearValue, DataWindow, Format, Mat4, Mesh, MeshId, RenderBuffer,
    RenderSession, RendererConfig, Vec3, Vec4,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "cube_render.png".to_string());

    let config = RendererConfig::from_env().context("Invalid renderer override")?;
    let mut session = RenderSession::new(config)?;

    session.edit_scene(|registry| {
        registry.insert(
            Mesh::cube(
                MeshId::new("/World/floor"),
                Mat4::from_translation(Vec3::new(0.0, -0.6, 0.0))
                    * Mat4::from_scale(Vec3::new(12.0, 0.2, 12.0)),
            )
            .with_display_color(Vec3::splat(0.7)),
        );
        let colors = [
            Vec3::new(0.9, 0.2, 0.2),
            Vec3::new(0.2, 0.8, 0.3),
            Vec3::new(0.2, 0.4, 0.9),
        ];
        for (i, color) in colors.into_iter().enumerate() {
            let x = (i as f32 - 1.0) * 1.6;
            registry.insert(
                Mesh::cube(
                    MeshId::new(format!("/World/cube{}", i)),
                    Mat4::from_translation(Vec3::new(x, 0.0, 0.0))
                        * Mat4::from_rotation_y(0.4 * i as f32),
                )
                .with_display_color(color),
            );
        }
    });

    session.set_camera(
        Mat4::look_at_rh(Vec3::new(3.0, 3.0, 6.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh_gl(
            40f32.to_radians(),
            WIDTH as f32 / HEIGHT as f32,
            0.1,
            100.0,
        ),
    );
    session.set_data_window(DataWindow::from_size(WIDTH, HEIGHT));

    let color = RenderBuffer::with_size(WIDTH, HEIGHT, Format::UNORM8_VEC4, true)?.into_shared();
    session.set_aov_bindings(vec![AovBinding::new("color", color.clone())
        .with_clear_value(ClearValue::Vec4(Vec4::new(0.1, 0.1, 0.12, 1.0)))]);

    session.render();
    session.wait_until_idle();

    let stats = session.last_stats();
    log::info!(
        "{} passes, {} samples in {:.2?}",
        stats.passes_completed,
        stats.samples,
        stats.elapsed
    );

    let pixels = {
        let mut buffer = lock_buffer(&color);
        buffer.resolve();
        buffer.data().to_vec()
    };

    let image = image::RgbaImage::from_raw(WIDTH, HEIGHT, pixels)
        .context("Colour buffer has the wrong size")?;
    image
        .save(&output)
        .with_context(|| format!("Failed to write {}", output))?;
    log::info!("Saved {}", output);

    Ok(())
}

//! Render session: the renderer, its mesh registry and its render thread.
//!
//! Every edit goes through the session, which stops the render thread
//! before touching anything the render callback reads. Renders restart
//! only on an explicit [`RenderSession::render`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayhd_core::{MeshRegistry, Scene};
use rayhd_math::Mat4;

use crate::aov::AovBinding;
use crate::config::RendererConfig;
use crate::error::RenderResult;
use crate::render_thread::{RenderControl, RenderState, RenderThread};
use crate::renderer::{RenderStats, Renderer};
use crate::tile::DataWindow;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RenderSession {
    thread: RenderThread,
    registry: Arc<Mutex<MeshRegistry>>,
    renderer: Arc<Mutex<Renderer>>,
    last_stats: Arc<Mutex<RenderStats>>,
    /// Output buffers need clearing before the next render
    needs_clear: bool,
}

impl RenderSession {
    /// Create a session and start its render thread.
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        let registry = Arc::new(Mutex::new(MeshRegistry::new()));
        let renderer = Arc::new(Mutex::new(Renderer::new(config)));
        let last_stats = Arc::new(Mutex::new(RenderStats::default()));

        let mut thread = RenderThread::new();
        {
            let registry = Arc::clone(&registry);
            let renderer = Arc::clone(&renderer);
            let last_stats = Arc::clone(&last_stats);
            let mut scene: Option<Scene> = None;

            thread.set_render_callback(move |control: &dyn RenderControl| {
                let current = {
                    let registry = lock(&registry);
                    match scene.take() {
                        Some(s) if s.version() == registry.version() => scene.insert(s),
                        _ => scene.insert(Scene::from_registry(&registry)),
                    }
                };

                let mut renderer = lock(&renderer);
                match renderer.render(current, control) {
                    Ok(stats) => *lock(&last_stats) = stats,
                    Err(err) => log::error!("Render failed: {}", err),
                }
            });
        }
        thread.start_thread()?;

        Ok(Self {
            thread,
            registry,
            renderer,
            last_stats,
            needs_clear: true,
        })
    }

    /// Set the camera. Returns `true` if the matrices changed.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) -> bool {
        self.thread.stop_render();
        let changed = lock(&self.renderer).set_camera(view, projection);
        self.needs_clear |= changed;
        changed
    }

    pub fn set_data_window(&mut self, window: DataWindow) -> bool {
        self.thread.stop_render();
        let changed = lock(&self.renderer).set_data_window(window);
        self.needs_clear |= changed;
        changed
    }

    pub fn set_aov_bindings(&mut self, bindings: Vec<AovBinding>) -> bool {
        self.thread.stop_render();
        let changed = lock(&self.renderer).set_aov_bindings(bindings);
        self.needs_clear |= changed;
        changed
    }

    pub fn set_config(&mut self, config: RendererConfig) {
        self.thread.stop_render();
        lock(&self.renderer).set_config(config);
        self.needs_clear = true;
    }

    /// Edit the mesh registry with rendering stopped.
    ///
    /// The scene is rebuilt at the start of the next render if the edit
    /// bumped the registry version.
    pub fn edit_scene<R>(&mut self, edit: impl FnOnce(&mut MeshRegistry) -> R) -> R {
        self.thread.stop_render();
        let mut registry = lock(&self.registry);
        let before = registry.version();
        let result = edit(&mut registry);
        self.needs_clear |= registry.version() != before;
        result
    }

    /// Scene version the next render will see.
    pub fn scene_version(&self) -> u64 {
        lock(&self.registry).version()
    }

    /// Restart progressive rendering from scratch.
    pub fn render(&mut self) {
        self.thread.stop_render();
        {
            let mut renderer = lock(&self.renderer);
            if self.needs_clear {
                renderer.clear();
                self.needs_clear = false;
            }
            renderer.mark_aov_buffers_unconverged();
        }
        self.thread.start_render();
    }

    /// Stop the current render and wait for it to return.
    pub fn stop_render(&self) {
        self.thread.stop_render();
    }

    pub fn pause_render(&self) {
        self.thread.pause_render();
    }

    pub fn resume_render(&self) {
        self.thread.resume_render();
    }

    pub fn is_rendering(&self) -> bool {
        self.thread.is_rendering()
    }

    pub fn render_state(&self) -> RenderState {
        self.thread.state()
    }

    /// Block until the current render finishes on its own.
    pub fn wait_until_idle(&self) {
        self.thread.wait_until_idle();
    }

    /// True once rendering has stopped and every bound buffer is converged.
    pub fn is_converged(&self) -> bool {
        !self.thread.is_rendering() && lock(&self.renderer).is_converged()
    }

    /// Stats of the last render that returned normally.
    pub fn last_stats(&self) -> RenderStats {
        *lock(&self.last_stats)
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.thread.stop_thread();
    }
}

//! Background render thread.
//!
//! One worker thread is started once and reused. Each
//! [`RenderThread::start_render`] runs the render callback once on that
//! thread; [`RenderThread::stop_render`] asks the callback to return and
//! blocks until it has, so the caller can safely edit whatever the
//! callback reads.
//!
//! State machine:
//!
//! ```text
//!            start_render              callback returns
//!   Idle ─────────────────▶ Rendering ──────────────────▶ Idle
//!    ▲                        │  ▲
//!    │        stop_render     │  │ resume_render
//!    └──── Stopping ◀─────────┤  │
//!                             ▼  │
//!                           Paused
//! ```
//!
//! `stop_thread` moves any state to `Terminated` and joins the worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::RenderResult;

/// Cooperative stop/pause signals polled by the render loop.
pub trait RenderControl: Send + Sync {
    fn is_stop_requested(&self) -> bool;

    fn is_pause_requested(&self) -> bool;

    /// Block while a pause is requested, returning early on stop.
    fn wait_while_paused(&self) {
        while self.is_pause_requested() && !self.is_stop_requested() {
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Control that never stops or pauses; renders run every pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunToCompletion;

impl RenderControl for RunToCompletion {
    fn is_stop_requested(&self) -> bool {
        false
    }

    fn is_pause_requested(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Worker not started yet
    Initial,
    /// Waiting for `start_render`
    Idle,
    /// Callback running or about to run
    Rendering,
    /// Callback running but blocked on a pause request
    Paused,
    /// Callback asked to return; `stop_render` is waiting for it
    Stopping,
    /// Worker exited or exiting
    Terminated,
}

type RenderCallback = Box<dyn FnMut(&dyn RenderControl) + Send + 'static>;

/// State shared between the owner and the worker thread.
///
/// The flags are atomics so the render loop can poll them per pixel
/// without locking; they are only changed with `state` locked so that
/// waiters on `changed` never miss an update.
struct Shared {
    state: Mutex<RenderState>,
    changed: Condvar,
    stop_requested: AtomicBool,
    pause_requested: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, RenderState>) -> MutexGuard<'a, RenderState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenderControl for Shared {
    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    fn is_pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::Acquire)
    }

    fn wait_while_paused(&self) {
        let mut state = self.lock();
        if self.is_pause_requested() && !self.is_stop_requested() {
            log::debug!("Render paused");
        }
        while self.is_pause_requested() && !self.is_stop_requested() {
            if *state == RenderState::Rendering {
                *state = RenderState::Paused;
                self.changed.notify_all();
            }
            state = self.wait(state);
        }
        if *state == RenderState::Paused {
            *state = RenderState::Rendering;
            self.changed.notify_all();
        }
    }
}

pub struct RenderThread {
    shared: Arc<Shared>,
    callback: Option<RenderCallback>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RenderState::Initial),
                changed: Condvar::new(),
                stop_requested: AtomicBool::new(false),
                pause_requested: AtomicBool::new(false),
            }),
            callback: None,
            handle: None,
        }
    }

    /// Set the function run by each render. Must be called before
    /// [`RenderThread::start_thread`].
    pub fn set_render_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&dyn RenderControl) + Send + 'static,
    {
        if self.handle.is_some() {
            log::warn!("Render callback set after the render thread started; ignored");
            return;
        }
        self.callback = Some(Box::new(callback));
    }

    /// Spawn the worker thread.
    pub fn start_thread(&mut self) -> RenderResult<()> {
        if self.handle.is_some() {
            log::warn!("Render thread already started");
            return Ok(());
        }

        let mut callback: RenderCallback = match self.callback.take() {
            Some(callback) => callback,
            None => {
                log::warn!("Render thread started without a callback");
                Box::new(|_: &dyn RenderControl| {})
            }
        };
        let shared = Arc::clone(&self.shared);
        *shared.lock() = RenderState::Idle;

        let handle = std::thread::Builder::new()
            .name("rayhd-render".to_string())
            .spawn(move || worker_loop(&shared, &mut callback))?;

        self.handle = Some(handle);
        log::debug!("Render thread started");
        Ok(())
    }

    /// Terminate the worker thread and wait for it to exit.
    pub fn stop_thread(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        {
            let mut state = self.shared.lock();
            *state = RenderState::Terminated;
            self.shared.stop_requested.store(true, Ordering::Release);
            self.shared.changed.notify_all();
        }

        if handle.join().is_err() {
            log::error!("Render thread panicked");
        }
        log::debug!("Render thread stopped");
    }

    /// Ask the worker to run the callback. No-op if already rendering.
    pub fn start_render(&self) {
        let mut state = self.shared.lock();
        match *state {
            RenderState::Idle => {
                self.shared.stop_requested.store(false, Ordering::Release);
                *state = RenderState::Rendering;
                self.shared.changed.notify_all();
            }
            RenderState::Initial | RenderState::Terminated => {
                log::warn!("start_render called while the render thread is not running");
            }
            _ => {}
        }
    }

    /// Ask the callback to return and block until it has.
    ///
    /// A paused render is woken so that it can observe the stop.
    pub fn stop_render(&self) {
        let mut state = self.shared.lock();
        if matches!(*state, RenderState::Rendering | RenderState::Paused) {
            self.shared.stop_requested.store(true, Ordering::Release);
            *state = RenderState::Stopping;
            self.shared.changed.notify_all();
        }
        while *state == RenderState::Stopping {
            state = self.shared.wait(state);
        }
        if *state != RenderState::Terminated {
            self.shared.stop_requested.store(false, Ordering::Release);
        }
    }

    pub fn pause_render(&self) {
        let _state = self.shared.lock();
        self.shared.pause_requested.store(true, Ordering::Release);
        self.shared.changed.notify_all();
    }

    pub fn resume_render(&self) {
        let _state = self.shared.lock();
        self.shared.pause_requested.store(false, Ordering::Release);
        self.shared.changed.notify_all();
    }

    /// True while a render is pending, running or paused.
    pub fn is_rendering(&self) -> bool {
        matches!(
            *self.shared.lock(),
            RenderState::Rendering | RenderState::Paused
        )
    }

    pub fn is_pause_requested(&self) -> bool {
        self.shared.is_pause_requested()
    }

    pub fn state(&self) -> RenderState {
        *self.shared.lock()
    }

    /// Block until the current render, if any, has finished on its own.
    ///
    /// Returns immediately when idle. Waiting on a paused render blocks
    /// until it is resumed or stopped.
    pub fn wait_until_idle(&self) {
        let mut state = self.shared.lock();
        while matches!(
            *state,
            RenderState::Rendering | RenderState::Paused | RenderState::Stopping
        ) {
            state = self.shared.wait(state);
        }
    }
}

impl Default for RenderThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn worker_loop(shared: &Shared, callback: &mut RenderCallback) {
    loop {
        {
            let mut state = shared.lock();
            loop {
                match *state {
                    RenderState::Terminated => return,
                    RenderState::Rendering => break,
                    RenderState::Stopping => {
                        // Stopped before the callback got to run
                        *state = RenderState::Idle;
                        shared.changed.notify_all();
                    }
                    _ => state = shared.wait(state),
                }
            }
        }

        // The state must leave Rendering even when the render panics
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(shared))) {
            log::error!("Render callback panicked: {}", panic_message(&*payload));
        }

        let mut state = shared.lock();
        if *state == RenderState::Terminated {
            return;
        }
        *state = RenderState::Idle;
        shared.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_render_runs_callback_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let mut thread = RenderThread::new();
        thread.set_render_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        thread.start_thread().unwrap();
        assert_eq!(thread.state(), RenderState::Idle);

        thread.start_render();
        thread.wait_until_idle();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        thread.start_render();
        thread.wait_until_idle();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        thread.stop_thread();
        assert_eq!(thread.state(), RenderState::Terminated);
    }

    #[test]
    fn test_stop_interrupts_long_render() {
        let mut thread = RenderThread::new();
        thread.set_render_callback(|control| {
            while !control.is_stop_requested() {
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        thread.start_thread().unwrap();

        thread.start_render();
        assert!(thread.is_rendering());

        let start = Instant::now();
        thread.stop_render();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(thread.state(), RenderState::Idle);
        assert!(!thread.is_rendering());
    }

    #[test]
    fn test_pause_and_resume() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);

        let mut thread = RenderThread::new();
        thread.set_render_callback(move |control| {
            for _ in 0..1000 {
                control.wait_while_paused();
                if control.is_stop_requested() {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        thread.start_thread().unwrap();

        thread.pause_render();
        thread.start_render();

        // Paused before the first pass: nothing runs
        let deadline = Instant::now() + Duration::from_secs(5);
        while thread.state() != RenderState::Paused && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(thread.state(), RenderState::Paused);
        assert_eq!(passes.load(Ordering::SeqCst), 0);

        thread.resume_render();
        while passes.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(passes.load(Ordering::SeqCst) > 0);

        // Stop wakes a paused render
        thread.pause_render();
        thread.stop_render();
        assert!(!thread.is_rendering());
    }

    #[test]
    fn test_panicking_render_returns_to_idle() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let mut thread = RenderThread::new();
        thread.set_render_callback(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("render failed");
            }
        });
        thread.start_thread().unwrap();

        thread.start_render();
        thread.wait_until_idle();
        assert_eq!(thread.state(), RenderState::Idle);

        // Stop and a second render still work after the panic
        thread.stop_render();
        thread.start_render();
        thread.wait_until_idle();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        thread.stop_thread();
        assert_eq!(thread.state(), RenderState::Terminated);
    }

    #[test]
    fn test_stop_when_idle_returns() {
        let mut thread = RenderThread::new();
        thread.start_thread().unwrap();
        thread.stop_render();
        assert_eq!(thread.state(), RenderState::Idle);
    }
}

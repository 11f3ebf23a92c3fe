//! The per-session compositor thread.
//!
//! EndFrame hands a [`FrameDescription`] to the thread through a single slot
//! guarded by a mutex and blocks until the thread has composited it, so the
//! application is never more than one frame ahead of the display.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use openxr::sys;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use crate::error::XrError;
use crate::graphics::{ComposedView, PresentStatus, Presenter};
use crate::swapchain::SwapchainImages;
use crate::types::{Result, VIEW_COUNT};

/// One eye of a submitted projection layer.
#[derive(Clone)]
pub struct ProjectionView {
    pub swapchain: Arc<SwapchainImages>,
    pub image_rect: sys::Rect2Di,
}

#[derive(Clone, Default)]
pub struct ProjectionLayer {
    pub views: Vec<ProjectionView>,
}

/// Snapshot of an `XrFrameEndInfo`, owned by the compositor once submitted.
#[derive(Clone, Default)]
pub struct FrameDescription {
    pub display_time: i64,
    pub layer_count: u32,
    pub projection_layers: Vec<ProjectionLayer>,
}

impl std::fmt::Debug for FrameDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDescription")
            .field("display_time", &self.display_time)
            .field("layer_count", &self.layer_count)
            .finish_non_exhaustive()
    }
}

enum Slot {
    Idle,
    Pending(FrameDescription),
    Compositing,
}

struct State {
    slot: Slot,
    shutdown: bool,
    instance_lost: bool,
    exited: bool,
    frames: u64,
}

struct Rendezvous {
    state: Mutex<State>,
    signal: Condvar,
}

pub struct Compositor {
    rendezvous: Arc<Rendezvous>,
    thread: Option<JoinHandle<()>>,
}

impl Compositor {
    pub fn spawn<P: Presenter>(presenter: P) -> Result<Self> {
        let rendezvous = Arc::new(Rendezvous {
            state: Mutex::new(State {
                slot: Slot::Idle,
                shutdown: false,
                instance_lost: false,
                exited: false,
                frames: 0,
            }),
            signal: Condvar::new(),
        });
        let thread = thread::Builder::new()
            .name("xr-compositor".into())
            .spawn({
                let rendezvous = rendezvous.clone();
                move || run(&rendezvous, presenter)
            })
            .map_err(|err| {
                XrError::RuntimeFailure(format!("cannot start compositor thread: {err}").into())
            })?;
        Ok(Self {
            rendezvous,
            thread: Some(thread),
        })
    }

    /// Posts a frame and blocks until the compositor has shown it.
    ///
    /// Fails with instance-lost if the output window was closed while
    /// compositing an earlier frame.
    pub fn submit(&self, frame: FrameDescription) -> Result<()> {
        let mut state = self.rendezvous.state.lock();
        if state.instance_lost {
            return Err(XrError::InstanceLost("the compositor window was closed"));
        }
        if state.shutdown || state.exited {
            return Err(XrError::InstanceLost("the compositor thread has stopped"));
        }
        let composited = state.frames + 1;
        state.slot = Slot::Pending(frame);
        self.rendezvous.signal.notify_all();
        while !matches!(state.slot, Slot::Idle) && !state.exited {
            self.rendezvous.signal.wait(&mut state);
        }
        if state.frames < composited {
            return Err(XrError::InstanceLost("the compositor thread has stopped"));
        }
        Ok(())
    }

    #[cfg(test)]
    fn is_instance_lost(&self) -> bool {
        self.rendezvous.state.lock().instance_lost
    }

    /// Number of frames composited so far.
    pub fn frames(&self) -> u64 {
        self.rendezvous.state.lock().frames
    }

    /// Stops the thread and waits for it to exit. A frame that has not been
    /// picked up yet is dropped.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        {
            let mut state = self.rendezvous.state.lock();
            state.shutdown = true;
            self.rendezvous.signal.notify_all();
        }
        if thread.join().is_err() {
            error!("compositor thread panicked");
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Releases anyone blocked in `submit` when the thread exits, including by
/// panic.
struct ExitGuard<'a>(&'a Rendezvous);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.exited = true;
        state.slot = Slot::Idle;
        self.0.signal.notify_all();
    }
}

fn run<P: Presenter>(rendezvous: &Rendezvous, mut presenter: P) {
    let _exit = ExitGuard(rendezvous);
    let active = match presenter.activate() {
        Ok(()) => true,
        Err(err) => {
            error!("compositor failed to start: {err}");
            rendezvous.state.lock().instance_lost = true;
            false
        }
    };
    debug!("compositor thread running");

    loop {
        let frame = {
            let mut state = rendezvous.state.lock();
            while !state.shutdown && !matches!(state.slot, Slot::Pending(_)) {
                rendezvous.signal.wait(&mut state);
            }
            if state.shutdown {
                debug!("compositor thread shutting down");
                return;
            }
            match mem::replace(&mut state.slot, Slot::Compositing) {
                Slot::Pending(frame) => frame,
                _ => continue,
            }
        };

        let status = if active {
            composite(&mut presenter, &frame)
        } else {
            PresentStatus::Presented
        };

        let mut state = rendezvous.state.lock();
        state.slot = Slot::Idle;
        state.frames += 1;
        if status == PresentStatus::WindowClosed && !state.instance_lost {
            warn!("compositor window closed, the instance is lost");
            state.instance_lost = true;
        }
        rendezvous.signal.notify_all();
    }
}

/// Samples the most recently released image of every view and presents them.
fn composite<P: Presenter>(presenter: &mut P, frame: &FrameDescription) -> PresentStatus {
    let mut sampled = Vec::new();
    let mut views = Vec::new();
    for layer in &frame.projection_layers {
        for (eye, view) in layer.views.iter().enumerate().take(VIEW_COUNT) {
            let (slot, texture) = view.swapchain.begin_sampling();
            sampled.push((&view.swapchain, slot));
            views.push(ComposedView {
                eye,
                texture,
                image_extent: view.swapchain.extent(),
                image_rect: view.image_rect,
            });
        }
    }
    trace!(
        display_time = frame.display_time,
        layers = frame.layer_count,
        views = views.len(),
        "compositing frame"
    );
    let status = presenter.present(&views);
    for (swapchain, slot) in sampled {
        swapchain.end_sampling(slot);
    }
    status
}

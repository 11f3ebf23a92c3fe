//! Graphics without a GL context: image names are counters and presenting a
//! frame only counts it. Used for bindings that have no native presenter and
//! for running the runtime without a display server.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::trace;
use xr_gl_window::WindowConfig;

use super::{ComposedView, GraphicsDevice, PresentStatus, Presenter};
use crate::types::{Result, SwapchainCreateInfo};

pub struct Headless {
    next_image: AtomicU32,
    window_closed: Arc<AtomicBool>,
}

impl Default for Headless {
    fn default() -> Self {
        Self {
            next_image: AtomicU32::new(1),
            window_closed: Arc::default(),
        }
    }
}

impl Headless {
    /// Acts as if the user closed the output window: the frame composited
    /// next reports [`PresentStatus::WindowClosed`].
    pub fn close_window(&self) {
        self.window_closed.store(true, Ordering::Release);
    }
}

impl GraphicsDevice for Headless {
    type Presenter = HeadlessPresenter;

    fn create_images(&self, info: &SwapchainCreateInfo, count: u32) -> Result<Vec<u32>> {
        let first = self.next_image.fetch_add(count, Ordering::Relaxed);
        trace!(
            first,
            count,
            width = info.width,
            height = info.height,
            "allocated headless images"
        );
        Ok((first..first + count).collect())
    }

    fn destroy_images(&self, images: &[u32]) {
        trace!(?images, "released headless images");
    }

    fn create_presenter(&self, window: &WindowConfig) -> Result<HeadlessPresenter> {
        Ok(HeadlessPresenter {
            size: (window.width, window.height),
            frames: 0,
            window_closed: self.window_closed.clone(),
        })
    }
}

#[derive(Debug)]
pub struct HeadlessPresenter {
    size: (u32, u32),
    frames: u64,
    window_closed: Arc<AtomicBool>,
}

impl Presenter for HeadlessPresenter {
    fn activate(&mut self) -> Result<()> {
        trace!(size = ?self.size, "headless presenter active");
        Ok(())
    }

    fn present(&mut self, views: &[ComposedView]) -> PresentStatus {
        if self.window_closed.load(Ordering::Acquire) {
            return PresentStatus::WindowClosed;
        }
        self.frames += 1;
        trace!(frame = self.frames, views = views.len(), "composited headless frame");
        PresentStatus::Presented
    }
}

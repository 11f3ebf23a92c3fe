use std::sync::Arc;
use std::time::{Duration, Instant};

use openxr::sys;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::config::SwapchainWaitPolicy;
use crate::types::SwapchainCreateInfo;

/// Independent acquire and release cursors over a fixed number of images.
///
/// The application acquires slots in order and releases them in the same
/// order; the compositor reads the slot released most recently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRing {
    len: u32,
    acquire: u32,
    release: u32,
}

impl SwapchainRing {
    pub const TRIPLE_BUFFERED: u32 = 3;

    pub fn new(len: u32) -> Self {
        Self {
            len: len.max(1),
            acquire: 0,
            release: 0,
        }
    }

    /// One image for static swapchains, three otherwise.
    pub fn for_create_info(info: &SwapchainCreateInfo) -> Self {
        Self::new(if info.is_static() {
            1
        } else {
            Self::TRIPLE_BUFFERED
        })
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn acquire_cursor(&self) -> u32 {
        self.acquire
    }

    pub fn release_cursor(&self) -> u32 {
        self.release
    }

    /// Returns the slot to render into next and advances the acquire cursor.
    pub fn acquire(&mut self) -> u32 {
        let index = self.acquire;
        self.acquire = (self.acquire + 1) % self.len;
        index
    }

    /// Publishes the oldest acquired slot and advances the release cursor.
    pub fn release(&mut self) -> u32 {
        let index = self.release;
        self.release = (self.release + 1) % self.len;
        index
    }

    /// The slot just before `cursor`.
    pub fn previous(&self, cursor: u32) -> u32 {
        (cursor + self.len - 1) % self.len
    }

    /// The slot most recently handed to the compositor.
    pub fn last_released(&self) -> u32 {
        self.previous(self.release)
    }
}

/// The part of a swapchain the compositor thread reads while it composites.
pub struct SwapchainImages {
    textures: Vec<u32>,
    extent: (u32, u32),
    ring: Mutex<SwapchainRing>,
    /// Per-slot count of views the compositor is currently sampling.
    in_use: Mutex<Vec<u32>>,
    freed: Condvar,
}

impl SwapchainImages {
    pub fn new(textures: Vec<u32>, extent: (u32, u32), ring: SwapchainRing) -> Self {
        let in_use = vec![0; textures.len()];
        Self {
            textures,
            extent,
            ring: Mutex::new(ring),
            in_use: Mutex::new(in_use),
            freed: Condvar::new(),
        }
    }

    pub fn textures(&self) -> &[u32] {
        &self.textures
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn ring(&self) -> SwapchainRing {
        *self.ring.lock()
    }

    /// Marks the last released slot as being read by the compositor and
    /// returns it with its texture name.
    pub fn begin_sampling(&self) -> (u32, u32) {
        let slot = self.ring.lock().last_released();
        self.in_use.lock()[slot as usize] += 1;
        (slot, self.textures[slot as usize])
    }

    pub fn end_sampling(&self, slot: u32) {
        let mut in_use = self.in_use.lock();
        let count = &mut in_use[slot as usize];
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.freed.notify_all();
        }
    }

    /// Blocks until the compositor stops reading `slot`. Returns `false` if
    /// `timeout` expired first; `None` waits forever.
    pub fn wait_until_free(&self, slot: u32, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut in_use = self.in_use.lock();
        while in_use[slot as usize] > 0 {
            match deadline {
                Some(deadline) => {
                    if self.freed.wait_until(&mut in_use, deadline).timed_out() {
                        return in_use[slot as usize] == 0;
                    }
                }
                None => self.freed.wait(&mut in_use),
            }
        }
        true
    }
}

/// A ring of color images owned by a session.
pub struct Swapchain {
    pub session: sys::Session,
    pub create_info: SwapchainCreateInfo,
    pub images: Arc<SwapchainImages>,
}

impl Swapchain {
    pub fn new(
        session: sys::Session,
        create_info: SwapchainCreateInfo,
        textures: Vec<u32>,
    ) -> Self {
        let ring = SwapchainRing::for_create_info(&create_info);
        let extent = (create_info.width, create_info.height);
        Self {
            session,
            create_info,
            images: Arc::new(SwapchainImages::new(textures, extent, ring)),
        }
    }

    pub fn len(&self) -> u32 {
        self.images.ring().len()
    }

    pub fn acquire(&self) -> u32 {
        let index = self.images.ring.lock().acquire();
        trace!(index, "acquired swapchain image");
        index
    }

    /// Waits until the image at the release cursor may be written.
    ///
    /// Returns `TIMEOUT_EXPIRED` (a success code) if the compositor still
    /// reads the image when `timeout` runs out.
    pub fn wait(&self, timeout: sys::Duration, policy: SwapchainWaitPolicy) -> sys::Result {
        if policy == SwapchainWaitPolicy::Elide {
            return sys::Result::SUCCESS;
        }
        let slot = self.images.ring().release_cursor();
        let timeout = match timeout.as_nanos() {
            nanos if nanos == sys::Duration::INFINITE.as_nanos() => None,
            nanos => Some(Duration::from_nanos(nanos.max(0) as u64)),
        };
        if self.images.wait_until_free(slot, timeout) {
            sys::Result::SUCCESS
        } else {
            sys::Result::TIMEOUT_EXPIRED
        }
    }

    pub fn release(&self) -> u32 {
        let index = self.images.ring.lock().release();
        trace!(index, "released swapchain image");
        index
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::types::{SwapchainCreateFlags, SwapchainUsageFlags};

    fn create_info(flags: SwapchainCreateFlags) -> SwapchainCreateInfo {
        SwapchainCreateInfo {
            create_flags: flags,
            usage_flags: SwapchainUsageFlags::COLOR_ATTACHMENT,
            format: glow::RGBA8 as i64,
            sample_count: 4,
            width: 1024,
            height: 1024,
            face_count: 1,
            array_size: 1,
            mip_count: 1,
        }
    }

    #[test]
    fn acquire_cycles_through_three_images() {
        let mut ring = SwapchainRing::for_create_info(&create_info(SwapchainCreateFlags::EMPTY));
        assert_eq!(ring.len(), 3);
        let indices: Vec<_> = (0..4).map(|_| ring.acquire()).collect();
        assert_eq!(indices, [0, 1, 2, 0]);
        assert_eq!(ring.acquire_cursor(), 4 % 3);
        assert_eq!(ring.release_cursor(), 0);
    }

    #[test]
    fn static_ring_always_yields_slot_zero() {
        let mut ring =
            SwapchainRing::for_create_info(&create_info(SwapchainCreateFlags::STATIC_IMAGE));
        assert_eq!(ring.len(), 1);
        for _ in 0..3 {
            assert_eq!(ring.acquire(), 0);
            assert_eq!(ring.release(), 0);
            assert_eq!(ring.last_released(), 0);
        }
    }

    #[test]
    fn previous_wraps_around() {
        let ring = SwapchainRing::new(3);
        assert_eq!(ring.previous(0), 2);
        assert_eq!(ring.previous(1), 0);
        assert_eq!(ring.previous(2), 1);
    }

    #[test]
    fn compositor_samples_the_last_released_image() {
        let swapchain = Swapchain::new(
            sys::Session::NULL,
            create_info(SwapchainCreateFlags::EMPTY),
            vec![11, 12, 13],
        );
        assert_eq!(swapchain.acquire(), 0);
        assert_eq!(swapchain.acquire(), 1);
        swapchain.release();
        assert_eq!(swapchain.images.begin_sampling(), (0, 11));
        swapchain.images.end_sampling(0);
        swapchain.release();
        assert_eq!(swapchain.images.begin_sampling(), (1, 12));
        swapchain.images.end_sampling(1);
    }

    #[test]
    fn wait_times_out_while_the_compositor_samples() {
        let swapchain = Swapchain::new(
            sys::Session::NULL,
            create_info(SwapchainCreateFlags::STATIC_IMAGE),
            vec![7],
        );
        swapchain.acquire();
        swapchain.release();
        let (slot, _) = swapchain.images.begin_sampling();

        let short = sys::Duration::from_nanos(1_000_000);
        assert_eq!(
            swapchain.wait(short, SwapchainWaitPolicy::TrackCompositor),
            sys::Result::TIMEOUT_EXPIRED
        );
        assert_eq!(
            swapchain.wait(short, SwapchainWaitPolicy::Elide),
            sys::Result::SUCCESS
        );

        let images = swapchain.images.clone();
        let compositor = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            images.end_sampling(slot);
        });
        assert_eq!(
            swapchain.wait(sys::Duration::INFINITE, SwapchainWaitPolicy::TrackCompositor),
            sys::Result::SUCCESS
        );
        compositor.join().unwrap();
    }
}

//! GLX-backed graphics: swapchain textures live in the application's context
//! and the compositor draws them into a window whose context shares objects
//! with it.

use std::num::NonZeroU32;
use std::thread::{self, ThreadId};

use glow::HasContext;
use openxr::sys;
use tracing::{debug, error, warn};
use xr_gl_window::glx::{load_current_gl, ApplicationContext, GlxWindow};
use xr_gl_window::WindowConfig;

use super::{ComposedView, GraphicsDevice, PresentStatus, Presenter};
use crate::error::XrError;
use crate::render::StereoQuadPass;
use crate::types::{Result, SwapchainCreateInfo};

const TEXTURE_PARAMETERS: [(u32, u32); 4] = [
    (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
    (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
    (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
    (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
];

/// A value that may only be used on the thread that created it.
struct ThreadBound<T> {
    owner: ThreadId,
    value: T,
}

impl<T> ThreadBound<T> {
    fn new(value: T) -> Self {
        Self {
            owner: thread::current().id(),
            value,
        }
    }

    fn get(&self) -> Option<&T> {
        (thread::current().id() == self.owner).then_some(&self.value)
    }
}

pub struct OpenGl {
    app: ApplicationContext,
    gl: ThreadBound<glow::Context>,
}

// The raw GLX handles are only dereferenced by Xlib, and the GL function table
// is only used after checking the calling thread.
unsafe impl Send for OpenGl {}
unsafe impl Sync for OpenGl {}

impl OpenGl {
    /// Makes the application's context current on this thread and loads GL.
    ///
    /// # Safety
    ///
    /// The binding's display, drawable and context must be alive.
    pub unsafe fn new(binding: &sys::GraphicsBindingOpenGLXlibKHR) -> Result<Self> {
        let app = ApplicationContext::from_raw(
            binding.x_display,
            binding.glx_drawable,
            binding.glx_context,
        );
        if app.is_null() {
            return Err(XrError::GraphicsDeviceInvalid(
                "Xlib binding has a null display or context",
            ));
        }
        app.make_current()
            .map_err(|_| XrError::GraphicsDeviceInvalid("cannot make the GLX context current"))?;
        let gl = load_current_gl();
        debug!(
            "application GL context: {}",
            gl.get_parameter_string(glow::VERSION)
        );
        Ok(Self {
            app,
            gl: ThreadBound::new(gl),
        })
    }

    fn gl(&self) -> Result<&glow::Context> {
        self.gl.get().ok_or(XrError::RuntimeFailure(
            "OpenGL calls must come from the thread that created the session".into(),
        ))
    }
}

impl GraphicsDevice for OpenGl {
    type Presenter = GlxPresenter;

    fn create_images(&self, info: &SwapchainCreateInfo, count: u32) -> Result<Vec<u32>> {
        let gl = self.gl()?;
        let mut images = Vec::with_capacity(count as usize);
        unsafe {
            for _ in 0..count {
                let texture = gl.create_texture().map_err(|err| {
                    XrError::RuntimeFailure(format!("cannot create texture: {err}").into())
                })?;
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                for (parameter, value) in TEXTURE_PARAMETERS {
                    gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value as i32);
                }
                gl.tex_storage_2d(
                    glow::TEXTURE_2D,
                    1,
                    info.format as u32,
                    info.width as i32,
                    info.height as i32,
                );
                images.push(texture.0.get());
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
            let error = gl.get_error();
            if error != glow::NO_ERROR {
                warn!("GL error {error:#x} while allocating swapchain images");
            }
        }
        Ok(images)
    }

    fn destroy_images(&self, images: &[u32]) {
        let Ok(gl) = self.gl() else {
            warn!(
                "leaking {} swapchain textures destroyed off the session's thread",
                images.len()
            );
            return;
        };
        for texture in images.iter().copied().filter_map(NonZeroU32::new) {
            unsafe { gl.delete_texture(glow::NativeTexture(texture)) };
        }
    }

    fn create_presenter(&self, window: &WindowConfig) -> Result<GlxPresenter> {
        let window = unsafe { GlxWindow::new(window, self.app.context)? };
        Ok(GlxPresenter {
            window,
            gl: None,
        })
    }
}

pub struct GlxPresenter {
    window: GlxWindow,
    gl: Option<(glow::Context, StereoQuadPass)>,
}

// GL state is created in `activate` and dropped on the compositor thread.
unsafe impl Send for GlxPresenter {}

impl Presenter for GlxPresenter {
    fn activate(&mut self) -> Result<()> {
        self.window.make_current()?;
        let gl = unsafe { load_current_gl() };
        let pass = unsafe { StereoQuadPass::new(&gl)? };
        self.gl = Some((gl, pass));
        Ok(())
    }

    fn present(&mut self, views: &[ComposedView]) -> PresentStatus {
        if self.window.poll_close_requested() {
            return PresentStatus::WindowClosed;
        }
        let Some((gl, pass)) = &self.gl else {
            error!("compositor presenter used before activation");
            return PresentStatus::Presented;
        };
        unsafe { pass.draw(gl, views, self.window.size()) };
        self.window.swap_buffers();
        PresentStatus::Presented
    }
}

impl Drop for GlxPresenter {
    fn drop(&mut self) {
        if let Some((gl, pass)) = self.gl.take() {
            unsafe { pass.destroy(&gl) };
        }
    }
}

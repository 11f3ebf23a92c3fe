//! GLX implementation: an X11 window with a context shared from the
//! application's context.

use std::ffi::{c_void, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_ulong};
use std::ptr;

use tracing::{debug, warn};
use x11::{glx, xlib};

use crate::{GlWindowError, Result, WindowConfig};

const FRAMEBUFFER_ATTRIBUTES: &[c_int] = &[
    glx::GLX_X_RENDERABLE,
    1,
    glx::GLX_DRAWABLE_TYPE,
    glx::GLX_WINDOW_BIT,
    glx::GLX_RENDER_TYPE,
    glx::GLX_RGBA_BIT,
    glx::GLX_X_VISUAL_TYPE,
    glx::GLX_TRUE_COLOR,
    glx::GLX_RED_SIZE,
    8,
    glx::GLX_GREEN_SIZE,
    8,
    glx::GLX_BLUE_SIZE,
    8,
    glx::GLX_ALPHA_SIZE,
    8,
    glx::GLX_DEPTH_SIZE,
    24,
    glx::GLX_STENCIL_SIZE,
    8,
    glx::GLX_DOUBLEBUFFER,
    1,
    0,
];

/// Loads GL entry points for whichever GLX context is current on this thread.
///
/// # Safety
///
/// A GLX context must be current on the calling thread, and the returned
/// context may only be used while it stays current.
pub unsafe fn load_current_gl() -> glow::Context {
    glow::Context::from_loader_function(|name| {
        let Ok(name) = CString::new(name) else {
            return ptr::null();
        };
        glx::glXGetProcAddress(name.as_ptr().cast())
            .map_or(ptr::null(), |function| function as *const c_void)
    })
}

/// The application's own GLX context, as handed to the runtime in its
/// graphics binding. The runtime never destroys it.
#[derive(Clone, Copy, Debug)]
pub struct ApplicationContext {
    pub display: *mut xlib::Display,
    pub drawable: glx::GLXDrawable,
    pub context: glx::GLXContext,
}

impl ApplicationContext {
    /// # Safety
    ///
    /// The pointers must come from a live Xlib graphics binding.
    pub unsafe fn from_raw(display: *mut c_void, drawable: c_ulong, context: *mut c_void) -> Self {
        Self {
            display: display.cast(),
            drawable,
            context: context.cast(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.display.is_null() || self.context.is_null()
    }

    /// Binds the application context to the calling thread.
    ///
    /// # Safety
    ///
    /// The display, drawable and context must still be alive.
    pub unsafe fn make_current(&self) -> Result<()> {
        if glx::glXMakeCurrent(self.display, self.drawable, self.context) == 0 {
            return Err(GlWindowError::MakeCurrent);
        }
        Ok(())
    }
}

/// A window on its own X connection whose GL context shares textures with an
/// [`ApplicationContext`].
///
/// The window may be created on one thread and then moved to another, but it
/// must only be used from one thread at a time and dropped on the thread that
/// last made it current.
pub struct GlxWindow {
    display: *mut xlib::Display,
    window: xlib::Window,
    colormap: xlib::Colormap,
    context: glx::GLXContext,
    wm_delete_window: xlib::Atom,
    width: u32,
    height: u32,
    close_requested: bool,
}

// The X connection is private to this window, so moving it between threads is
// sound as long as it is not used concurrently.
unsafe impl Send for GlxWindow {}

impl GlxWindow {
    /// Opens a window and creates a context sharing objects with `share_with`.
    ///
    /// # Safety
    ///
    /// `share_with` must be a live GLX context (or null for no sharing).
    pub unsafe fn new(config: &WindowConfig, share_with: glx::GLXContext) -> Result<Self> {
        let title = CString::new(config.title.as_bytes())?;

        let display = xlib::XOpenDisplay(ptr::null());
        if display.is_null() {
            return Err(GlWindowError::OpenDisplay);
        }
        let screen = xlib::XDefaultScreen(display);

        let mut count = 0;
        let configs =
            glx::glXChooseFBConfig(display, screen, FRAMEBUFFER_ATTRIBUTES.as_ptr(), &mut count);
        if configs.is_null() || count == 0 {
            xlib::XCloseDisplay(display);
            return Err(GlWindowError::NoFramebufferConfig);
        }
        let fb_config = *configs;
        xlib::XFree(configs.cast());

        let visual = glx::glXGetVisualFromFBConfig(display, fb_config);
        if visual.is_null() {
            xlib::XCloseDisplay(display);
            return Err(GlWindowError::NoVisual);
        }

        let root = xlib::XRootWindow(display, screen);
        let colormap = xlib::XCreateColormap(display, root, (*visual).visual, xlib::AllocNone);
        let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
        attributes.colormap = colormap;
        attributes.event_mask = xlib::StructureNotifyMask;
        let window = xlib::XCreateWindow(
            display,
            root,
            0,
            0,
            config.width,
            config.height,
            0,
            (*visual).depth,
            xlib::InputOutput as u32,
            (*visual).visual,
            xlib::CWColormap | xlib::CWEventMask,
            &mut attributes,
        );
        xlib::XFree(visual.cast());

        xlib::XStoreName(display, window, title.as_ptr());
        let wm_delete_window = xlib::XInternAtom(
            display,
            b"WM_DELETE_WINDOW\0".as_ptr() as *const c_char,
            xlib::False,
        );
        let mut protocols = [wm_delete_window];
        xlib::XSetWMProtocols(display, window, protocols.as_mut_ptr(), 1);
        xlib::XMapWindow(display, window);

        let context = glx::glXCreateNewContext(
            display,
            fb_config,
            glx::GLX_RGBA_TYPE,
            share_with,
            xlib::True,
        );
        if context.is_null() {
            xlib::XDestroyWindow(display, window);
            xlib::XFreeColormap(display, colormap);
            xlib::XCloseDisplay(display);
            return Err(GlWindowError::CreateContext);
        }
        xlib::XFlush(display);
        debug!(
            "opened compositor window {}x{} \"{}\"",
            config.width, config.height, config.title
        );

        Ok(Self {
            display,
            window,
            colormap,
            context,
            wm_delete_window,
            width: config.width,
            height: config.height,
            close_requested: false,
        })
    }

    pub fn make_current(&self) -> Result<()> {
        if unsafe { glx::glXMakeCurrent(self.display, self.window, self.context) } == 0 {
            return Err(GlWindowError::MakeCurrent);
        }
        Ok(())
    }

    pub fn swap_buffers(&self) {
        unsafe { glx::glXSwapBuffers(self.display, self.window) }
    }

    /// Current drawable size in pixels, updated by [`Self::poll_close_requested`].
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Drains pending window events and reports whether the user asked to
    /// close the window. Once set, the flag stays set.
    pub fn poll_close_requested(&mut self) -> bool {
        unsafe {
            while xlib::XPending(self.display) > 0 {
                let mut event: xlib::XEvent = mem::zeroed();
                xlib::XNextEvent(self.display, &mut event);
                match event.get_type() {
                    xlib::ClientMessage => {
                        let message = xlib::XClientMessageEvent::from(event);
                        if message.data.get_long(0) as xlib::Atom == self.wm_delete_window {
                            self.close_requested = true;
                        }
                    }
                    xlib::DestroyNotify => self.close_requested = true,
                    xlib::ConfigureNotify => {
                        let configure = xlib::XConfigureEvent::from(event);
                        self.width = configure.width.max(1) as u32;
                        self.height = configure.height.max(1) as u32;
                    }
                    _ => {}
                }
            }
        }
        if self.close_requested {
            warn!("compositor window close requested");
        }
        self.close_requested
    }
}

impl Drop for GlxWindow {
    fn drop(&mut self) {
        unsafe {
            glx::glXMakeCurrent(self.display, 0, ptr::null_mut());
            glx::glXDestroyContext(self.display, self.context);
            xlib::XDestroyWindow(self.display, self.window);
            xlib::XFreeColormap(self.display, self.colormap);
            xlib::XCloseDisplay(self.display);
        }
    }
}

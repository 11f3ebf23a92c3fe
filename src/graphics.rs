pub mod headless;
#[cfg(all(feature = "glx", target_os = "linux"))]
pub mod opengl;

use std::ffi::c_void;

use openxr::sys;
use tracing::{info, warn};
use xr_gl_window::WindowConfig;

use crate::config::{PresenterPolicy, RuntimeConfig};
use crate::error::XrError;
use crate::next_chain::NextChain;
use crate::types::{Result, SwapchainCreateInfo};

/// The OpenGL graphics binding found in a session's create info.
#[derive(Clone, Copy, Debug)]
pub enum GraphicsBinding<'a> {
    Xlib(&'a sys::GraphicsBindingOpenGLXlibKHR),
    Xcb,
    Wayland,
    Win32,
}

impl<'a> GraphicsBinding<'a> {
    /// Finds the first recognized binding in a `next` chain.
    ///
    /// # Safety
    ///
    /// `next` must be null or point to a valid chain of OpenXR structs.
    pub unsafe fn from_next_chain(next: *const c_void) -> Result<Self> {
        for base in NextChain::new(next) {
            let binding = match (*base).ty {
                sys::GraphicsBindingOpenGLXlibKHR::TYPE => Self::Xlib(&*base.cast()),
                sys::StructureType::GRAPHICS_BINDING_OPENGL_WIN32_KHR => Self::Win32,
                sys::StructureType::GRAPHICS_BINDING_OPENGL_XCB_KHR => Self::Xcb,
                sys::StructureType::GRAPHICS_BINDING_OPENGL_WAYLAND_KHR => Self::Wayland,
                _ => continue,
            };
            return Ok(binding);
        }
        Err(XrError::initialization(
            "no OpenGL graphics binding in the session create info",
        ))
    }

    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBinding::Xlib(_) => "OpenGL Xlib",
            GraphicsBinding::Xcb => "OpenGL Xcb",
            GraphicsBinding::Wayland => "OpenGL Wayland",
            GraphicsBinding::Win32 => "OpenGL Win32",
        }
    }
}

/// One eye of a projection layer, resolved to the texture the compositor
/// samples this frame.
#[derive(Clone, Copy, Debug)]
pub struct ComposedView {
    /// 0 for the left eye, 1 for the right eye.
    pub eye: usize,
    pub texture: u32,
    pub image_extent: (u32, u32),
    pub image_rect: sys::Rect2Di,
}

impl ComposedView {
    /// The sub-image rectangle as `[u offset, v offset, u scale, v scale]`.
    pub fn uv_rect(&self) -> [f32; 4] {
        let (width, height) = self.image_extent;
        let (width, height) = (width.max(1) as f32, height.max(1) as f32);
        let rect = self.image_rect;
        if rect.extent.width <= 0 || rect.extent.height <= 0 {
            return [0.0, 0.0, 1.0, 1.0];
        }
        [
            rect.offset.x as f32 / width,
            rect.offset.y as f32 / height,
            rect.extent.width as f32 / width,
            rect.extent.height as f32 / height,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// The output window was closed. The instance is lost.
    WindowClosed,
}

/// Graphics API specific work done on the application's thread.
pub trait GraphicsDevice: Sized + Send + Sync + 'static {
    type Presenter: Presenter;

    /// Allocates `count` color images and returns their texture names.
    fn create_images(&self, info: &SwapchainCreateInfo, count: u32) -> Result<Vec<u32>>;
    fn destroy_images(&self, images: &[u32]);
    /// Creates the compositor's output. Called on the application's thread.
    fn create_presenter(&self, window: &WindowConfig) -> Result<Self::Presenter>;
}

/// Graphics API specific work done on the compositor thread.
pub trait Presenter: Send + 'static {
    /// Called once on the compositor thread before the first frame.
    fn activate(&mut self) -> Result<()>;
    /// Draws one frame's views and shows it. Rendering errors are logged and
    /// otherwise ignored.
    fn present(&mut self, views: &[ComposedView]) -> PresentStatus;
}

/// A type that can be used in [`GraphicsWrap`].
///
/// `GraphicsWrap<T>` is an enum with one variant per graphics implementation,
/// each holding `T::Inner` for that implementation.
pub trait GraphicsType {
    type Inner<G: GraphicsDevice>;
}

/// Agnostic container for graphics implementation specific values.
pub enum GraphicsWrap<T: GraphicsType> {
    #[cfg(all(feature = "glx", target_os = "linux"))]
    OpenGl(T::Inner<opengl::OpenGl>),
    Headless(T::Inner<headless::Headless>),
}

impl<T: GraphicsType> GraphicsWrap<T> {
    /// Returns the name of the graphics implementation in use.
    pub fn graphics_name(&self) -> &'static str {
        graphics_match!(
            self;
            _ => std::any::type_name::<Api>()
        )
    }

    #[cfg(test)]
    fn graphics_type(&self) -> std::any::TypeId {
        graphics_match!(
            self;
            _ => std::any::TypeId::of::<Api>()
        )
    }

    /// Checks if this value uses the wanted graphics implementation.
    #[cfg(test)]
    pub fn using_graphics<G: GraphicsDevice>(&self) -> bool {
        self.graphics_type() == std::any::TypeId::of::<G>()
    }
}

/// Runs the same code for every variant of [`GraphicsWrap`].
///
/// The first argument is an expression evaluating to a `GraphicsWrap` (owned
/// or borrowed), the second a match arm whose pattern binds the inner value.
/// The implementing type is available in the arm as `Api`. Appending
/// `=> Wrapper` re-wraps the arm's result in `GraphicsWrap::<Wrapper>`.
macro_rules! graphics_match {
    (
        $field:expr;
        $var:pat => $expr:expr $(=> $($return:tt)*)?
    ) => {
        match $field {
            #[cfg(all(feature = "glx", target_os = "linux"))]
            $crate::graphics::GraphicsWrap::OpenGl($var) => {
                #[allow(unused)]
                type Api = $crate::graphics::opengl::OpenGl;
                graphics_match!(@arm_impl OpenGl; $expr $(=> $($return)*)?)
            },
            $crate::graphics::GraphicsWrap::Headless($var) => {
                #[allow(unused)]
                type Api = $crate::graphics::headless::Headless;
                graphics_match!(@arm_impl Headless; $expr $(=> $($return)*)?)
            },
        }
    };

    (
        @arm_impl
        $variant:ident;
        $expr:expr => $wrap_ty:ty
    ) => {
        $crate::graphics::GraphicsWrap::<$wrap_ty>::$variant($expr)
    };

    (
        @arm_impl
        $variant:ident;
        $expr:expr
    ) => {
        $expr
    };
}

pub(crate) use graphics_match;

/// The graphics device of a session.
pub struct SessionGraphics(pub GraphicsWrap<Self>);

impl GraphicsType for SessionGraphics {
    type Inner<G: GraphicsDevice> = G;
}

/// The presenter driven by a session's compositor thread.
pub struct CompositorPresenter(pub GraphicsWrap<Self>);

impl GraphicsType for CompositorPresenter {
    type Inner<G: GraphicsDevice> = G::Presenter;
}

impl SessionGraphics {
    /// Picks the implementation for `binding` under the configured policy.
    ///
    /// # Safety
    ///
    /// The handles inside `binding` must be valid, and this must be called on
    /// the thread the application renders from.
    pub unsafe fn new(binding: &GraphicsBinding<'_>, config: &RuntimeConfig) -> Result<Self> {
        let graphics = match (config.presenter, binding) {
            #[cfg(all(feature = "glx", target_os = "linux"))]
            (PresenterPolicy::Native, GraphicsBinding::Xlib(xlib)) => {
                SessionGraphics(GraphicsWrap::OpenGl(opengl::OpenGl::new(xlib)?))
            }
            (PresenterPolicy::Native, binding) => {
                warn!(
                    "no native presenter for the {} binding, compositing headless",
                    binding.name()
                );
                SessionGraphics(GraphicsWrap::Headless(headless::Headless::default()))
            }
            (PresenterPolicy::Headless, _) => {
                SessionGraphics(GraphicsWrap::Headless(headless::Headless::default()))
            }
        };
        info!(
            "using {} graphics for the {} binding",
            graphics.0.graphics_name(),
            binding.name()
        );
        Ok(graphics)
    }

    /// The headless device, if this session composites without a window.
    pub fn headless(&self) -> Option<&headless::Headless> {
        match &self.0 {
            GraphicsWrap::Headless(device) => Some(device),
            #[cfg(all(feature = "glx", target_os = "linux"))]
            GraphicsWrap::OpenGl(_) => None,
        }
    }

    pub fn create_images(&self, info: &SwapchainCreateInfo, count: u32) -> Result<Vec<u32>> {
        graphics_match!(
            &self.0;
            device => device.create_images(info, count)
        )
    }

    pub fn destroy_images(&self, images: &[u32]) {
        graphics_match!(
            &self.0;
            device => device.destroy_images(images)
        )
    }

    pub fn create_presenter(&self, window: &WindowConfig) -> Result<CompositorPresenter> {
        Ok(CompositorPresenter(graphics_match!(
            &self.0;
            device => device.create_presenter(window)? => CompositorPresenter
        )))
    }
}

impl Presenter for CompositorPresenter {
    fn activate(&mut self) -> Result<()> {
        graphics_match!(
            &mut self.0;
            presenter => presenter.activate()
        )
    }

    fn present(&mut self, views: &[ComposedView]) -> PresentStatus {
        graphics_match!(
            &mut self.0;
            presenter => presenter.present(views)
        )
    }
}

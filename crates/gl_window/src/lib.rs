//! Window and context plumbing shared by the sample runtime's compositor and
//! by clients that want to hand the runtime an OpenGL context.
//!
//! Only the pieces an XR compositor needs are wrapped: a double-buffered
//! window whose context shares objects with a caller-owned context, buffer
//! swapping, close detection, and GL function loading for whichever context is
//! current on the calling thread.

use std::borrow::Cow;

use thiserror::Error;

#[cfg(all(feature = "glx", target_os = "linux"))]
pub mod glx;

/// Whether this build can open native windows at all.
pub const NATIVE_WINDOWS_AVAILABLE: bool = cfg!(all(feature = "glx", target_os = "linux"));

pub type Result<T> = std::result::Result<T, GlWindowError>;

#[derive(Error, Debug)]
pub enum GlWindowError {
    #[error("Could not open a connection to the X server")]
    OpenDisplay,
    #[error("No GLX framebuffer configuration matches the requested attributes")]
    NoFramebufferConfig,
    #[error("No X visual for the chosen framebuffer configuration")]
    NoVisual,
    #[error("Failed to create a GL context sharing with the application context")]
    CreateContext,
    #[error("Failed to make the GL context current on this thread")]
    MakeCurrent,
    #[error("Native windows are not supported on this platform")]
    Unsupported,
    #[error("Failed to create CString: {0}")]
    NulError(#[from] std::ffi::NulError),
}

/// Geometry and title of the compositor's output window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: Cow<'static, str>,
    pub width: u32,
    pub height: u32,
}

impl WindowConfig {
    pub const DEFAULT_TITLE: &'static str = "OpenXR Sample Runtime";

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn with_title(mut self, title: impl Into<Cow<'static, str>>) -> Self {
        self.title = title.into();
        self
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Cow::Borrowed(Self::DEFAULT_TITLE),
            width: 1024,
            height: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_fits_two_square_eyes() {
        let config = WindowConfig::default();
        assert_eq!(config.title, WindowConfig::DEFAULT_TITLE);
        assert_eq!((config.width, config.height), (1024, 512));
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let config = WindowConfig::default().with_size(0, 0).with_title("mirror");
        assert_eq!((config.width, config.height), (1, 1));
        assert_eq!(config.title, "mirror");
    }

    #[test]
    fn errors_render_readable_messages() {
        assert_eq!(
            GlWindowError::OpenDisplay.to_string(),
            "Could not open a connection to the X server"
        );
        let nul = std::ffi::CString::new("a\0b").unwrap_err();
        assert!(GlWindowError::from(nul)
            .to_string()
            .starts_with("Failed to create CString"));
    }
}

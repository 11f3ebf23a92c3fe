use std::borrow::Cow;
use std::time::Duration;

use xr_gl_window::WindowConfig;

/// Which presenter a session's compositor drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresenterPolicy {
    /// A GLX window for Xlib bindings, headless for every other binding.
    #[default]
    Native,
    /// Never open a window. Frames are composited without touching GL.
    Headless,
}

/// How xrWaitSwapchainImage synchronizes with the compositor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapchainWaitPolicy {
    /// Block until the compositor no longer samples the image being waited on.
    #[default]
    TrackCompositor,
    /// Return immediately.
    Elide,
}

/// Process-wide runtime settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    pub display_period: Duration,
    pub presenter: PresenterPolicy,
    pub window: WindowConfig,
    /// `tracing_subscriber::EnvFilter` directives.
    pub log_filter: Cow<'static, str>,
    /// Emit one debug line per API call.
    pub trace_calls: bool,
    pub swapchain_wait: SwapchainWaitPolicy,
}

impl RuntimeConfig {
    pub const DEFAULT_DISPLAY_PERIOD: Duration = Duration::from_nanos(16_666_666);

    /// Configuration that never needs an X server.
    pub fn headless() -> Self {
        Self::default().with_presenter(PresenterPolicy::Headless)
    }

    pub fn with_display_period(mut self, period: Duration) -> Self {
        self.display_period = period.max(Duration::from_nanos(1));
        self
    }

    pub fn with_presenter(mut self, presenter: PresenterPolicy) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<Cow<'static, str>>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_trace_calls(mut self, trace_calls: bool) -> Self {
        self.trace_calls = trace_calls;
        self
    }

    pub fn with_swapchain_wait(mut self, policy: SwapchainWaitPolicy) -> Self {
        self.swapchain_wait = policy;
        self
    }

    /// The display period in nanoseconds, as used by the frame timer.
    pub fn display_period_nanos(&self) -> i64 {
        i64::try_from(self.display_period.as_nanos()).unwrap_or(i64::MAX)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            display_period: Self::DEFAULT_DISPLAY_PERIOD,
            presenter: PresenterPolicy::default(),
            window: WindowConfig::default(),
            log_filter: Cow::Borrowed("info"),
            trace_calls: true,
            swapchain_wait: SwapchainWaitPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_sixty_hertz() {
        let config = RuntimeConfig::default();
        assert_eq!(config.display_period_nanos(), 16_666_666);
        assert_eq!(config.presenter, PresenterPolicy::Native);
        assert_eq!(config.swapchain_wait, SwapchainWaitPolicy::TrackCompositor);
        assert_eq!(config.log_filter, "info");
        assert!(config.trace_calls);
    }

    #[test]
    fn builders_override_fields() {
        let config = RuntimeConfig::headless()
            .with_display_period(Duration::ZERO)
            .with_log_filter("openxr_sample_runtime=trace")
            .with_trace_calls(false)
            .with_swapchain_wait(SwapchainWaitPolicy::Elide);
        assert_eq!(config.presenter, PresenterPolicy::Headless);
        assert_eq!(config.display_period_nanos(), 1);
        assert_eq!(config.log_filter, "openxr_sample_runtime=trace");
        assert!(!config.trace_calls);
        assert_eq!(config.swapchain_wait, SwapchainWaitPolicy::Elide);
    }
}

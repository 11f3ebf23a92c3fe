use std::borrow::Cow;

use openxr::sys;
use thiserror::Error;

/// Every way a runtime operation can fail. Each variant maps to exactly one
/// [`sys::Result`] error code handed back across the API boundary.
#[derive(Error, Debug)]
pub enum XrError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(Cow<'static, str>),
    #[error("Invalid {0} handle")]
    HandleInvalid(&'static str),
    #[error("Validation failure: {0}")]
    ValidationFailure(Cow<'static, str>),
    #[error("Buffer too small: {required} elements required, capacity is {capacity}")]
    SizeInsufficient { required: u32, capacity: u32 },
    #[error("Form factor {0:?} is not available")]
    FormFactorUnavailable(sys::FormFactor),
    #[error("Form factor {0:?} is not supported")]
    FormFactorUnsupported(sys::FormFactor),
    #[error("Invalid system id")]
    SystemInvalid,
    #[error("View configuration type {0:?} is not supported")]
    ViewConfigurationTypeUnsupported(sys::ViewConfigurationType),
    #[error("Session is already running")]
    SessionRunning,
    #[error("Session is not running")]
    SessionNotRunning,
    #[error("Session is not stopping")]
    SessionNotStopping,
    #[error("Call order invalid: {0}")]
    CallOrderInvalid(&'static str),
    #[error("Invalid path {0}")]
    PathInvalid(u64),
    #[error("API layer {0} is not present")]
    ApiLayerNotPresent(String),
    #[error("Extension {0} is not present")]
    ExtensionNotPresent(String),
    #[error("Instance lost: {0}")]
    InstanceLost(&'static str),
    #[error("Function {0} is not supported")]
    FunctionUnsupported(String),
    #[error("Swapchain format {0:#x} is not supported")]
    SwapchainFormatUnsupported(i64),
    #[error("Reference space type {0:?} is not supported")]
    ReferenceSpaceUnsupported(sys::ReferenceSpaceType),
    #[error("Layer limit exceeded: {0} layers submitted")]
    LayerLimitExceeded(u32),
    #[error("Invalid composition layer: {0}")]
    LayerInvalid(&'static str),
    #[error("Invalid time {0}")]
    TimeInvalid(i64),
    #[error("Invalid graphics device: {0}")]
    GraphicsDeviceInvalid(&'static str),
    #[error("Window error: {0}")]
    Window(#[from] xr_gl_window::GlWindowError),
    #[error("Failed to create CString: {0}")]
    NulError(#[from] std::ffi::NulError),
    #[error("Runtime failure: {0}")]
    RuntimeFailure(Cow<'static, str>),
}

impl XrError {
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ValidationFailure(message.into())
    }

    pub fn initialization(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InitializationFailed(message.into())
    }

    /// The error code reported to the application.
    pub fn code(&self) -> sys::Result {
        match self {
            XrError::InitializationFailed(_) => sys::Result::ERROR_INITIALIZATION_FAILED,
            XrError::HandleInvalid(_) => sys::Result::ERROR_HANDLE_INVALID,
            XrError::ValidationFailure(_) | XrError::NulError(_) => {
                sys::Result::ERROR_VALIDATION_FAILURE
            }
            XrError::SizeInsufficient { .. } => sys::Result::ERROR_SIZE_INSUFFICIENT,
            XrError::FormFactorUnavailable(_) => sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE,
            XrError::FormFactorUnsupported(_) => sys::Result::ERROR_FORM_FACTOR_UNSUPPORTED,
            XrError::SystemInvalid => sys::Result::ERROR_SYSTEM_INVALID,
            XrError::ViewConfigurationTypeUnsupported(_) => {
                sys::Result::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
            }
            XrError::SessionRunning => sys::Result::ERROR_SESSION_RUNNING,
            XrError::SessionNotRunning => sys::Result::ERROR_SESSION_NOT_RUNNING,
            XrError::SessionNotStopping => sys::Result::ERROR_SESSION_NOT_STOPPING,
            XrError::CallOrderInvalid(_) => sys::Result::ERROR_CALL_ORDER_INVALID,
            XrError::PathInvalid(_) => sys::Result::ERROR_PATH_INVALID,
            XrError::ApiLayerNotPresent(_) => sys::Result::ERROR_API_LAYER_NOT_PRESENT,
            XrError::ExtensionNotPresent(_) => sys::Result::ERROR_EXTENSION_NOT_PRESENT,
            XrError::InstanceLost(_) => sys::Result::ERROR_INSTANCE_LOST,
            XrError::FunctionUnsupported(_) => sys::Result::ERROR_FUNCTION_UNSUPPORTED,
            XrError::SwapchainFormatUnsupported(_) => {
                sys::Result::ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED
            }
            XrError::ReferenceSpaceUnsupported(_) => {
                sys::Result::ERROR_REFERENCE_SPACE_UNSUPPORTED
            }
            XrError::LayerLimitExceeded(_) => sys::Result::ERROR_LAYER_LIMIT_EXCEEDED,
            XrError::LayerInvalid(_) => sys::Result::ERROR_LAYER_INVALID,
            XrError::TimeInvalid(_) => sys::Result::ERROR_TIME_INVALID,
            XrError::GraphicsDeviceInvalid(_) => sys::Result::ERROR_GRAPHICS_DEVICE_INVALID,
            XrError::Window(_) => sys::Result::ERROR_INITIALIZATION_FAILED,
            XrError::RuntimeFailure(_) => sys::Result::ERROR_RUNTIME_FAILURE,
        }
    }
}

impl From<XrError> for sys::Result {
    fn from(value: XrError) -> Self {
        value.code()
    }
}

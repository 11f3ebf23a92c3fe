//! The `extern "system"` entry points.
//!
//! Each entry point validates its pointers, resolves handles through the
//! process-wide [`Runtime`] and turns the outcome into a [`sys::Result`].
//! Panics never cross the boundary.

use std::ffi::{c_char, CStr};
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use openxr::sys::{self, pfn};
use tracing::{debug, error};

use crate::error::XrError;
use crate::logging::API_TARGET;
use crate::types::Result;
use crate::Runtime;

pub mod frame;
pub mod instance;
pub mod session;
pub mod space;
pub mod swapchain;
pub mod system;
pub mod time;

/// Values an entry point body can succeed with.
pub(crate) trait SuccessCode {
    fn into_code(self) -> sys::Result;
}

impl SuccessCode for () {
    fn into_code(self) -> sys::Result {
        sys::Result::SUCCESS
    }
}

impl SuccessCode for sys::Result {
    fn into_code(self) -> sys::Result {
        self
    }
}

/// Runs the body of the entry point `name` against the installed runtime.
pub(crate) fn call<T: SuccessCode>(
    name: &'static str,
    body: impl FnOnce(&'static Runtime) -> Result<T>,
) -> sys::Result {
    let runtime = Runtime::get();
    if runtime.config().trace_calls {
        debug!(target: API_TARGET, "{name}");
    }
    match panic::catch_unwind(AssertUnwindSafe(|| body(runtime))) {
        Ok(Ok(value)) => value.into_code(),
        Ok(Err(err)) => {
            debug!(target: API_TARGET, "{name} failed: {err}");
            err.code()
        }
        Err(_) => {
            error!("{name} panicked");
            sys::Result::ERROR_RUNTIME_FAILURE
        }
    }
}

/// Borrows an input struct.
///
/// # Safety
///
/// `ptr` must be null or valid for reads for the returned lifetime.
pub(crate) unsafe fn input<'a, T>(ptr: *const T, what: &'static str) -> Result<&'a T> {
    ptr.as_ref()
        .ok_or_else(|| XrError::validation(format!("{what} is null")))
}

/// Borrows an output struct.
///
/// # Safety
///
/// `ptr` must be null or valid for writes for the returned lifetime.
pub(crate) unsafe fn output<'a, T>(ptr: *mut T, what: &'static str) -> Result<&'a mut T> {
    ptr.as_mut()
        .ok_or_else(|| XrError::validation(format!("{what} is null")))
}

pub(crate) fn check_type(
    actual: sys::StructureType,
    expected: sys::StructureType,
) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(XrError::validation(format!(
            "expected structure type {expected:?}, got {actual:?}"
        )))
    }
}

/// Output structs that carry a structure type tag.
pub(crate) trait OutputStruct {
    const TYPE: sys::StructureType;

    fn ty(&self) -> sys::StructureType;
}

macro_rules! output_structs {
    ($($ty:ty => $tag:ident,)*) => {
        $(impl OutputStruct for $ty {
            const TYPE: sys::StructureType = sys::StructureType::$tag;

            fn ty(&self) -> sys::StructureType {
                self.ty
            }
        })*
    };
}

output_structs! {
    sys::ExtensionProperties => EXTENSION_PROPERTIES,
    sys::ViewConfigurationView => VIEW_CONFIGURATION_VIEW,
    sys::View => VIEW,
    sys::SwapchainImageOpenGLKHR => SWAPCHAIN_IMAGE_OPENGL_KHR,
}

/// Writes the required count and borrows the caller's array if it should be
/// filled.
///
/// # Safety
///
/// Same as [`fill_array`].
unsafe fn output_array<'a, T>(
    capacity: u32,
    count_output: *mut u32,
    items: *mut T,
    len: usize,
) -> Result<Option<&'a mut [T]>> {
    let required = u32::try_from(len)
        .map_err(|_| XrError::RuntimeFailure("output array too large".into()))?;
    *output(count_output, "count output")? = required;
    if capacity == 0 {
        return Ok(None);
    }
    if capacity < required {
        return Err(XrError::SizeInsufficient { required, capacity });
    }
    if items.is_null() {
        return Err(XrError::validation("output array is null"));
    }
    Ok(Some(std::slice::from_raw_parts_mut(items, len)))
}

/// Implements the two-call idiom for an output array of `len` elements.
///
/// The required count is always written. With a capacity of zero nothing
/// else happens; otherwise `fill` is called for each element.
///
/// # Safety
///
/// `count_output` must be null or writable, and `items` must be null or
/// point to `capacity` writable elements.
pub(crate) unsafe fn fill_array<T>(
    capacity: u32,
    count_output: *mut u32,
    items: *mut T,
    len: usize,
    mut fill: impl FnMut(usize, &mut T) -> Result<()>,
) -> Result<()> {
    let Some(items) = output_array(capacity, count_output, items, len)? else {
        return Ok(());
    };
    for (index, item) in items.iter_mut().enumerate() {
        fill(index, item)?;
    }
    Ok(())
}

/// [`fill_array`] for tagged structs. Every element's type is checked before
/// any element is written.
///
/// # Safety
///
/// Same as [`fill_array`].
pub(crate) unsafe fn fill_struct_array<T: OutputStruct>(
    capacity: u32,
    count_output: *mut u32,
    items: *mut T,
    len: usize,
    mut fill: impl FnMut(usize, &mut T),
) -> Result<()> {
    let Some(items) = output_array(capacity, count_output, items, len)? else {
        return Ok(());
    };
    for item in items.iter() {
        check_type(item.ty(), T::TYPE)?;
    }
    for (index, item) in items.iter_mut().enumerate() {
        fill(index, item);
    }
    Ok(())
}

/// Copies `value` and its terminator into a caller buffer with the two-call
/// idiom.
///
/// # Safety
///
/// Same as [`fill_array`].
pub(crate) unsafe fn fill_string(
    capacity: u32,
    count_output: *mut u32,
    buffer: *mut c_char,
    value: &CStr,
) -> Result<()> {
    let bytes = value.to_bytes_with_nul();
    fill_array(capacity, count_output, buffer, bytes.len(), |index, out| {
        *out = bytes[index] as c_char;
        Ok(())
    })
}

macro_rules! entry_points {
    ($($name:literal => $function:path,)*) => {
        /// Names of every function `xrGetInstanceProcAddr` resolves.
        pub const ENTRY_POINTS: &[&str] = &[$($name),*];

        fn lookup(name: &str) -> Option<pfn::VoidFunction> {
            match name {
                $($name => Some(unsafe {
                    mem::transmute::<*const (), pfn::VoidFunction>($function as *const ())
                }),)*
                _ => None,
            }
        }
    };
}

entry_points! {
    "xrGetInstanceProcAddr" => get_instance_proc_addr,
    "xrEnumerateApiLayerProperties" => instance::enumerate_api_layer_properties,
    "xrEnumerateInstanceExtensionProperties" => instance::enumerate_instance_extension_properties,
    "xrCreateInstance" => instance::create_instance,
    "xrDestroyInstance" => instance::destroy_instance,
    "xrGetInstanceProperties" => instance::get_instance_properties,
    "xrPollEvent" => instance::poll_event,
    "xrStringToPath" => instance::string_to_path,
    "xrPathToString" => instance::path_to_string,
    "xrGetSystem" => system::get_system,
    "xrGetSystemProperties" => system::get_system_properties,
    "xrGetOpenGLGraphicsRequirementsKHR" => system::get_opengl_graphics_requirements,
    "xrEnumerateViewConfigurations" => system::enumerate_view_configurations,
    "xrGetViewConfigurationProperties" => system::get_view_configuration_properties,
    "xrEnumerateViewConfigurationViews" => system::enumerate_view_configuration_views,
    "xrEnumerateEnvironmentBlendModes" => system::enumerate_environment_blend_modes,
    "xrCreateSession" => session::create_session,
    "xrDestroySession" => session::destroy_session,
    "xrBeginSession" => session::begin_session,
    "xrEndSession" => session::end_session,
    "xrRequestExitSession" => session::request_exit_session,
    "xrEnumerateSwapchainFormats" => swapchain::enumerate_swapchain_formats,
    "xrCreateSwapchain" => swapchain::create_swapchain,
    "xrDestroySwapchain" => swapchain::destroy_swapchain,
    "xrEnumerateSwapchainImages" => swapchain::enumerate_swapchain_images,
    "xrAcquireSwapchainImage" => swapchain::acquire_swapchain_image,
    "xrWaitSwapchainImage" => swapchain::wait_swapchain_image,
    "xrReleaseSwapchainImage" => swapchain::release_swapchain_image,
    "xrEnumerateReferenceSpaces" => space::enumerate_reference_spaces,
    "xrCreateReferenceSpace" => space::create_reference_space,
    "xrDestroySpace" => space::destroy_space,
    "xrLocateSpace" => space::locate_space,
    "xrWaitFrame" => frame::wait_frame,
    "xrBeginFrame" => frame::begin_frame,
    "xrEndFrame" => frame::end_frame,
    "xrLocateViews" => frame::locate_views,
    "xrApplyHapticFeedback" => frame::apply_haptic_feedback,
    "xrStopHapticFeedback" => frame::stop_haptic_feedback,
    "xrConvertTimeToTimespecTimeKHR" => time::convert_time_to_timespec_time,
    "xrConvertTimespecTimeToTimeKHR" => time::convert_timespec_time_to_time,
}

/// Functions that may be looked up without an instance.
const GLOBAL_FUNCTIONS: [&str; 3] = [
    "xrEnumerateApiLayerProperties",
    "xrEnumerateInstanceExtensionProperties",
    "xrCreateInstance",
];

/// # Safety
///
/// `name` must be a nul-terminated string and `function` must be writable.
pub unsafe extern "system" fn get_instance_proc_addr(
    instance: sys::Instance,
    name: *const c_char,
    function: *mut Option<pfn::VoidFunction>,
) -> sys::Result {
    call("xrGetInstanceProcAddr", |runtime| {
        let function = output(function, "function")?;
        *function = None;
        let name = CStr::from_ptr(input(name, "name")?)
            .to_str()
            .map_err(|_| XrError::validation("function name is not UTF-8"))?;
        if instance == sys::Instance::NULL {
            if !GLOBAL_FUNCTIONS.contains(&name) {
                return Err(XrError::HandleInvalid("instance"));
            }
        } else {
            runtime.registry().get(instance)?;
        }
        let found = lookup(name).ok_or_else(|| XrError::FunctionUnsupported(name.to_owned()))?;
        *function = Some(found);
        Ok(())
    })
}

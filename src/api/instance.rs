use std::ffi::{c_char, CStr};

use openxr::sys;

use super::{call, check_type, fill_array, fill_string, fill_struct_array, input, output};
use crate::error::XrError;
use crate::instance;
use crate::types::{place_str, ADVERTISED_EXTENSIONS, RUNTIME_NAME};

/// The runtime ships no API layers.
///
/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_api_layer_properties(
    capacity: u32,
    count_output: *mut u32,
    properties: *mut sys::ApiLayerProperties,
) -> sys::Result {
    call("xrEnumerateApiLayerProperties", |_| {
        fill_array(capacity, count_output, properties, 0, |_, _| Ok(()))
    })
}

/// # Safety
///
/// `layer_name` must be null or a nul-terminated string; the other pointers
/// must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_instance_extension_properties(
    layer_name: *const c_char,
    capacity: u32,
    count_output: *mut u32,
    properties: *mut sys::ExtensionProperties,
) -> sys::Result {
    call("xrEnumerateInstanceExtensionProperties", |_| {
        if !layer_name.is_null() {
            return Err(XrError::ApiLayerNotPresent(
                CStr::from_ptr(layer_name).to_string_lossy().into_owned(),
            ));
        }
        fill_struct_array(
            capacity,
            count_output,
            properties,
            ADVERTISED_EXTENSIONS.len(),
            |index, out| {
                let (name, version) = ADVERTISED_EXTENSIONS[index];
                place_str(&mut out.extension_name, name);
                out.extension_version = version;
            },
        )
    })
}

/// # Safety
///
/// `create_info` must be a valid `XrInstanceCreateInfo` and `instance`
/// writable.
pub unsafe extern "system" fn create_instance(
    create_info: *const sys::InstanceCreateInfo,
    instance: *mut sys::Instance,
) -> sys::Result {
    call("xrCreateInstance", |runtime| {
        let out = output(instance, "instance")?;
        *out = instance::create(runtime, input(create_info, "create info")?)?;
        Ok(())
    })
}

/// Destroying the null handle succeeds and does nothing.
///
/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn destroy_instance(instance: sys::Instance) -> sys::Result {
    call("xrDestroyInstance", |runtime| {
        if instance == sys::Instance::NULL {
            return Ok(());
        }
        instance::destroy(runtime, instance)
    })
}

/// # Safety
///
/// `properties` must be a writable `XrInstanceProperties`.
pub unsafe extern "system" fn get_instance_properties(
    instance: sys::Instance,
    properties: *mut sys::InstanceProperties,
) -> sys::Result {
    call("xrGetInstanceProperties", |runtime| {
        runtime.registry().get(instance)?;
        let properties = output(properties, "instance properties")?;
        check_type(properties.ty, sys::InstanceProperties::TYPE)?;
        properties.runtime_version = sys::CURRENT_API_VERSION;
        place_str(&mut properties.runtime_name, RUNTIME_NAME);
        Ok(())
    })
}

/// Returns `EVENT_UNAVAILABLE` when the queue is empty.
///
/// # Safety
///
/// `event_data` must be a writable `XrEventDataBuffer`.
pub unsafe extern "system" fn poll_event(
    instance: sys::Instance,
    event_data: *mut sys::EventDataBuffer,
) -> sys::Result {
    call("xrPollEvent", |runtime| {
        let instance = runtime.registry().get(instance)?;
        let buffer = output(event_data, "event buffer")?;
        check_type(buffer.ty, sys::EventDataBuffer::TYPE)?;
        Ok(match instance.events.pop() {
            Some(event) => {
                event.write_to(buffer);
                sys::Result::SUCCESS
            }
            None => sys::Result::EVENT_UNAVAILABLE,
        })
    })
}

/// # Safety
///
/// `path_string` must be a nul-terminated string and `path` writable.
pub unsafe extern "system" fn string_to_path(
    instance: sys::Instance,
    path_string: *const c_char,
    path: *mut sys::Path,
) -> sys::Result {
    call("xrStringToPath", |runtime| {
        let instance = runtime.registry().get(instance)?;
        let string = CStr::from_ptr(input(path_string, "path string")?);
        *output(path, "path")? = instance.paths.string_to_path(string);
        Ok(())
    })
}

/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn path_to_string(
    instance: sys::Instance,
    path: sys::Path,
    capacity: u32,
    count_output: *mut u32,
    buffer: *mut c_char,
) -> sys::Result {
    call("xrPathToString", |runtime| {
        let instance = runtime.registry().get(instance)?;
        let string = instance.paths.path_to_string(path)?;
        fill_string(capacity, count_output, buffer, &string)
    })
}

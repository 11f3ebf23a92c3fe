use openxr::sys;

use super::{call, check_type, fill_array, fill_struct_array, input, output};
use crate::error::XrError;
use crate::instance::System;
use crate::types::{Result, VIEW_COUNT};
use crate::Runtime;

fn system(runtime: &Runtime, instance: sys::Instance, id: sys::SystemId) -> Result<System> {
    runtime.registry().get(instance)?.system(id)
}

fn require_stereo(ty: sys::ViewConfigurationType) -> Result<()> {
    if ty == sys::ViewConfigurationType::PRIMARY_STEREO {
        Ok(())
    } else {
        Err(XrError::ViewConfigurationTypeUnsupported(ty))
    }
}

/// # Safety
///
/// `get_info` must be a valid `XrSystemGetInfo` and `system_id` writable.
pub unsafe extern "system" fn get_system(
    instance: sys::Instance,
    get_info: *const sys::SystemGetInfo,
    system_id: *mut sys::SystemId,
) -> sys::Result {
    call("xrGetSystem", |runtime| {
        let instance = runtime.registry().get(instance)?;
        let get_info = input(get_info, "system get info")?;
        check_type(get_info.ty, sys::SystemGetInfo::TYPE)?;
        let out = output(system_id, "system id")?;
        *out = instance.get_system(get_info.form_factor)?;
        Ok(())
    })
}

/// # Safety
///
/// `properties` must be a writable `XrSystemProperties`.
pub unsafe extern "system" fn get_system_properties(
    instance: sys::Instance,
    system_id: sys::SystemId,
    properties: *mut sys::SystemProperties,
) -> sys::Result {
    call("xrGetSystemProperties", |runtime| {
        let system = system(runtime, instance, system_id)?;
        let properties = output(properties, "system properties")?;
        check_type(properties.ty, sys::SystemProperties::TYPE)?;
        system.write_properties(properties);
        Ok(())
    })
}

/// # Safety
///
/// `requirements` must be a writable `XrGraphicsRequirementsOpenGLKHR`.
pub unsafe extern "system" fn get_opengl_graphics_requirements(
    instance: sys::Instance,
    system_id: sys::SystemId,
    requirements: *mut sys::GraphicsRequirementsOpenGLKHR,
) -> sys::Result {
    call("xrGetOpenGLGraphicsRequirementsKHR", |runtime| {
        let system = system(runtime, instance, system_id)?;
        let requirements = output(requirements, "graphics requirements")?;
        check_type(requirements.ty, sys::GraphicsRequirementsOpenGLKHR::TYPE)?;
        system.write_opengl_requirements(requirements);
        Ok(())
    })
}

/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_view_configurations(
    instance: sys::Instance,
    system_id: sys::SystemId,
    capacity: u32,
    count_output: *mut u32,
    view_configuration_types: *mut sys::ViewConfigurationType,
) -> sys::Result {
    call("xrEnumerateViewConfigurations", |runtime| {
        system(runtime, instance, system_id)?;
        fill_array(capacity, count_output, view_configuration_types, 1, |_, out| {
            *out = sys::ViewConfigurationType::PRIMARY_STEREO;
            Ok(())
        })
    })
}

/// # Safety
///
/// `properties` must be a writable `XrViewConfigurationProperties`.
pub unsafe extern "system" fn get_view_configuration_properties(
    instance: sys::Instance,
    system_id: sys::SystemId,
    view_configuration_type: sys::ViewConfigurationType,
    properties: *mut sys::ViewConfigurationProperties,
) -> sys::Result {
    call("xrGetViewConfigurationProperties", |runtime| {
        let system = system(runtime, instance, system_id)?;
        require_stereo(view_configuration_type)?;
        let properties = output(properties, "view configuration properties")?;
        check_type(properties.ty, sys::ViewConfigurationProperties::TYPE)?;
        system.write_view_configuration_properties(properties);
        Ok(())
    })
}

/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_view_configuration_views(
    instance: sys::Instance,
    system_id: sys::SystemId,
    view_configuration_type: sys::ViewConfigurationType,
    capacity: u32,
    count_output: *mut u32,
    views: *mut sys::ViewConfigurationView,
) -> sys::Result {
    call("xrEnumerateViewConfigurationViews", |runtime| {
        let system = system(runtime, instance, system_id)?;
        require_stereo(view_configuration_type)?;
        fill_struct_array(capacity, count_output, views, VIEW_COUNT, |_, out| {
            system.write_view_configuration_view(out);
        })
    })
}

/// Only opaque blending is supported.
///
/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_environment_blend_modes(
    instance: sys::Instance,
    system_id: sys::SystemId,
    view_configuration_type: sys::ViewConfigurationType,
    capacity: u32,
    count_output: *mut u32,
    blend_modes: *mut sys::EnvironmentBlendMode,
) -> sys::Result {
    call("xrEnumerateEnvironmentBlendModes", |runtime| {
        system(runtime, instance, system_id)?;
        require_stereo(view_configuration_type)?;
        fill_array(capacity, count_output, blend_modes, 1, |_, out| {
            *out = sys::EnvironmentBlendMode::OPAQUE;
            Ok(())
        })
    })
}

#![allow(dead_code)]

use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::time::Duration;

use openxr::sys;
use openxr_sample_runtime::api;
use openxr_sample_runtime::types::place_str;
use openxr_sample_runtime::{Runtime, RuntimeConfig};

/// Installs a headless runtime with a short display period.
pub fn setup() -> &'static Runtime {
    // Fails after the first test installs it.
    let _ = color_eyre::install();
    Runtime::install(
        RuntimeConfig::headless()
            .with_display_period(Duration::from_millis(2))
            .with_log_filter("warn"),
    )
}

pub fn check(result: sys::Result) -> eyre::Result<()> {
    if result == sys::Result::SUCCESS {
        Ok(())
    } else {
        Err(eyre::eyre!("call failed with {result:?}"))
    }
}

pub fn create_instance(name: &str, extensions: &[&CStr]) -> eyre::Result<sys::Instance> {
    let (result, instance) = try_create_instance(name, extensions);
    check(result)?;
    Ok(instance)
}

pub fn try_create_instance(name: &str, extensions: &[&CStr]) -> (sys::Result, sys::Instance) {
    setup();
    let extension_names: Vec<_> = extensions.iter().map(|ext| ext.as_ptr()).collect();
    let mut info = sys::InstanceCreateInfo {
        ty: sys::InstanceCreateInfo::TYPE,
        next: ptr::null(),
        create_flags: sys::InstanceCreateFlags::EMPTY,
        application_info: unsafe { mem::zeroed() },
        enabled_api_layer_count: 0,
        enabled_api_layer_names: ptr::null(),
        enabled_extension_count: extension_names.len() as u32,
        enabled_extension_names: extension_names.as_ptr(),
    };
    place_str(&mut info.application_info.application_name, name);
    info.application_info.api_version = sys::CURRENT_API_VERSION;
    let mut instance = sys::Instance::NULL;
    let result = unsafe { api::instance::create_instance(&info, &mut instance) };
    (result, instance)
}

pub fn hmd(instance: sys::Instance) -> eyre::Result<sys::SystemId> {
    let info = sys::SystemGetInfo {
        ty: sys::SystemGetInfo::TYPE,
        next: ptr::null(),
        form_factor: sys::FormFactor::HEAD_MOUNTED_DISPLAY,
    };
    let mut system = sys::SystemId::NULL;
    check(unsafe { api::system::get_system(instance, &info, &mut system) })?;
    Ok(system)
}

pub fn create_session(instance: sys::Instance) -> eyre::Result<sys::Session> {
    let system = hmd(instance)?;
    let binding = sys::GraphicsBindingOpenGLXlibKHR {
        ty: sys::GraphicsBindingOpenGLXlibKHR::TYPE,
        ..unsafe { mem::zeroed() }
    };
    let info = sys::SessionCreateInfo {
        ty: sys::SessionCreateInfo::TYPE,
        next: &binding as *const sys::GraphicsBindingOpenGLXlibKHR as *const _,
        create_flags: sys::SessionCreateFlags::EMPTY,
        system_id: system,
    };
    let mut session = sys::Session::NULL;
    check(unsafe { api::session::create_session(instance, &info, &mut session) })?;
    Ok(session)
}

pub fn begin_session(session: sys::Session) -> sys::Result {
    let info = sys::SessionBeginInfo {
        ty: sys::SessionBeginInfo::TYPE,
        next: ptr::null(),
        primary_view_configuration_type: sys::ViewConfigurationType::PRIMARY_STEREO,
    };
    unsafe { api::session::begin_session(session, &info) }
}

pub fn swapchain_create_info(create_flags: sys::SwapchainCreateFlags) -> sys::SwapchainCreateInfo {
    sys::SwapchainCreateInfo {
        ty: sys::SwapchainCreateInfo::TYPE,
        next: ptr::null(),
        create_flags,
        usage_flags: sys::SwapchainUsageFlags::COLOR_ATTACHMENT,
        format: glow::RGBA8 as i64,
        sample_count: 4,
        width: 1024,
        height: 1024,
        face_count: 1,
        array_size: 1,
        mip_count: 1,
    }
}

pub fn create_swapchain(
    session: sys::Session,
    create_flags: sys::SwapchainCreateFlags,
) -> eyre::Result<sys::Swapchain> {
    let info = swapchain_create_info(create_flags);
    let mut swapchain = sys::Swapchain::NULL;
    check(unsafe { api::swapchain::create_swapchain(session, &info, &mut swapchain) })?;
    Ok(swapchain)
}

pub fn acquire(swapchain: sys::Swapchain) -> eyre::Result<u32> {
    let mut index = u32::MAX;
    check(unsafe { api::swapchain::acquire_swapchain_image(swapchain, ptr::null(), &mut index) })?;
    Ok(index)
}

pub fn release(swapchain: sys::Swapchain) -> eyre::Result<()> {
    check(unsafe { api::swapchain::release_swapchain_image(swapchain, ptr::null()) })
}

pub fn poll_states(
    instance: sys::Instance,
) -> eyre::Result<Vec<(sys::Session, sys::SessionState)>> {
    let mut states = Vec::new();
    loop {
        let mut buffer = sys::EventDataBuffer {
            ty: sys::EventDataBuffer::TYPE,
            ..unsafe { mem::zeroed() }
        };
        match unsafe { api::instance::poll_event(instance, &mut buffer) } {
            sys::Result::EVENT_UNAVAILABLE => return Ok(states),
            result => check(result)?,
        }
        eyre::ensure!(
            buffer.ty == sys::StructureType::EVENT_DATA_SESSION_STATE_CHANGED,
            "unexpected event {:?}",
            buffer.ty
        );
        let event = unsafe {
            &*(&buffer as *const sys::EventDataBuffer).cast::<sys::EventDataSessionStateChanged>()
        };
        states.push((event.session, event.state));
    }
}

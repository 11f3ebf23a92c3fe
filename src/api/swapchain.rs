use openxr::sys;

use super::{call, check_type, fill_array, fill_struct_array, input, output};
use crate::session;
use crate::types::SWAPCHAIN_FORMATS;

/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_swapchain_formats(
    session: sys::Session,
    capacity: u32,
    count_output: *mut u32,
    formats: *mut i64,
) -> sys::Result {
    call("xrEnumerateSwapchainFormats", |runtime| {
        runtime.registry().get(session)?;
        fill_array(capacity, count_output, formats, SWAPCHAIN_FORMATS.len(), |index, out| {
            *out = SWAPCHAIN_FORMATS[index];
            Ok(())
        })
    })
}

/// # Safety
///
/// `create_info` must be a valid `XrSwapchainCreateInfo` and `swapchain`
/// writable. Must be called from the thread the application renders on.
pub unsafe extern "system" fn create_swapchain(
    session: sys::Session,
    create_info: *const sys::SwapchainCreateInfo,
    swapchain: *mut sys::Swapchain,
) -> sys::Result {
    call("xrCreateSwapchain", |runtime| {
        let out = output(swapchain, "swapchain")?;
        *out = session::create_swapchain(runtime, session, input(create_info, "create info")?)?;
        Ok(())
    })
}

/// # Safety
///
/// Must be called from the thread the application renders on.
pub unsafe extern "system" fn destroy_swapchain(swapchain: sys::Swapchain) -> sys::Result {
    call("xrDestroySwapchain", |runtime| {
        session::destroy_swapchain(runtime, swapchain)
    })
}

/// Writes the GL texture names of the ring. The array must be of
/// `XrSwapchainImageOpenGLKHR`.
///
/// # Safety
///
/// Pointers must follow the two-call idiom, with `images` pointing to
/// `XrSwapchainImageOpenGLKHR` elements.
pub unsafe extern "system" fn enumerate_swapchain_images(
    swapchain: sys::Swapchain,
    capacity: u32,
    count_output: *mut u32,
    images: *mut sys::SwapchainImageBaseHeader,
) -> sys::Result {
    call("xrEnumerateSwapchainImages", |runtime| {
        let swapchain = runtime.registry().get(swapchain)?;
        let textures = swapchain.images.textures();
        fill_struct_array(
            capacity,
            count_output,
            images.cast::<sys::SwapchainImageOpenGLKHR>(),
            textures.len(),
            |index, out| out.image = textures[index],
        )
    })
}

/// # Safety
///
/// `acquire_info` must be null or a valid `XrSwapchainImageAcquireInfo`, and
/// `index` writable.
pub unsafe extern "system" fn acquire_swapchain_image(
    swapchain: sys::Swapchain,
    acquire_info: *const sys::SwapchainImageAcquireInfo,
    index: *mut u32,
) -> sys::Result {
    call("xrAcquireSwapchainImage", |runtime| {
        let swapchain = runtime.registry().get(swapchain)?;
        if let Some(info) = acquire_info.as_ref() {
            check_type(info.ty, sys::SwapchainImageAcquireInfo::TYPE)?;
        }
        let out = output(index, "image index")?;
        *out = swapchain.acquire();
        Ok(())
    })
}

/// Returns `TIMEOUT_EXPIRED` if the compositor still samples the image when
/// the timeout runs out.
///
/// # Safety
///
/// `wait_info` must be a valid `XrSwapchainImageWaitInfo`.
pub unsafe extern "system" fn wait_swapchain_image(
    swapchain: sys::Swapchain,
    wait_info: *const sys::SwapchainImageWaitInfo,
) -> sys::Result {
    call("xrWaitSwapchainImage", |runtime| {
        let swapchain = runtime.registry().get(swapchain)?;
        let wait_info = input(wait_info, "wait info")?;
        check_type(wait_info.ty, sys::SwapchainImageWaitInfo::TYPE)?;
        let policy = runtime.registry().get(swapchain.session)?.swapchain_wait();
        Ok(swapchain.wait(wait_info.timeout, policy))
    })
}

/// # Safety
///
/// `release_info` must be null or a valid `XrSwapchainImageReleaseInfo`.
pub unsafe extern "system" fn release_swapchain_image(
    swapchain: sys::Swapchain,
    release_info: *const sys::SwapchainImageReleaseInfo,
) -> sys::Result {
    call("xrReleaseSwapchainImage", |runtime| {
        let swapchain = runtime.registry().get(swapchain)?;
        if let Some(info) = release_info.as_ref() {
            check_type(info.ty, sys::SwapchainImageReleaseInfo::TYPE)?;
        }
        swapchain.release();
        Ok(())
    })
}

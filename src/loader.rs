//! The one symbol the OpenXR loader looks up in the runtime library.

use std::mem;

use openxr::sys;
use openxr::sys::loader::{
    XrNegotiateLoaderInfo, XrNegotiateRuntimeRequest, CURRENT_LOADER_RUNTIME_VERSION,
};
use tracing::{debug, info};

use crate::api;
use crate::Runtime;

fn loader_info_is_valid(info: &XrNegotiateLoaderInfo) -> bool {
    info.ty == XrNegotiateLoaderInfo::TYPE
        && info.struct_version == XrNegotiateLoaderInfo::VERSION
        && info.struct_size == mem::size_of::<XrNegotiateLoaderInfo>()
        && (info.min_interface_version..=info.max_interface_version)
            .contains(&CURRENT_LOADER_RUNTIME_VERSION)
}

fn runtime_request_is_valid(request: &XrNegotiateRuntimeRequest) -> bool {
    request.ty == XrNegotiateRuntimeRequest::TYPE
        && request.struct_version == XrNegotiateRuntimeRequest::VERSION
        && request.struct_size == mem::size_of::<XrNegotiateRuntimeRequest>()
}

/// Agrees on an interface version with the loader and hands it
/// `xrGetInstanceProcAddr`.
///
/// # Safety
///
/// Both pointers must be null or point to the structs named in their types.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn xrNegotiateLoaderRuntimeInterface(
    loader_info: *const XrNegotiateLoaderInfo,
    runtime_request: *mut XrNegotiateRuntimeRequest,
) -> sys::Result {
    Runtime::get();
    let (Some(loader_info), Some(runtime_request)) =
        (loader_info.as_ref(), runtime_request.as_mut())
    else {
        debug!("loader negotiation with null arguments");
        return sys::Result::ERROR_INITIALIZATION_FAILED;
    };
    if !loader_info_is_valid(loader_info) || !runtime_request_is_valid(runtime_request) {
        debug!("rejecting loader negotiation: {loader_info:?}");
        return sys::Result::ERROR_INITIALIZATION_FAILED;
    }
    runtime_request.runtime_interface_version = CURRENT_LOADER_RUNTIME_VERSION;
    runtime_request.runtime_api_version = sys::CURRENT_API_VERSION;
    runtime_request.get_instance_proc_addr = Some(api::get_instance_proc_addr);
    info!("negotiated loader interface version {CURRENT_LOADER_RUNTIME_VERSION}");
    sys::Result::SUCCESS
}

use openxr::sys;

use super::{call, input, output};
use crate::session;
use crate::types::SessionBeginInfo;

/// # Safety
///
/// `create_info` must be a valid `XrSessionCreateInfo` whose `next` chain
/// holds a graphics binding describing live objects, and `session` must be
/// writable.
pub unsafe extern "system" fn create_session(
    instance: sys::Instance,
    create_info: *const sys::SessionCreateInfo,
    session: *mut sys::Session,
) -> sys::Result {
    call("xrCreateSession", |runtime| {
        let out = output(session, "session")?;
        *out = session::create(runtime, instance, input(create_info, "create info")?)?;
        Ok(())
    })
}

/// # Safety
///
/// Must be called from the thread the application renders on.
pub unsafe extern "system" fn destroy_session(session: sys::Session) -> sys::Result {
    call("xrDestroySession", |runtime| session::destroy(runtime, session))
}

/// # Safety
///
/// `begin_info` must be a valid `XrSessionBeginInfo`.
pub unsafe extern "system" fn begin_session(
    session: sys::Session,
    begin_info: *const sys::SessionBeginInfo,
) -> sys::Result {
    call("xrBeginSession", |runtime| {
        let object = runtime.registry().get(session)?;
        let begin_info = SessionBeginInfo::from_raw(input(begin_info, "begin info")?)?;
        let instance = runtime.registry().get(object.instance)?;
        object.begin(session, &instance, begin_info)
    })
}

/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn end_session(session: sys::Session) -> sys::Result {
    call("xrEndSession", |runtime| {
        let object = runtime.registry().get(session)?;
        let instance = runtime.registry().get(object.instance)?;
        object.end(session, &instance)
    })
}

/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn request_exit_session(session: sys::Session) -> sys::Result {
    call("xrRequestExitSession", |runtime| {
        runtime.registry().get(session)?.request_exit(session)
    })
}

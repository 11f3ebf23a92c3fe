use openxr::sys;

use super::{call, check_type, fill_struct_array, input, output};
use crate::error::XrError;
use crate::session;
use crate::space::locate_eyes;
use crate::types::VIEW_COUNT;

/// Blocks until shortly before the next predicted display time.
///
/// # Safety
///
/// `wait_info` must be null or a valid `XrFrameWaitInfo`, and `frame_state`
/// a writable `XrFrameState`.
pub unsafe extern "system" fn wait_frame(
    session: sys::Session,
    wait_info: *const sys::FrameWaitInfo,
    frame_state: *mut sys::FrameState,
) -> sys::Result {
    call("xrWaitFrame", |runtime| {
        let session = runtime.registry().get(session)?;
        if let Some(info) = wait_info.as_ref() {
            check_type(info.ty, sys::FrameWaitInfo::TYPE)?;
        }
        let frame_state = output(frame_state, "frame state")?;
        check_type(frame_state.ty, sys::FrameState::TYPE)?;
        let timing = session.wait_frame()?;
        frame_state.predicted_display_time = sys::Time::from_nanos(timing.predicted_display_time);
        frame_state.predicted_display_period =
            sys::Duration::from_nanos(timing.predicted_display_period);
        frame_state.should_render = sys::TRUE;
        Ok(())
    })
}

/// # Safety
///
/// `begin_info` must be null or a valid `XrFrameBeginInfo`.
pub unsafe extern "system" fn begin_frame(
    session: sys::Session,
    begin_info: *const sys::FrameBeginInfo,
) -> sys::Result {
    call("xrBeginFrame", |runtime| {
        let session = runtime.registry().get(session)?;
        if let Some(info) = begin_info.as_ref() {
            check_type(info.ty, sys::FrameBeginInfo::TYPE)?;
        }
        session.begin_frame()
    })
}

/// Blocks until the compositor has shown the submitted layers.
///
/// # Safety
///
/// `end_info` must be a valid `XrFrameEndInfo` with valid layer pointers.
pub unsafe extern "system" fn end_frame(
    session: sys::Session,
    end_info: *const sys::FrameEndInfo,
) -> sys::Result {
    call("xrEndFrame", |runtime| {
        runtime.registry().get(session)?.end_frame(|| {
            session::describe_frame(runtime, session, input(end_info, "frame end info")?)
        })
    })
}

/// Reports both eye poses at the requested display time. The base space is
/// not taken into account.
///
/// # Safety
///
/// `view_locate_info` must be a valid `XrViewLocateInfo`, `view_state` a
/// writable `XrViewState`, and the view array must follow the two-call idiom.
pub unsafe extern "system" fn locate_views(
    session: sys::Session,
    view_locate_info: *const sys::ViewLocateInfo,
    view_state: *mut sys::ViewState,
    capacity: u32,
    count_output: *mut u32,
    views: *mut sys::View,
) -> sys::Result {
    call("xrLocateViews", |runtime| {
        runtime.registry().get(session)?;
        let info = input(view_locate_info, "view locate info")?;
        check_type(info.ty, sys::ViewLocateInfo::TYPE)?;
        if info.view_configuration_type != sys::ViewConfigurationType::PRIMARY_STEREO {
            return Err(XrError::ViewConfigurationTypeUnsupported(
                info.view_configuration_type,
            ));
        }
        let view_state = output(view_state, "view state")?;
        check_type(view_state.ty, sys::ViewState::TYPE)?;
        view_state.view_state_flags = sys::ViewStateFlags::EMPTY;

        let eyes = locate_eyes(info.display_time.as_nanos());
        fill_struct_array(capacity, count_output, views, VIEW_COUNT, |eye, out| {
            (out.pose, out.fov) = eyes[eye];
        })
    })
}

/// There are no haptic devices; the call succeeds without effect.
///
/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn apply_haptic_feedback(
    session: sys::Session,
    _haptic_action_info: *const sys::HapticActionInfo,
    _haptic_feedback: *const sys::HapticBaseHeader,
) -> sys::Result {
    call("xrApplyHapticFeedback", |runtime| {
        runtime.registry().get(session)?;
        Ok(())
    })
}

/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn stop_haptic_feedback(
    session: sys::Session,
    _haptic_action_info: *const sys::HapticActionInfo,
) -> sys::Result {
    call("xrStopHapticFeedback", |runtime| {
        runtime.registry().get(session)?;
        Ok(())
    })
}

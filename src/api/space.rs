use openxr::sys;

use super::{call, check_type, fill_array, input, output};
use crate::session;
use crate::types::REFERENCE_SPACES;

/// # Safety
///
/// Pointers must follow the two-call idiom.
pub unsafe extern "system" fn enumerate_reference_spaces(
    session: sys::Session,
    capacity: u32,
    count_output: *mut u32,
    spaces: *mut sys::ReferenceSpaceType,
) -> sys::Result {
    call("xrEnumerateReferenceSpaces", |runtime| {
        runtime.registry().get(session)?;
        fill_array(capacity, count_output, spaces, REFERENCE_SPACES.len(), |index, out| {
            *out = REFERENCE_SPACES[index];
            Ok(())
        })
    })
}

/// # Safety
///
/// `create_info` must be a valid `XrReferenceSpaceCreateInfo` and `space`
/// writable.
pub unsafe extern "system" fn create_reference_space(
    session: sys::Session,
    create_info: *const sys::ReferenceSpaceCreateInfo,
    space: *mut sys::Space,
) -> sys::Result {
    call("xrCreateReferenceSpace", |runtime| {
        let out = output(space, "space")?;
        let create_info = input(create_info, "create info")?;
        *out = session::create_reference_space(runtime, session, create_info)?;
        Ok(())
    })
}

/// # Safety
///
/// No pointers are read; marked unsafe to match the other entry points.
pub unsafe extern "system" fn destroy_space(space: sys::Space) -> sys::Result {
    call("xrDestroySpace", |runtime| session::destroy_space(runtime, space))
}

/// Spaces are not tracked relative to each other: the location reports no
/// valid pose.
///
/// # Safety
///
/// `location` must be a writable `XrSpaceLocation`.
pub unsafe extern "system" fn locate_space(
    space: sys::Space,
    base_space: sys::Space,
    _time: sys::Time,
    location: *mut sys::SpaceLocation,
) -> sys::Result {
    call("xrLocateSpace", |runtime| {
        runtime.registry().get(space)?;
        runtime.registry().get(base_space)?;
        let location = output(location, "space location")?;
        check_type(location.ty, sys::SpaceLocation::TYPE)?;
        location.location_flags = sys::SpaceLocationFlags::EMPTY;
        Ok(())
    })
}

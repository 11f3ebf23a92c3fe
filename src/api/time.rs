//! `XR_KHR_convert_timespec_time`. Runtime time is the monotonic clock in
//! nanoseconds, so both directions are exact.

use openxr::sys;

use super::{call, input, output};
use crate::timing::{self, Timespec};

/// # Safety
///
/// `timespec_time` must be writable.
pub unsafe extern "system" fn convert_time_to_timespec_time(
    instance: sys::Instance,
    time: sys::Time,
    timespec_time: *mut Timespec,
) -> sys::Result {
    call("xrConvertTimeToTimespecTimeKHR", |runtime| {
        runtime.registry().get(instance)?;
        let out = output(timespec_time, "timespec")?;
        *out = timing::time_to_timespec(time.as_nanos())?;
        Ok(())
    })
}

/// # Safety
///
/// `timespec_time` must be readable and `time` writable.
pub unsafe extern "system" fn convert_timespec_time_to_time(
    instance: sys::Instance,
    timespec_time: *const Timespec,
    time: *mut sys::Time,
) -> sys::Result {
    call("xrConvertTimespecTimeToTimeKHR", |runtime| {
        runtime.registry().get(instance)?;
        let timespec = input(timespec_time, "timespec")?;
        *output(time, "time")? = sys::Time::from_nanos(timing::timespec_to_time(timespec)?);
        Ok(())
    })
}

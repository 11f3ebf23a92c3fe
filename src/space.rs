use std::f32::consts::FRAC_PI_4;

use openxr::sys;

use crate::error::XrError;
use crate::types::{
    ReferenceSpaceCreateInfo, Result, INTERPUPILLARY_DISTANCE, REFERENCE_SPACES, VIEW_COUNT,
};

/// A reference space created by a session.
#[derive(Debug)]
pub struct Space {
    pub session: sys::Session,
    pub create_info: ReferenceSpaceCreateInfo,
}

impl Space {
    pub fn new(session: sys::Session, create_info: ReferenceSpaceCreateInfo) -> Result<Self> {
        if !REFERENCE_SPACES.contains(&create_info.reference_space_type) {
            return Err(XrError::ReferenceSpaceUnsupported(
                create_info.reference_space_type,
            ));
        }
        Ok(Self {
            session,
            create_info,
        })
    }
}

/// Symmetric 90 degree frustum used for both eyes.
pub const EYE_FOV: sys::Fovf = sys::Fovf {
    angle_left: -FRAC_PI_4,
    angle_right: FRAC_PI_4,
    angle_up: FRAC_PI_4,
    angle_down: -FRAC_PI_4,
};

/// Radians of head roll per nanosecond of display time.
const ROLL_RATE: f64 = 1e-10;

/// Pose of `eye` (0 = left) at `display_time`.
///
/// The eyes sit half the interpupillary distance either side of the origin
/// and the head slowly rolls about -Z so that motion is visible on screen.
/// The reference space is not taken into account.
pub fn eye_pose(eye: usize, display_time: i64) -> sys::Posef {
    let half_angle = (display_time as f64 * ROLL_RATE / 2.0) as f32;
    let side = if eye == 0 { -1.0 } else { 1.0 };
    sys::Posef {
        orientation: sys::Quaternionf {
            x: 0.0,
            y: 0.0,
            z: -half_angle.sin(),
            w: half_angle.cos(),
        },
        position: sys::Vector3f {
            x: side * INTERPUPILLARY_DISTANCE / 2.0,
            y: 0.0,
            z: 0.0,
        },
    }
}

/// Poses and fields of view of both eyes at `display_time`.
pub fn locate_eyes(display_time: i64) -> [(sys::Posef, sys::Fovf); VIEW_COUNT] {
    [0, 1].map(|eye| (eye_pose(eye, display_time), EYE_FOV))
}

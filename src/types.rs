use std::borrow::Cow;
use std::ffi::{c_char, CStr};

use openxr::sys;

use crate::error::XrError;

pub use openxr::sys::{
    Posef, ReferenceSpaceType, SwapchainCreateFlags, SwapchainUsageFlags, ViewConfigurationType,
};

pub type Result<T> = std::result::Result<T, XrError>;

pub const RUNTIME_NAME: &str = "OpenXR Sample Runtime Implementation";
pub const SYSTEM_NAME: &str = "OpenXR Sample Head Mounted Display";
pub const VENDOR_ID: u32 = 0;

/// Extensions reported by EnumerateInstanceExtensionProperties.
pub const ADVERTISED_EXTENSIONS: &[(&str, u32)] =
    &[(KHR_OPENGL_ENABLE, sys::KHR_opengl_enable_SPEC_VERSION)];
/// Extensions an instance may enable.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[KHR_OPENGL_ENABLE, KHR_CONVERT_TIMESPEC_TIME];
pub const KHR_OPENGL_ENABLE: &str = extension_name(sys::KHR_OPENGL_ENABLE_EXTENSION_NAME);
pub const KHR_CONVERT_TIMESPEC_TIME: &str =
    extension_name(sys::KHR_CONVERT_TIMESPEC_TIME_EXTENSION_NAME);

/// Strips the terminator from a registry extension name.
const fn extension_name(name: &'static [u8]) -> &'static str {
    let Some((&0, name)) = name.split_last() else {
        panic!("extension names are nul-terminated");
    };
    match std::str::from_utf8(name) {
        Ok(name) => name,
        Err(_) => panic!("extension names are ASCII"),
    }
}

pub const VIEW_COUNT: usize = 2;
pub const VIEW_DIMENSION: u32 = 1024;
pub const VIEW_SAMPLE_COUNT: u32 = 4;
pub const MAX_SWAPCHAIN_DIMENSION: u32 = 1024;
pub const MAX_LAYER_COUNT: u32 = 16;
/// Metres between the two eye positions reported by LocateViews.
pub const INTERPUPILLARY_DISTANCE: f32 = 0.04;

pub const GL_MIN_VERSION: Version = Version(3, 0, 0);
pub const GL_MAX_VERSION: Version = Version(4, 5, 0);

/// Color formats swapchains can be created with, in order of preference.
pub const SWAPCHAIN_FORMATS: [i64; 4] = [
    glow::RGBA8 as i64,
    glow::RGB8 as i64,
    glow::RGBA8_SNORM as i64,
    glow::RGB8_SNORM as i64,
];

pub const REFERENCE_SPACES: [ReferenceSpaceType; 3] = [
    ReferenceSpaceType::VIEW,
    ReferenceSpaceType::LOCAL,
    ReferenceSpaceType::STAGE,
];

/// A major/minor/patch version number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u16, pub u16, pub u32);

impl Version {
    pub const fn to_sys(self) -> sys::Version {
        sys::Version::new(self.0, self.1, self.2)
    }
}

impl From<sys::Version> for Version {
    fn from(value: sys::Version) -> Self {
        Self(value.major(), value.minor(), value.patch())
    }
}

/// Owned copy of the application info an instance was created with.
#[derive(Clone, Debug, PartialEq)]
pub struct AppInfo {
    pub name: Cow<'static, str>,
    pub version: u32,
    pub engine_name: Cow<'static, str>,
    pub engine_version: u32,
    pub api_version: Version,
}

impl AppInfo {
    fn from_raw(raw: &sys::ApplicationInfo) -> Self {
        Self {
            name: fixed_str(&raw.application_name).into(),
            version: raw.application_version,
            engine_name: fixed_str(&raw.engine_name).into(),
            engine_version: raw.engine_version,
            api_version: raw.api_version.into(),
        }
    }
}

/// Deep copy of [`sys::InstanceCreateInfo`]. The `next` chain is not kept.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceCreateInfo {
    pub create_flags: sys::InstanceCreateFlags,
    pub app_info: AppInfo,
    pub enabled_api_layers: Vec<String>,
    pub enabled_extensions: Vec<String>,
}

impl InstanceCreateInfo {
    /// # Safety
    ///
    /// The name arrays in `raw` must hold the advertised number of valid
    /// C string pointers.
    pub unsafe fn from_raw(raw: &sys::InstanceCreateInfo) -> Result<Self> {
        if raw.ty != sys::InstanceCreateInfo::TYPE {
            return Err(XrError::validation("expected XrInstanceCreateInfo"));
        }
        Ok(Self {
            create_flags: raw.create_flags,
            app_info: AppInfo::from_raw(&raw.application_info),
            enabled_api_layers: read_str_array(
                raw.enabled_api_layer_names,
                raw.enabled_api_layer_count,
            )?,
            enabled_extensions: read_str_array(
                raw.enabled_extension_names,
                raw.enabled_extension_count,
            )?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionCreateInfo {
    pub create_flags: sys::SessionCreateFlags,
    pub system_id: sys::SystemId,
}

impl SessionCreateInfo {
    pub fn from_raw(raw: &sys::SessionCreateInfo) -> Result<Self> {
        if raw.ty != sys::SessionCreateInfo::TYPE {
            return Err(XrError::validation("expected XrSessionCreateInfo"));
        }
        Ok(Self {
            create_flags: raw.create_flags,
            system_id: raw.system_id,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionBeginInfo {
    pub primary_view_configuration_type: ViewConfigurationType,
}

impl SessionBeginInfo {
    pub fn from_raw(raw: &sys::SessionBeginInfo) -> Result<Self> {
        if raw.ty != sys::SessionBeginInfo::TYPE {
            return Err(XrError::validation("expected XrSessionBeginInfo"));
        }
        Ok(Self {
            primary_view_configuration_type: raw.primary_view_configuration_type,
        })
    }
}

/// Info needed to create a swapchain, copied out of [`sys::SwapchainCreateInfo`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub create_flags: SwapchainCreateFlags,
    pub usage_flags: SwapchainUsageFlags,
    pub format: i64,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
    pub face_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}

impl SwapchainCreateInfo {
    pub fn from_raw(raw: &sys::SwapchainCreateInfo) -> Result<Self> {
        if raw.ty != sys::SwapchainCreateInfo::TYPE {
            return Err(XrError::validation("expected XrSwapchainCreateInfo"));
        }
        Ok(Self {
            create_flags: raw.create_flags,
            usage_flags: raw.usage_flags,
            format: raw.format,
            sample_count: raw.sample_count,
            width: raw.width,
            height: raw.height,
            face_count: raw.face_count,
            array_size: raw.array_size,
            mip_count: raw.mip_count,
        })
    }

    pub fn is_static(&self) -> bool {
        self.create_flags
            .contains(SwapchainCreateFlags::STATIC_IMAGE)
    }

    /// Checks the descriptor against what the runtime can allocate.
    pub fn validate(&self) -> Result<()> {
        if !SWAPCHAIN_FORMATS.contains(&self.format) {
            return Err(XrError::SwapchainFormatUnsupported(self.format));
        }
        if self.width == 0 || self.height == 0 {
            return Err(XrError::validation("swapchain extent must be non-zero"));
        }
        if self.width > MAX_SWAPCHAIN_DIMENSION || self.height > MAX_SWAPCHAIN_DIMENSION {
            return Err(XrError::validation(format!(
                "swapchain extent {}x{} exceeds {MAX_SWAPCHAIN_DIMENSION}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReferenceSpaceCreateInfo {
    pub reference_space_type: ReferenceSpaceType,
    pub pose_in_reference_space: Posef,
}

impl ReferenceSpaceCreateInfo {
    pub fn from_raw(raw: &sys::ReferenceSpaceCreateInfo) -> Result<Self> {
        if raw.ty != sys::ReferenceSpaceCreateInfo::TYPE {
            return Err(XrError::validation("expected XrReferenceSpaceCreateInfo"));
        }
        Ok(Self {
            reference_space_type: raw.reference_space_type,
            pose_in_reference_space: raw.pose_in_reference_space,
        })
    }
}

/// Reads a nul-terminated string out of a fixed-size char array, stopping at
/// the end of the array if no terminator is present.
pub fn fixed_str(chars: &[c_char]) -> String {
    let bytes: &[u8] = bytemuck::cast_slice(chars);
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Writes `value` into a fixed-size char array, truncating if needed. The
/// result is always nul-terminated.
pub fn place_str(dst: &mut [c_char], value: &str) {
    let dst: &mut [u8] = bytemuck::cast_slice_mut(dst);
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let len = value.len().min(max);
    dst[..len].copy_from_slice(&value.as_bytes()[..len]);
    dst[len] = 0;
}

/// # Safety
///
/// `names` must point to `count` readable pointers when `count` is non-zero.
unsafe fn read_str_array(names: *const *const c_char, count: u32) -> Result<Vec<String>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if names.is_null() {
        return Err(XrError::validation("name array is null"));
    }
    std::slice::from_raw_parts(names, count as usize)
        .iter()
        .map(|&name| {
            if name.is_null() {
                return Err(XrError::validation("name is null"));
            }
            CStr::from_ptr(name)
                .to_str()
                .map(str::to_owned)
                .map_err(|_| XrError::validation("name is not valid UTF-8"))
        })
        .collect()
}

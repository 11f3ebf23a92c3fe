use std::sync::Arc;

use openxr::sys;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::XrError;
use crate::events::EventQueue;
use crate::path::PathTable;
use crate::session;
use crate::types::{
    place_str, InstanceCreateInfo, Result, GL_MAX_VERSION, GL_MIN_VERSION, MAX_LAYER_COUNT,
    MAX_SWAPCHAIN_DIMENSION, SUPPORTED_EXTENSIONS, SYSTEM_NAME, VENDOR_ID, VIEW_DIMENSION,
    VIEW_SAMPLE_COUNT,
};
use crate::Runtime;

/// The head mounted display exposed by this runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct System {
    pub id: sys::SystemId,
    pub form_factor: sys::FormFactor,
}

impl System {
    pub fn write_properties(&self, out: &mut sys::SystemProperties) {
        out.system_id = self.id;
        out.vendor_id = VENDOR_ID;
        place_str(&mut out.system_name, SYSTEM_NAME);
        out.graphics_properties = sys::SystemGraphicsProperties {
            max_swapchain_image_height: MAX_SWAPCHAIN_DIMENSION,
            max_swapchain_image_width: MAX_SWAPCHAIN_DIMENSION,
            max_layer_count: MAX_LAYER_COUNT,
        };
        out.tracking_properties = sys::SystemTrackingProperties {
            orientation_tracking: sys::TRUE,
            position_tracking: sys::FALSE,
        };
    }

    pub fn write_view_configuration_properties(&self, out: &mut sys::ViewConfigurationProperties) {
        out.view_configuration_type = sys::ViewConfigurationType::PRIMARY_STEREO;
        out.fov_mutable = sys::TRUE;
    }

    pub fn write_view_configuration_view(&self, out: &mut sys::ViewConfigurationView) {
        out.recommended_image_rect_width = VIEW_DIMENSION;
        out.max_image_rect_width = VIEW_DIMENSION;
        out.recommended_image_rect_height = VIEW_DIMENSION;
        out.max_image_rect_height = VIEW_DIMENSION;
        out.recommended_swapchain_sample_count = VIEW_SAMPLE_COUNT;
        out.max_swapchain_sample_count = VIEW_SAMPLE_COUNT;
    }

    pub fn write_opengl_requirements(&self, out: &mut sys::GraphicsRequirementsOpenGLKHR) {
        out.min_api_version_supported = GL_MIN_VERSION.to_sys();
        out.max_api_version_supported = GL_MAX_VERSION.to_sys();
    }
}

pub struct Instance {
    pub create_info: InstanceCreateInfo,
    pub paths: PathTable,
    pub events: Arc<EventQueue>,
    systems: Mutex<Vec<System>>,
    sessions: Mutex<Vec<sys::Session>>,
    running: Mutex<Option<sys::Session>>,
}

impl Instance {
    pub fn new(create_info: InstanceCreateInfo) -> Result<Self> {
        if let Some(ext) = create_info
            .enabled_extensions
            .iter()
            .find(|ext| !SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        {
            return Err(XrError::ExtensionNotPresent(ext.clone()));
        }
        if !create_info.enabled_api_layers.is_empty() {
            warn!(
                "ignoring API layers handed to the runtime: {:?}",
                create_info.enabled_api_layers
            );
        }
        Ok(Self {
            create_info,
            paths: PathTable::default(),
            events: Arc::default(),
            systems: Mutex::default(),
            sessions: Mutex::default(),
            running: Mutex::default(),
        })
    }

    /// Returns the system for `form_factor`, creating it on first request.
    pub fn get_system(&self, form_factor: sys::FormFactor) -> Result<sys::SystemId> {
        match form_factor {
            sys::FormFactor::HEAD_MOUNTED_DISPLAY => {}
            sys::FormFactor::HANDHELD_DISPLAY => {
                return Err(XrError::FormFactorUnavailable(form_factor))
            }
            _ => return Err(XrError::FormFactorUnsupported(form_factor)),
        }
        let mut systems = self.systems.lock();
        if let Some(system) = systems.iter().find(|s| s.form_factor == form_factor) {
            return Ok(system.id);
        }
        let id = sys::SystemId::from_raw(systems.len() as u64 + 1);
        systems.push(System { id, form_factor });
        Ok(id)
    }

    pub fn system(&self, id: sys::SystemId) -> Result<System> {
        self.systems
            .lock()
            .iter()
            .find(|s| s.id == id)
            .copied()
            .ok_or(XrError::SystemInvalid)
    }

    pub fn sessions(&self) -> Vec<sys::Session> {
        self.sessions.lock().clone()
    }

    pub(crate) fn add_session(&self, session: sys::Session) {
        self.sessions.lock().push(session);
    }

    pub(crate) fn remove_session(&self, session: sys::Session) {
        self.sessions.lock().retain(|&s| s != session);
        self.clear_running(session);
    }

    /// Only one session per instance may be running at a time.
    pub(crate) fn mark_running(&self, session: sys::Session) -> Result<()> {
        let mut running = self.running.lock();
        match *running {
            Some(other) if other != session => Err(XrError::SessionRunning),
            _ => {
                *running = Some(session);
                Ok(())
            }
        }
    }

    pub(crate) fn clear_running(&self, session: sys::Session) {
        let mut running = self.running.lock();
        if *running == Some(session) {
            *running = None;
        }
    }
}

/// # Safety
///
/// `raw` must be a valid `XrInstanceCreateInfo` whose name arrays hold the
/// advertised number of C strings.
pub unsafe fn create(runtime: &Runtime, raw: &sys::InstanceCreateInfo) -> Result<sys::Instance> {
    let instance = Instance::new(InstanceCreateInfo::from_raw(raw)?)?;
    info!(
        "creating instance for {:?} ({:?}), extensions {:?}",
        instance.create_info.app_info.name,
        instance.create_info.app_info.engine_name,
        instance.create_info.enabled_extensions
    );
    Ok(runtime.registry().insert(instance))
}

/// Destroys an instance and every session it owns.
pub fn destroy(runtime: &Runtime, handle: sys::Instance) -> Result<()> {
    let instance = runtime.registry().get(handle)?;
    for session in instance.sessions() {
        if let Err(err) = session::destroy(runtime, session) {
            warn!("destroying session {session:?} with its instance: {err}");
        }
    }
    runtime.registry().remove(handle)?;
    info!("destroyed instance {handle:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;
    use crate::types::{AppInfo, Version, KHR_OPENGL_ENABLE};

    fn create_info(extensions: &[&str]) -> InstanceCreateInfo {
        InstanceCreateInfo {
            create_flags: sys::InstanceCreateFlags::EMPTY,
            app_info: AppInfo {
                name: "t1".into(),
                version: 1,
                engine_name: "".into(),
                engine_version: 0,
                api_version: Version(1, 0, 0),
            },
            enabled_api_layers: Vec::new(),
            enabled_extensions: extensions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(Instance::new(create_info(&[KHR_OPENGL_ENABLE])).is_ok());
        let err = Instance::new(create_info(&["XR_KHR_vulkan_enable"]))
            .err()
            .unwrap();
        assert_eq!(err.code(), sys::Result::ERROR_EXTENSION_NOT_PRESENT);
        assert_eq!(err.to_string(), "Extension XR_KHR_vulkan_enable is not present");
    }

    #[test]
    fn only_the_hmd_form_factor_is_available() {
        let instance = Instance::new(create_info(&[])).unwrap();
        let hmd = instance
            .get_system(sys::FormFactor::HEAD_MOUNTED_DISPLAY)
            .unwrap();
        assert_ne!(hmd, sys::SystemId::NULL);
        assert_eq!(
            instance
                .get_system(sys::FormFactor::HEAD_MOUNTED_DISPLAY)
                .unwrap(),
            hmd
        );
        assert_eq!(
            instance
                .get_system(sys::FormFactor::HANDHELD_DISPLAY)
                .unwrap_err()
                .code(),
            sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE
        );
        assert!(matches!(
            instance.system(sys::SystemId::NULL),
            Err(XrError::SystemInvalid)
        ));
        assert_eq!(instance.system(hmd).unwrap().id, hmd);
    }

    #[test]
    fn system_properties_describe_the_hmd() {
        let instance = Instance::new(create_info(&[])).unwrap();
        let id = instance
            .get_system(sys::FormFactor::HEAD_MOUNTED_DISPLAY)
            .unwrap();
        let system = instance.system(id).unwrap();

        let mut props: sys::SystemProperties = unsafe { mem::zeroed() };
        system.write_properties(&mut props);
        assert_eq!(props.system_id, id);
        assert_eq!(crate::types::fixed_str(&props.system_name), SYSTEM_NAME);
        assert_eq!(props.graphics_properties.max_layer_count, MAX_LAYER_COUNT);

        let mut view: sys::ViewConfigurationView = unsafe { mem::zeroed() };
        system.write_view_configuration_view(&mut view);
        assert_eq!(
            (view.recommended_image_rect_width, view.recommended_image_rect_height),
            (1024, 1024)
        );
        assert_eq!(view.max_swapchain_sample_count, 4);

        let mut reqs: sys::GraphicsRequirementsOpenGLKHR = unsafe { mem::zeroed() };
        system.write_opengl_requirements(&mut reqs);
        assert_eq!(reqs.min_api_version_supported, sys::Version::new(3, 0, 0));
        assert_eq!(reqs.max_api_version_supported, sys::Version::new(4, 5, 0));
    }

    #[test]
    fn one_running_session_per_instance() {
        let instance = Instance::new(create_info(&[])).unwrap();
        let a = sys::Session::from_raw(1);
        let b = sys::Session::from_raw(2);
        instance.mark_running(a).unwrap();
        assert!(matches!(instance.mark_running(b), Err(XrError::SessionRunning)));
        instance.clear_running(b);
        assert!(instance.mark_running(b).is_err());
        instance.clear_running(a);
        instance.mark_running(b).unwrap();
    }
}

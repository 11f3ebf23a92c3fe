//! Sessions: the lifecycle state machine (created, running, exiting) and the
//! frame state machine (WaitFrame, BeginFrame, EndFrame) layered on top.

use std::slice;
use std::sync::Arc;

use openxr::sys;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::compositor::{Compositor, FrameDescription, ProjectionLayer, ProjectionView};
use crate::config::SwapchainWaitPolicy;
use crate::error::XrError;
use crate::events::EventQueue;
use crate::graphics::{GraphicsBinding, SessionGraphics};
use crate::instance::Instance;
use crate::space::Space;
use crate::swapchain::Swapchain;
use crate::timing::FrameTimer;
use crate::types::{
    ReferenceSpaceCreateInfo, Result, SessionBeginInfo, SessionCreateInfo, SwapchainCreateInfo,
    MAX_LAYER_COUNT, VIEW_COUNT,
};
use crate::Runtime;

#[derive(Debug)]
struct LifecycleState {
    /// Set while the session is running.
    begin_info: Option<SessionBeginInfo>,
    /// BeginFrame and EndFrame must alternate; this is true when BeginFrame
    /// is the legal next call.
    begin_frame_allowed: bool,
    exit_requested: bool,
}

/// Predicted timing returned by WaitFrame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    pub predicted_display_time: i64,
    pub predicted_display_period: i64,
}

pub struct Session {
    pub instance: sys::Instance,
    pub create_info: SessionCreateInfo,
    pub binding: &'static str,
    events: Arc<EventQueue>,
    graphics: SessionGraphics,
    compositor: Mutex<Compositor>,
    state: Mutex<LifecycleState>,
    timer: Mutex<FrameTimer>,
    swapchain_wait: SwapchainWaitPolicy,
    swapchains: Mutex<Vec<sys::Swapchain>>,
    spaces: Mutex<Vec<sys::Space>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instance", &self.instance)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.state.lock().begin_info.is_some()
    }

    pub fn graphics(&self) -> &SessionGraphics {
        &self.graphics
    }

    pub fn frames_composited(&self) -> u64 {
        self.compositor.lock().frames()
    }

    pub fn swapchain_wait(&self) -> SwapchainWaitPolicy {
        self.swapchain_wait
    }

    pub fn spaces(&self) -> Vec<sys::Space> {
        self.spaces.lock().clone()
    }

    pub fn swapchains(&self) -> Vec<sys::Swapchain> {
        self.swapchains.lock().clone()
    }

    fn require_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(XrError::SessionNotRunning)
        }
    }

    pub fn begin(
        &self,
        handle: sys::Session,
        instance: &Instance,
        info: SessionBeginInfo,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.begin_info.is_some() {
            return Err(XrError::SessionRunning);
        }
        if info.primary_view_configuration_type != sys::ViewConfigurationType::PRIMARY_STEREO {
            return Err(XrError::ViewConfigurationTypeUnsupported(
                info.primary_view_configuration_type,
            ));
        }
        instance.mark_running(handle)?;
        state.begin_info = Some(info);
        state.begin_frame_allowed = true;
        state.exit_requested = false;
        drop(state);
        self.events.push_states(
            handle,
            &[
                sys::SessionState::SYNCHRONIZED,
                sys::SessionState::VISIBLE,
                sys::SessionState::FOCUSED,
            ],
        );
        info!("session {handle:?} running");
        Ok(())
    }

    pub fn end(&self, handle: sys::Session, instance: &Instance) -> Result<()> {
        let mut state = self.state.lock();
        if state.begin_info.take().is_none() {
            return Err(XrError::SessionNotRunning);
        }
        let exiting = std::mem::take(&mut state.exit_requested);
        state.begin_frame_allowed = true;
        drop(state);
        instance.clear_running(handle);
        self.events.push_state(handle, sys::SessionState::IDLE);
        if exiting {
            self.events.push_state(handle, sys::SessionState::EXITING);
        }
        info!("session {handle:?} ended");
        Ok(())
    }

    pub fn request_exit(&self, handle: sys::Session) -> Result<()> {
        let mut state = self.state.lock();
        if state.begin_info.is_none() {
            return Err(XrError::SessionNotRunning);
        }
        state.exit_requested = true;
        drop(state);
        self.events.push_states(
            handle,
            &[
                sys::SessionState::VISIBLE,
                sys::SessionState::SYNCHRONIZED,
                sys::SessionState::STOPPING,
            ],
        );
        Ok(())
    }

    /// Blocks until shortly before the next display time.
    pub fn wait_frame(&self) -> Result<FrameTiming> {
        self.require_running()?;
        let mut timer = self.timer.lock();
        let predicted_display_time = timer.wait_for_next_frame();
        Ok(FrameTiming {
            predicted_display_time,
            predicted_display_period: timer.period(),
        })
    }

    pub fn begin_frame(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.begin_info.is_none() {
            return Err(XrError::SessionNotRunning);
        }
        if !state.begin_frame_allowed {
            return Err(XrError::CallOrderInvalid("BeginFrame called twice without EndFrame"));
        }
        state.begin_frame_allowed = false;
        Ok(())
    }

    /// Hands the frame built by `describe` to the compositor and blocks until
    /// it is shown. `describe` only runs once the call order has been checked,
    /// and a frame it rejects leaves the session recording.
    pub fn end_frame(&self, describe: impl FnOnce() -> Result<FrameDescription>) -> Result<()> {
        let frame = {
            let mut state = self.state.lock();
            if state.begin_info.is_none() {
                return Err(XrError::SessionNotRunning);
            }
            if state.begin_frame_allowed {
                return Err(XrError::CallOrderInvalid("EndFrame called without BeginFrame"));
            }
            let frame = describe()?;
            state.begin_frame_allowed = true;
            frame
        };
        self.compositor.lock().submit(frame)
    }
}

/// Creates a session for `instance` from an application's create info.
///
/// # Safety
///
/// `raw.next` must be null or a valid chain of OpenXR structs, and the
/// graphics binding in it must describe live objects.
pub unsafe fn create(
    runtime: &Runtime,
    instance_handle: sys::Instance,
    raw: &sys::SessionCreateInfo,
) -> Result<sys::Session> {
    let instance = runtime.registry().get(instance_handle)?;
    let create_info = SessionCreateInfo::from_raw(raw)?;
    instance.system(create_info.system_id)?;
    let binding = GraphicsBinding::from_next_chain(raw.next)?;
    let config = runtime.config();

    let graphics = SessionGraphics::new(&binding, config)?;
    let presenter = graphics.create_presenter(&config.window)?;
    let compositor = Compositor::spawn(presenter)?;

    let session = Session {
        instance: instance_handle,
        create_info,
        binding: binding.name(),
        events: instance.events.clone(),
        graphics,
        compositor: Mutex::new(compositor),
        state: Mutex::new(LifecycleState {
            begin_info: None,
            begin_frame_allowed: true,
            exit_requested: false,
        }),
        timer: Mutex::new(FrameTimer::new(config.display_period_nanos())),
        swapchain_wait: config.swapchain_wait,
        swapchains: Mutex::default(),
        spaces: Mutex::default(),
    };
    let handle: sys::Session = runtime.registry().insert(session);
    instance.add_session(handle);
    instance
        .events
        .push_states(handle, &[sys::SessionState::IDLE, sys::SessionState::READY]);
    info!("created session {handle:?} with the {} binding", binding.name());
    Ok(handle)
}

/// Destroys a session, stopping its compositor before releasing its
/// swapchains and spaces.
pub fn destroy(runtime: &Runtime, handle: sys::Session) -> Result<()> {
    let session = runtime.registry().remove(handle)?;
    session.compositor.lock().shutdown();

    for swapchain in session.swapchains.lock().drain(..) {
        if let Ok(swapchain) = runtime.registry().remove(swapchain) {
            session.graphics.destroy_images(swapchain.images.textures());
        }
    }
    for space in session.spaces.lock().drain(..) {
        let _ = runtime.registry().remove(space);
    }
    if let Ok(instance) = runtime.registry().get(session.instance) {
        instance.remove_session(handle);
    }
    session.events.forget_session(handle);
    debug!("destroyed session {handle:?}");
    Ok(())
}

pub fn create_swapchain(
    runtime: &Runtime,
    handle: sys::Session,
    raw: &sys::SwapchainCreateInfo,
) -> Result<sys::Swapchain> {
    let session = runtime.registry().get(handle)?;
    let create_info = SwapchainCreateInfo::from_raw(raw)?;
    create_info.validate()?;
    if create_info.sample_count > 1 || create_info.array_size > 1 {
        debug!(
            sample_count = create_info.sample_count,
            array_size = create_info.array_size,
            "swapchain images are single sampled 2D textures"
        );
    }
    let len = crate::swapchain::SwapchainRing::for_create_info(&create_info).len();
    let images = session.graphics.create_images(&create_info, len)?;
    let swapchain: sys::Swapchain = runtime
        .registry()
        .insert(Swapchain::new(handle, create_info, images));
    session.swapchains.lock().push(swapchain);
    debug!(
        "created swapchain {swapchain:?}: {}x{} format {:#x}, {len} images",
        create_info.width, create_info.height, create_info.format
    );
    Ok(swapchain)
}

pub fn destroy_swapchain(runtime: &Runtime, handle: sys::Swapchain) -> Result<()> {
    let swapchain = runtime.registry().remove(handle)?;
    match runtime.registry().get(swapchain.session) {
        Ok(session) => {
            session.swapchains.lock().retain(|&s| s != handle);
            session.graphics.destroy_images(swapchain.images.textures());
        }
        Err(_) => warn!("swapchain {handle:?} outlived its session"),
    }
    Ok(())
}

pub fn create_reference_space(
    runtime: &Runtime,
    handle: sys::Session,
    raw: &sys::ReferenceSpaceCreateInfo,
) -> Result<sys::Space> {
    let session = runtime.registry().get(handle)?;
    let space = Space::new(handle, ReferenceSpaceCreateInfo::from_raw(raw)?)?;
    let space: sys::Space = runtime.registry().insert(space);
    session.spaces.lock().push(space);
    Ok(space)
}

pub fn destroy_space(runtime: &Runtime, handle: sys::Space) -> Result<()> {
    let space = runtime.registry().remove(handle)?;
    if let Ok(session) = runtime.registry().get(space.session) {
        session.spaces.lock().retain(|&s| s != handle);
    }
    Ok(())
}

/// Copies the layers of an `XrFrameEndInfo` into a [`FrameDescription`],
/// resolving swapchain handles.
///
/// Only projection layers are composited; other layer types are accepted and
/// skipped.
///
/// # Safety
///
/// The layer pointers in `info` must be valid for the advertised counts.
pub unsafe fn describe_frame(
    runtime: &Runtime,
    session: sys::Session,
    info: &sys::FrameEndInfo,
) -> Result<FrameDescription> {
    if info.ty != sys::FrameEndInfo::TYPE {
        return Err(XrError::validation("expected XrFrameEndInfo"));
    }
    if info.layer_count > MAX_LAYER_COUNT {
        return Err(XrError::LayerLimitExceeded(info.layer_count));
    }
    let mut frame = FrameDescription {
        display_time: info.display_time.as_nanos(),
        layer_count: info.layer_count,
        projection_layers: Vec::new(),
    };
    if info.layer_count == 0 {
        return Ok(frame);
    }
    if info.layers.is_null() {
        return Err(XrError::LayerInvalid("layer array is null"));
    }
    for &layer in slice::from_raw_parts(info.layers, info.layer_count as usize) {
        if layer.is_null() {
            return Err(XrError::LayerInvalid("layer pointer is null"));
        }
        match (*layer).ty {
            sys::CompositionLayerProjection::TYPE => {
                let projection = &*layer.cast::<sys::CompositionLayerProjection>();
                frame
                    .projection_layers
                    .push(describe_projection(runtime, session, projection)?);
            }
            ty => debug!("skipping composition layer of type {ty:?}"),
        }
    }
    Ok(frame)
}

unsafe fn describe_projection(
    runtime: &Runtime,
    session: sys::Session,
    projection: &sys::CompositionLayerProjection,
) -> Result<ProjectionLayer> {
    if projection.view_count as usize != VIEW_COUNT || projection.views.is_null() {
        return Err(XrError::validation(format!(
            "projection layers need {VIEW_COUNT} views, got {}",
            projection.view_count
        )));
    }
    let views = slice::from_raw_parts(projection.views, VIEW_COUNT)
        .iter()
        .map(|view| {
            if view.ty != sys::CompositionLayerProjectionView::TYPE {
                return Err(XrError::validation("expected XrCompositionLayerProjectionView"));
            }
            let swapchain = runtime.registry().get(view.sub_image.swapchain)?;
            if swapchain.session != session {
                return Err(XrError::validation(
                    "projection view uses another session's swapchain",
                ));
            }
            Ok(ProjectionView {
                swapchain: swapchain.images.clone(),
                image_rect: view.sub_image.image_rect,
            })
        })
        .collect::<Result<_>>()?;
    Ok(ProjectionLayer { views })
}

#[cfg(test)]
mod tests {
    use std::{mem, ptr};

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::instance;
    use crate::types::{ReferenceSpaceType, SwapchainCreateFlags, SwapchainUsageFlags};

    struct Fixture {
        runtime: Runtime,
        instance: sys::Instance,
        session: sys::Session,
    }

    fn fixture() -> Fixture {
        let runtime = Runtime::new(
            RuntimeConfig::headless().with_display_period(std::time::Duration::from_millis(1)),
        );
        let create_info = sys::InstanceCreateInfo {
            ty: sys::InstanceCreateInfo::TYPE,
            ..unsafe { mem::zeroed() }
        };
        let instance = unsafe { instance::create(&runtime, &create_info) }.unwrap();
        let system = runtime
            .registry()
            .get(instance)
            .unwrap()
            .get_system(sys::FormFactor::HEAD_MOUNTED_DISPLAY)
            .unwrap();
        let binding = sys::GraphicsBindingOpenGLXlibKHR {
            ty: sys::GraphicsBindingOpenGLXlibKHR::TYPE,
            ..unsafe { mem::zeroed() }
        };
        let session_info = sys::SessionCreateInfo {
            ty: sys::SessionCreateInfo::TYPE,
            next: &binding as *const _ as *const _,
            create_flags: sys::SessionCreateFlags::EMPTY,
            system_id: system,
        };
        let session = unsafe { create(&runtime, instance, &session_info) }.unwrap();
        Fixture {
            runtime,
            instance,
            session,
        }
    }

    impl Fixture {
        fn session(&self) -> Arc<Session> {
            self.runtime.registry().get(self.session).unwrap()
        }

        fn instance(&self) -> Arc<Instance> {
            self.runtime.registry().get(self.instance).unwrap()
        }

        fn begin(&self) -> Result<()> {
            self.session().begin(
                self.session,
                &self.instance(),
                SessionBeginInfo {
                    primary_view_configuration_type: sys::ViewConfigurationType::PRIMARY_STEREO,
                },
            )
        }

        fn drain_states(&self) -> Vec<sys::SessionState> {
            std::iter::from_fn(|| self.instance().events.pop())
                .map(|event| event.state)
                .collect()
        }
    }

    fn swapchain_info(flags: SwapchainCreateFlags) -> sys::SwapchainCreateInfo {
        sys::SwapchainCreateInfo {
            ty: sys::SwapchainCreateInfo::TYPE,
            next: ptr::null(),
            create_flags: flags,
            usage_flags: SwapchainUsageFlags::COLOR_ATTACHMENT,
            format: glow::RGBA8 as i64,
            sample_count: 4,
            width: 1024,
            height: 1024,
            face_count: 1,
            array_size: 1,
            mip_count: 1,
        }
    }

    #[test]
    fn lifecycle_queues_state_events() {
        let fx = fixture();
        assert_eq!(
            fx.drain_states(),
            [sys::SessionState::IDLE, sys::SessionState::READY]
        );
        fx.begin().unwrap();
        assert_eq!(
            fx.drain_states(),
            [
                sys::SessionState::SYNCHRONIZED,
                sys::SessionState::VISIBLE,
                sys::SessionState::FOCUSED
            ]
        );
        fx.session().request_exit(fx.session).unwrap();
        fx.session().end(fx.session, &fx.instance()).unwrap();
        assert_eq!(
            fx.drain_states(),
            [
                sys::SessionState::VISIBLE,
                sys::SessionState::SYNCHRONIZED,
                sys::SessionState::STOPPING,
                sys::SessionState::IDLE,
                sys::SessionState::EXITING
            ]
        );
    }

    #[test]
    fn begin_twice_reports_session_running() {
        let fx = fixture();
        fx.begin().unwrap();
        assert!(matches!(fx.begin(), Err(XrError::SessionRunning)));
        fx.session().end(fx.session, &fx.instance()).unwrap();
        fx.begin().unwrap();
    }

    #[test]
    fn begin_rejects_mono_views() {
        let fx = fixture();
        let err = fx
            .session()
            .begin(
                fx.session,
                &fx.instance(),
                SessionBeginInfo {
                    primary_view_configuration_type: sys::ViewConfigurationType::PRIMARY_MONO,
                },
            )
            .unwrap_err();
        assert_eq!(
            err.code(),
            sys::Result::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED
        );
        assert!(!fx.session().is_running());
    }

    #[test]
    fn frame_calls_need_a_running_session() {
        let fx = fixture();
        let session = fx.session();
        assert!(matches!(session.wait_frame(), Err(XrError::SessionNotRunning)));
        assert!(matches!(session.begin_frame(), Err(XrError::SessionNotRunning)));
        assert!(matches!(
            session.end_frame(|| Ok(FrameDescription::default())),
            Err(XrError::SessionNotRunning)
        ));
        assert!(matches!(
            session.end(fx.session, &fx.instance()),
            Err(XrError::SessionNotRunning)
        ));
    }

    #[test]
    fn begin_and_end_frame_alternate() {
        let fx = fixture();
        fx.begin().unwrap();
        let session = fx.session();

        assert!(matches!(
            session.end_frame(|| Ok(FrameDescription::default())),
            Err(XrError::CallOrderInvalid(_))
        ));
        for _ in 0..3 {
            let timing = session.wait_frame().unwrap();
            assert_eq!(timing.predicted_display_period, 1_000_000);
            session.begin_frame().unwrap();
            assert!(matches!(
                session.begin_frame(),
                Err(XrError::CallOrderInvalid(_))
            ));
            session.end_frame(|| Ok(FrameDescription::default())).unwrap();
        }
        assert_eq!(session.frames_composited(), 3);
    }

    #[test]
    fn end_frame_checks_call_order_before_the_layers() {
        let fx = fixture();
        fx.begin().unwrap();
        let session = fx.session();
        let rejected = || Err(XrError::LayerInvalid("layer pointer is null"));

        assert!(matches!(
            session.end_frame(|| unreachable!("layers read out of order")),
            Err(XrError::CallOrderInvalid(_))
        ));
        session.begin_frame().unwrap();
        assert!(matches!(
            session.end_frame(rejected),
            Err(XrError::LayerInvalid(_))
        ));
        session.end_frame(|| Ok(FrameDescription::default())).unwrap();
        assert_eq!(session.frames_composited(), 1);
    }

    #[test]
    fn destroying_a_session_cascades() {
        let fx = fixture();
        let swapchain =
            create_swapchain(&fx.runtime, fx.session, &swapchain_info(SwapchainCreateFlags::EMPTY))
                .unwrap();
        let space_info = sys::ReferenceSpaceCreateInfo {
            ty: sys::ReferenceSpaceCreateInfo::TYPE,
            next: ptr::null(),
            reference_space_type: ReferenceSpaceType::LOCAL,
            pose_in_reference_space: crate::space::eye_pose(0, 0),
        };
        let first = create_reference_space(&fx.runtime, fx.session, &space_info).unwrap();
        let second = create_reference_space(&fx.runtime, fx.session, &space_info).unwrap();
        assert_ne!(first, second);
        assert_eq!(fx.session().spaces().len(), 2);

        destroy(&fx.runtime, fx.session).unwrap();
        assert!(fx.runtime.registry().get(swapchain).is_err());
        assert!(fx.runtime.registry().get(first).is_err());
        assert!(fx.runtime.registry().get(second).is_err());
        assert!(fx.instance().sessions().is_empty());
        assert!(matches!(
            destroy(&fx.runtime, fx.session),
            Err(XrError::HandleInvalid("session"))
        ));
    }

    #[test]
    fn swapchains_and_spaces_are_destroyed_individually() {
        let fx = fixture();
        let swapchain = create_swapchain(
            &fx.runtime,
            fx.session,
            &swapchain_info(SwapchainCreateFlags::STATIC_IMAGE),
        )
        .unwrap();
        assert_eq!(fx.runtime.registry().get(swapchain).unwrap().len(), 1);
        destroy_swapchain(&fx.runtime, swapchain).unwrap();
        assert!(fx.session().swapchains().is_empty());
        assert!(destroy_swapchain(&fx.runtime, swapchain).is_err());

        let bad_space = sys::ReferenceSpaceCreateInfo {
            ty: sys::ReferenceSpaceCreateInfo::TYPE,
            next: ptr::null(),
            reference_space_type: ReferenceSpaceType::UNBOUNDED_MSFT,
            pose_in_reference_space: crate::space::eye_pose(0, 0),
        };
        assert_eq!(
            create_reference_space(&fx.runtime, fx.session, &bad_space)
                .unwrap_err()
                .code(),
            sys::Result::ERROR_REFERENCE_SPACE_UNSUPPORTED
        );
    }

    #[test]
    fn frame_description_resolves_projection_views() {
        let fx = fixture();
        let swapchain =
            create_swapchain(&fx.runtime, fx.session, &swapchain_info(SwapchainCreateFlags::EMPTY))
                .unwrap();
        let view = sys::CompositionLayerProjectionView {
            ty: sys::CompositionLayerProjectionView::TYPE,
            sub_image: sys::SwapchainSubImage {
                swapchain,
                ..unsafe { mem::zeroed() }
            },
            ..unsafe { mem::zeroed() }
        };
        let views = [view, view];
        let projection = sys::CompositionLayerProjection {
            ty: sys::CompositionLayerProjection::TYPE,
            view_count: 2,
            views: views.as_ptr(),
            ..unsafe { mem::zeroed() }
        };
        let layers = [&projection as *const _ as *const sys::CompositionLayerBaseHeader];
        let info = sys::FrameEndInfo {
            ty: sys::FrameEndInfo::TYPE,
            next: ptr::null(),
            display_time: sys::Time::from_nanos(7),
            environment_blend_mode: sys::EnvironmentBlendMode::OPAQUE,
            layer_count: 1,
            layers: layers.as_ptr(),
        };
        let frame = unsafe { describe_frame(&fx.runtime, fx.session, &info) }.unwrap();
        assert_eq!(frame.display_time, 7);
        assert_eq!(frame.projection_layers.len(), 1);
        assert_eq!(frame.projection_layers[0].views.len(), 2);

        let too_many = sys::FrameEndInfo {
            layer_count: MAX_LAYER_COUNT + 1,
            ..info
        };
        assert_eq!(
            unsafe { describe_frame(&fx.runtime, fx.session, &too_many) }
                .unwrap_err()
                .code(),
            sys::Result::ERROR_LAYER_LIMIT_EXCEEDED
        );
    }
}

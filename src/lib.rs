//! A minimal OpenXR runtime: one head mounted display with a primary stereo
//! view configuration, OpenGL swapchains and a compositor thread per session
//! that shows both eyes side by side in a window.
//!
//! The loader finds the runtime through [`loader::xrNegotiateLoaderRuntimeInterface`];
//! every other entry point is reached through `xrGetInstanceProcAddr`.

use std::sync::OnceLock;

use tracing::warn;

pub mod api;
pub mod compositor;
pub mod config;
pub mod error;
pub mod events;
pub mod graphics;
pub mod handles;
pub mod instance;
pub mod layer_builder;
pub mod loader;
pub mod logging;
pub mod next_chain;
pub mod path;
pub mod render;
pub mod session;
pub mod space;
pub mod swapchain;
pub mod timing;
pub mod types;

pub use config::{PresenterPolicy, RuntimeConfig, SwapchainWaitPolicy};
pub use error::XrError;
pub use handles::Registry;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Settings plus every live object of the process.
pub struct Runtime {
    config: RuntimeConfig,
    registry: Registry,
}

impl Runtime {
    /// A runtime that is not reachable through the entry points. Used by tests
    /// that drive the object model directly.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            registry: Registry::default(),
        }
    }

    /// Installs the process-wide runtime. If one is already installed it is
    /// kept and `config` is ignored.
    pub fn install(config: RuntimeConfig) -> &'static Runtime {
        let mut installed = false;
        let runtime = RUNTIME.get_or_init(|| {
            installed = true;
            Runtime::new(config)
        });
        logging::init(&runtime.config);
        if !installed {
            warn!("runtime already installed, keeping its configuration");
        }
        runtime
    }

    /// The process-wide runtime, installed with the default configuration on
    /// first use.
    pub fn get() -> &'static Runtime {
        if let Some(runtime) = RUNTIME.get() {
            return runtime;
        }
        Self::install(RuntimeConfig::default())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

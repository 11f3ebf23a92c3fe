//! Diagnostics output. Runtime code logs through `tracing`; this module only
//! decides where those events go.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;

/// Target of the one-line-per-call trace emitted by the entry points.
pub const API_TARGET: &str = "openxr_sample_runtime::api";

static INIT: Once = Once::new();

/// Installs a stdout subscriber filtered by `config.log_filter`. Only the
/// first call has any effect, and a subscriber the host application already
/// installed is left in place.
pub fn init(config: &RuntimeConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(config.log_filter.as_ref())
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("keeping the host's global tracing subscriber");
        }
    });
}

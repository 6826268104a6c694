//! Tracing setup. The filter sits behind a reload layer so `logging.level`
//! can change while the process runs.

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing(config: &LoggingConfig) {
    init_tracing_with_level(&config.level);
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init();
}

/// Swaps the active filter for `level`. Returns false when tracing was not
/// initialized here or the swap failed.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    match handle.modify(|filter| *filter = EnvFilter::new(level)) {
        Ok(()) => {
            tracing::info!(level, "log level changed");
            true
        }
        Err(e) => {
            tracing::warn!(level, error = %e, "failed to change log level");
            false
        }
    }
}

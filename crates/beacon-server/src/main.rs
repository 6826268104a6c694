use std::{env, sync::Arc, time::Duration};

use beacon_db_memory::InMemoryStorage;
use beacon_server::config::loader::load_config;
use beacon_server::{build_services, observability};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    CliArgument,
    EnvironmentVariable,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (BEACON_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing_with_level("info");

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    // Single-node mode: policies and clients live in process memory.
    let storage = Arc::new(InMemoryStorage::new());
    let state = match build_services(cfg, storage).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Service initialization failed: {e}");
            std::process::exit(2);
        }
    };

    let report = state.cache.status_report().await;
    tracing::info!(mode = %report.mode, status = %report.status, "policy cache status");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
    state.shutdown(SHUTDOWN_TIMEOUT).await;
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: BEACON_CONFIG
/// 3. Default: beacon.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("BEACON_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    ("beacon.toml".to_string(), ConfigSource::Default)
}

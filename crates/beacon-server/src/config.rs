use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Policy cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Cache invalidation and pre-warm worker configuration
    #[serde(default)]
    pub invalidation: InvalidationConfig,
    /// Offline detection configuration
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Bootstrap configuration (default policy)
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Redis validations
        if self.redis.enabled {
            if self.redis.url.trim().is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validations
        if self.cache.policy_ttl_secs == 0 {
            return Err("cache.policy_ttl_secs must be > 0".into());
        }
        if self.cache.availability_check_interval_secs == 0 {
            return Err("cache.availability_check_interval_secs must be > 0".into());
        }
        if self.cache.local_sweep_interval_secs == 0 {
            return Err("cache.local_sweep_interval_secs must be > 0".into());
        }
        // Worker pool validations
        if self.heartbeat.liveness_workers == Some(0) {
            return Err("heartbeat.liveness_workers must be > 0".into());
        }
        if self.heartbeat.liveness_queue_capacity == 0 {
            return Err("heartbeat.liveness_queue_capacity must be > 0".into());
        }
        if self.invalidation.workers == 0 {
            return Err("invalidation.workers must be > 0".into());
        }
        if self.invalidation.queue_capacity == 0 {
            return Err("invalidation.queue_capacity must be > 0".into());
        }
        // Liveness validations
        if self.liveness.offline_after_secs == 0 || self.liveness.check_interval_secs == 0 {
            return Err("liveness intervals must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Bootstrap validation
        if let Some(ref policy) = self.bootstrap.default_policy
            && policy.name.trim().is_empty()
        {
            return Err("bootstrap.default_policy.name must not be empty".into());
        }
        Ok(())
    }

    pub fn policy_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.policy_ttl_secs)
    }
    pub fn availability_check_interval(&self) -> Duration {
        Duration::from_secs(self.cache.availability_check_interval_secs)
    }
    pub fn local_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.local_sweep_interval_secs)
    }
    pub fn rewarm_delay(&self) -> Duration {
        Duration::from_millis(self.invalidation.rewarm_delay_ms)
    }
    pub fn slow_liveness_threshold(&self) -> Duration {
        Duration::from_millis(self.heartbeat.slow_update_warn_ms)
    }
    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.liveness.offline_after_secs)
    }
    pub fn offline_check_interval(&self) -> Duration {
        Duration::from_secs(self.liveness.check_interval_secs)
    }
}

/// Redis configuration for the shared policy cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (local cache only)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Policy cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL of cached policies and hashes in seconds
    #[serde(default = "default_policy_ttl_secs")]
    pub policy_ttl_secs: u64,

    /// Minimum seconds between two Redis reachability probes
    #[serde(default = "default_availability_check_interval_secs")]
    pub availability_check_interval_secs: u64,

    /// Period of the local cache expiry sweep in seconds
    #[serde(default = "default_local_sweep_interval_secs")]
    pub local_sweep_interval_secs: u64,
}

fn default_policy_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_availability_check_interval_secs() -> u64 {
    30
}

fn default_local_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy_ttl_secs: default_policy_ttl_secs(),
            availability_check_interval_secs: default_availability_check_interval_secs(),
            local_sweep_interval_secs: default_local_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Liveness worker count; half the CPUs (at least 2) when unset
    #[serde(default)]
    pub liveness_workers: Option<usize>,

    /// Queued liveness updates before new ones are dropped
    #[serde(default = "default_liveness_queue_capacity")]
    pub liveness_queue_capacity: usize,

    /// Liveness writes slower than this are logged as warnings
    #[serde(default = "default_slow_update_warn_ms")]
    pub slow_update_warn_ms: u64,
}

fn default_liveness_queue_capacity() -> usize {
    10_000
}

fn default_slow_update_warn_ms() -> u64 {
    1000
}

impl HeartbeatConfig {
    pub fn worker_count(&self) -> usize {
        self.liveness_workers
            .unwrap_or_else(crate::tasks::default_worker_count)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            liveness_workers: None,
            liveness_queue_capacity: default_liveness_queue_capacity(),
            slow_update_warn_ms: default_slow_update_warn_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationConfig {
    #[serde(default = "default_invalidation_workers")]
    pub workers: usize,

    #[serde(default = "default_invalidation_queue_capacity")]
    pub queue_capacity: usize,

    /// Pause between two client re-warms of one batch, in milliseconds
    #[serde(default = "default_rewarm_delay_ms")]
    pub rewarm_delay_ms: u64,
}

fn default_invalidation_workers() -> usize {
    2
}

fn default_invalidation_queue_capacity() -> usize {
    1024
}

fn default_rewarm_delay_ms() -> u64 {
    10
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            workers: default_invalidation_workers(),
            queue_capacity: default_invalidation_queue_capacity(),
            rewarm_delay_ms: default_rewarm_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Clients silent for longer than this are marked offline
    #[serde(default = "default_offline_after_secs")]
    pub offline_after_secs: u64,

    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_offline_after_secs() -> u64 {
    300 // 5 minutes
}

fn default_check_interval_secs() -> u64 {
    120
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            offline_after_secs: default_offline_after_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Bootstrap configuration for initial server setup
///
/// The default policy can also be set via environment variables:
/// - BEACON__BOOTSTRAP__DEFAULT_POLICY__NAME
/// - BEACON__BOOTSTRAP__DEFAULT_POLICY__DESCRIPTION
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Created on startup when no default policy exists yet
    #[serde(default)]
    pub default_policy: Option<DefaultPolicyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultPolicyConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Builds the config from `path` (or `beacon.toml`) plus `BEACON__*`
    /// variables. Loading `.env` is left to the binary.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("beacon.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., BEACON__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("BEACON")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy_ttl(), Duration::from_secs(1800));
        assert_eq!(config.availability_check_interval(), Duration::from_secs(30));
        assert_eq!(config.local_sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.offline_after(), Duration::from_secs(300));
        assert_eq!(config.offline_check_interval(), Duration::from_secs(120));
        assert_eq!(config.rewarm_delay(), Duration::from_millis(10));
        assert_eq!(config.slow_liveness_threshold(), Duration::from_millis(1000));
        assert!(!config.redis.enabled);
    }

    #[test]
    fn test_liveness_workers_default_to_half_cpus() {
        let config = HeartbeatConfig::default();
        assert!(config.worker_count() >= 2);

        let pinned = HeartbeatConfig {
            liveness_workers: Some(3),
            ..HeartbeatConfig::default()
        };
        assert_eq!(pinned.worker_count(), 3);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.cache.policy_ttl_secs = 0;
        assert!(config.validate().unwrap_err().contains("policy_ttl_secs"));

        let mut config = AppConfig::default();
        config.heartbeat.liveness_workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.invalidation.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.redis.enabled = true;
        config.redis.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".into();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_default_policy_name() {
        let mut config = AppConfig::default();
        config.bootstrap.default_policy = Some(DefaultPolicyConfig {
            name: "  ".into(),
            description: None,
        });
        assert!(config.validate().is_err());
    }
}

use std::{env, fs, time::Duration};

use beacon_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("beacon.toml");

    let toml_content = r#"
[redis]
enabled = true
url = "redis://cache.internal:6379"
pool_size = 4
timeout_ms = 500

[cache]
policy_ttl_secs = 900
availability_check_interval_secs = 15

[heartbeat]
liveness_workers = 3

[invalidation]
rewarm_delay_ms = 25

[logging]
level = "debug"

[bootstrap.default_policy]
name = "baseline"
description = "fallback for unassigned clients"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses; unset sections keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert!(cfg.redis.enabled);
    assert_eq!(cfg.redis.url, "redis://cache.internal:6379");
    assert_eq!(cfg.redis.pool_size, 4);
    assert_eq!(cfg.policy_ttl(), Duration::from_secs(900));
    assert_eq!(cfg.availability_check_interval(), Duration::from_secs(15));
    assert_eq!(cfg.local_sweep_interval(), Duration::from_secs(60));
    assert_eq!(cfg.heartbeat.worker_count(), 3);
    assert_eq!(cfg.rewarm_delay(), Duration::from_millis(25));
    assert_eq!(cfg.offline_after(), Duration::from_secs(300));
    assert_eq!(cfg.logging.level, "debug");
    let default_policy = cfg.bootstrap.default_policy.expect("default policy section");
    assert_eq!(default_policy.name, "baseline");

    // 2) Env override should win over file
    unsafe {
        env::set_var("BEACON__CACHE__POLICY_TTL_SECS", "600");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.policy_ttl(), Duration::from_secs(600));
    unsafe {
        env::remove_var("BEACON__CACHE__POLICY_TTL_SECS");
    }

    // 3) Invalid config (zero pool with redis enabled) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[redis]
enabled = true
url = "redis://localhost:6379"
pool_size = 0
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("redis.pool_size must be > 0"));

    // 4) Unknown log level is rejected
    let bad_level = dir.path().join("bad_level.toml");
    fs::write(&bad_level, "[logging]\nlevel = \"verbose\"\n").expect("write toml");
    let err = load_config(bad_level.to_str()).expect_err("expected log level error");
    assert!(err.contains("logging.level"));

    // 5) A missing file falls back to defaults
    let missing = dir.path().join("absent.toml");
    let cfg_default = load_config(missing.to_str()).expect("defaults should load");
    assert!(!cfg_default.redis.enabled);
    assert_eq!(cfg_default.policy_ttl(), Duration::from_secs(1800));
    assert!(cfg_default.bootstrap.default_policy.is_none());

    // 6) The loader leaves .env to the binary
    fs::write(dir.path().join(".env"), "BEACON__CACHE__POLICY_TTL_SECS=42\n").expect("write .env");
    let original_cwd = env::current_dir().expect("cwd");
    env::set_current_dir(dir.path()).expect("enter tmp dir");
    let cfg_dotenv = load_config(path.to_str());
    env::set_current_dir(original_cwd).expect("restore cwd");
    let cfg_dotenv = cfg_dotenv.expect("should parse config next to .env");
    assert_eq!(cfg_dotenv.policy_ttl(), Duration::from_secs(900));
    assert!(env::var("BEACON__CACHE__POLICY_TTL_SECS").is_err());
}

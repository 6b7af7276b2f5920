use casework_core::config::{ConfigLoader, ConfigurationError, WorkerConfig};
use casework_core::retry::RetryPolicy;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_directory_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::load_from_directory_with_env(dir.path(), "test").unwrap();
    assert_eq!(config, WorkerConfig::default());
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.consistency.gap(), Duration::from_secs(6));
}

#[test]
fn test_environment_file_overrides_base_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("casework.toml"),
        r#"
[worker]
worker_id = "casework-worker-1"
max_tasks = 4

[retry]
max_attempts = 5
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("casework.staging.toml"),
        r#"
[retry]
base_delay_ms = 250
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_directory_with_env(dir.path(), "staging").unwrap();

    assert_eq!(config.worker.worker_id, "casework-worker-1");
    assert_eq!(config.worker.max_tasks, 4);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, 250);

    let policy = RetryPolicy::from_config(&config.retry);
    assert_eq!(policy.backoff_delay(4), Duration::from_millis(500));
}

#[test]
fn test_zero_attempts_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("worker.yaml");
    fs::write(&path, "consistency:\n  max_attempts: 0\n").unwrap();

    let err = ConfigLoader::load_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::InvalidValue { ref field, .. } if field == "consistency.max_attempts"
    ));
}

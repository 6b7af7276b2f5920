//! Configuration Loader
//!
//! Environment-aware loading: defaults, then `config/casework` and
//! `config/casework.<environment>` files (any format the `config` crate knows),
//! then `CASEWORK__SECTION__FIELD` environment variables.

use super::error::ConfigResult;
use super::WorkerConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<WorkerConfig> {
        Self::load_from_directory_with_env(
            &PathBuf::from("config"),
            &crate::logging::get_environment(),
        )
    }

    /// Load configuration from a directory with an explicit environment name.
    /// Missing files are skipped; defaults always apply.
    pub fn load_from_directory_with_env(
        config_dir: &Path,
        environment: &str,
    ) -> ConfigResult<WorkerConfig> {
        debug!(
            environment = %environment,
            config_dir = %config_dir.display(),
            "Loading worker configuration"
        );

        let defaults = Config::try_from(&WorkerConfig::default())?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(config_dir.join("casework")).required(false))
            .add_source(
                File::from(config_dir.join(format!("casework.{environment}"))).required(false),
            )
            .add_source(Environment::with_prefix("CASEWORK").separator("__"))
            .build()?;

        let config: WorkerConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!(
            worker_id = %config.worker.worker_id,
            max_attempts = config.retry.max_attempts,
            base_delay_ms = config.retry.base_delay_ms,
            "Worker configuration loaded"
        );

        Ok(config)
    }

    /// Load a single explicit file over the defaults, ignoring the environment
    pub fn load_from_file(path: &Path) -> ConfigResult<WorkerConfig> {
        let defaults = Config::try_from(&WorkerConfig::default())?;
        let config: WorkerConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

//! Configuration System using Figment
//!
//! Strongly-typed configuration loading. Sources, later ones winning:
//! 1. Built-in defaults ([`LabConfig::default`])
//! 2. A TOML file (`config/qlab.toml` unless another path is given)
//! 3. Environment variables prefixed with `QLAB_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use qlab::config::LabConfig;
//!
//! let config = LabConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), qlab::error::LabError>(())
//! ```

use crate::error::{AppResult, LabError};
use crate::hardware::SimulationParams;
use crate::procedures::SsbCalibrationConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/qlab.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LabConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Where results are written
    #[serde(default)]
    pub storage: StorageConfig,
    /// SSB calibration parameters
    #[serde(default)]
    pub calibration: SsbCalibrationConfig,
    /// Simulated bench used when no hardware is attached
    #[serde(default)]
    pub simulation: SimulationParams,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only calibration results log
    #[serde(default = "default_calibration_log")]
    pub calibration_log: PathBuf,
}

// Default value functions
fn default_name() -> String {
    "qlab".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_calibration_log() -> PathBuf {
    PathBuf::from("data/ssb_calibrations.tsv")
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            calibration_log: default_calibration_log(),
        }
    }
}

impl LabConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    /// Environment variables override the file, e.g. `QLAB_APPLICATION__LOG_LEVEL=debug`
    /// or `QLAB_CALIBRATION__SIDEBAND=left`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(LabConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("QLAB_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(LabError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.storage.calibration_log.as_os_str().is_empty() {
            return Err(LabError::Configuration(
                "storage.calibration_log must not be empty".into(),
            ));
        }

        self.calibration.validate()?;

        let sim = &self.simulation;
        if !(sim.gain_imbalance.is_finite() && sim.gain_imbalance > 0.0) {
            return Err(LabError::Configuration(format!(
                "simulation.gain_imbalance must be positive, got {}",
                sim.gain_imbalance
            )));
        }
        if sim.jitter_db < 0.0 {
            return Err(LabError::Configuration(format!(
                "simulation.jitter_db must not be negative, got {}",
                sim.jitter_db
            )));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| LabError::Configuration(e.to_string()))
    }
}

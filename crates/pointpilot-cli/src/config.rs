//! Configuration file loading.
//!
//! Priority for the config file:
//! 1. `--config <FILE>` (must exist)
//! 2. `POINTPILOT_CONFIG` (must exist, ignores empty string)
//! 3. `<config dir>/pointpilot/config.toml` (defaults if missing)
//!
//! The serial port is resolved separately: `--port`, then `POINTPILOT_PORT`,
//! then `[device] port` from the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use pointpilot_core::settings::Settings;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    /// `[link]`, `[locate]`, `[controller]` and `[actions]` tables.
    #[serde(flatten)]
    pub settings: Settings,
}

/// Serial connection to the actuator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud() -> u32 {
    115200
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
        }
    }
}

/// Program that prints the cursor position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_command")]
    pub command: Vec<String>,
    /// Seconds one run may take before it is killed.
    #[serde(default = "default_sensor_timeout")]
    pub timeout: f64,
}

fn default_sensor_timeout() -> f64 {
    2.0
}

fn default_sensor_command() -> Vec<String> {
    ["xdotool", "getmouselocation", "--shell"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            command: default_sensor_command(),
            timeout: default_sensor_timeout(),
        }
    }
}

impl SensorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

/// Program that finds a template on screen. There is no default command.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub command: Vec<String>,
    /// Seconds one run may take. Runs are also cut off when the search
    /// budget (`locate.locate_timeout`) runs out.
    #[serde(default = "default_matcher_timeout")]
    pub timeout: f64,
}

fn default_matcher_timeout() -> f64 {
    10.0
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout: default_matcher_timeout(),
        }
    }
}

impl MatcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pointpilot").join("config.toml"))
}

/// Pick the config file to read and whether it must exist.
fn config_source(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Ok(path) = env::var("POINTPILOT_CONFIG") {
        if !path.is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }
    default_config_path().map(|path| (path, false))
}

impl Config {
    /// Load and validate the config file, falling back to defaults when the
    /// default location has no file.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let Some((path, required)) = config_source(explicit) else {
            debug!("No config directory, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            if required {
                bail!("Config file {} does not exist", path.display());
            }
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.settings.validate()?;
        for (name, value) in [
            ("sensor.timeout", config.sensor.timeout),
            ("matcher.timeout", config.matcher.timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{} must be a positive number of seconds, got {}", name, value);
            }
        }
        Ok(config)
    }

    /// Apply command-line and environment overrides for the device.
    pub fn with_overrides(mut self, port: Option<String>, baud: Option<u32>) -> Self {
        if let Some(port) = resolve_port(port) {
            self.device.port = port;
        }
        if let Some(baud) = baud {
            self.device.baud = baud;
        }
        self
    }
}

/// `--port`, else `POINTPILOT_PORT` (ignores empty string).
fn resolve_port(cli: Option<String>) -> Option<String> {
    cli.or_else(|| env::var("POINTPILOT_PORT").ok().filter(|p| !p.is_empty()))
}

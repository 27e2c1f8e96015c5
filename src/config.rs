//! Configuration management for Amphora
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The controller re-reads the file at the top
//! of every tick (best-effort) so edits take effect without a restart.

use crate::controls::PluginAutoMode;
use crate::error::{AmphoraError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Nominal mains voltage used for all watt/amp conversions
pub const VOLTAGE: f64 = 230.0;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor and actuator handle identifiers
    pub sensors: SensorsConfig,

    /// Charger electrical parameters and control behavior
    pub charger: ChargerConfig,

    /// Tariff block power ceilings
    pub tariff: TariffConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Control tick period in seconds
    pub tick_interval_secs: u64,

    /// Timezone for schedule window evaluation (IANA name)
    pub timezone: String,

    /// Path of the persisted lifetime counter state
    pub persistence_file: String,
}

/// Handle identifiers for every sensor and actuator the controller touches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Grid import/export power in watts (positive = importing)
    pub grid_power: String,

    /// Solar production power in watts
    pub solar_power: String,

    /// Current tariff block (1..=5)
    pub tariff: String,

    /// Charger on/off switch actuator
    pub charger_switch: String,

    /// Charger current setpoint actuator, also readable
    pub charger_current: String,

    /// Charger measured power in watts
    pub charger_power: String,

    /// Charger cable/vehicle status string
    pub charger_status: String,

    /// Optional EV state-of-charge sensor in percent
    pub ev_soc: Option<String>,
}

/// Charger electrical parameters and control behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// Number of charging phases (1 or 3)
    pub phases: u8,

    /// Main fuse rating in amperes
    pub max_fuse_amps: i32,

    /// Safety margin in watts around the base power limit
    pub buffer_watts: f64,

    /// Minimum seconds between non-emergency setpoint changes (5..=300)
    pub control_interval_secs: u64,

    /// Mode to switch to when a cable is plugged in
    pub auto_mode_on_plugin: PluginAutoMode,

    /// Force mode Off when the cable is unplugged
    pub reset_on_unplug: bool,
}

/// Per-tariff-block power ceilings in watts, indexed by block 1..=5
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    pub block_limits: [f64; 5],
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or log directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,

    /// Optional console-specific level override
    pub console_level: Option<String>,

    /// Optional file-specific level override
    pub file_level: Option<String>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            grid_power: "sensor.grid_power".to_string(),
            solar_power: "sensor.solar_power".to_string(),
            tariff: "sensor.tariff_block".to_string(),
            charger_switch: "switch.charger".to_string(),
            charger_current: "number.charger_current".to_string(),
            charger_power: "sensor.charger_power".to_string(),
            charger_status: "sensor.charger_status".to_string(),
            ev_soc: None,
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            phases: 3,
            max_fuse_amps: 25,
            buffer_watts: 500.0,
            control_interval_secs: 30,
            auto_mode_on_plugin: PluginAutoMode::NoChange,
            reset_on_unplug: false,
        }
    }
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            block_limits: [6000.0; 5],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/amphora.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
            console_level: None,
            file_level: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensors: SensorsConfig::default(),
            charger: ChargerConfig::default(),
            tariff: TariffConfig::default(),
            logging: LoggingConfig::default(),
            tick_interval_secs: 5,
            timezone: "UTC".to_string(),
            persistence_file: "/data/amphora_state.json".to_string(),
        }
    }
}

impl ChargerConfig {
    /// Watts drawn per ampere of setpoint across all phases
    pub fn power_per_amp(&self) -> f64 {
        VOLTAGE * f64::from(self.phases)
    }
}

impl TariffConfig {
    /// Block limit in watts for a tariff block, clamped into 1..=5
    pub fn block_limit(&self, tariff: u8) -> f64 {
        let idx = tariff.clamp(1, 5) as usize - 1;
        self.block_limits[idx]
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "amphora_config.yaml",
            "/data/amphora_config.yaml",
            "/etc/amphora/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Timezone used for schedule window evaluation, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        chrono_tz::Tz::from_str(&self.timezone).unwrap_or(chrono_tz::Tz::UTC)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sensors.grid_power.is_empty() {
            return Err(AmphoraError::validation(
                "sensors.grid_power",
                "Grid power handle cannot be empty",
            ));
        }

        if self.sensors.charger_switch.is_empty() || self.sensors.charger_current.is_empty() {
            return Err(AmphoraError::validation(
                "sensors",
                "Charger switch and current handles cannot be empty",
            ));
        }

        if self.charger.phases != 1 && self.charger.phases != 3 {
            return Err(AmphoraError::validation(
                "charger.phases",
                "Phase count must be 1 or 3",
            ));
        }

        if self.charger.max_fuse_amps <= 0 {
            return Err(AmphoraError::validation(
                "charger.max_fuse_amps",
                "Fuse rating must be positive",
            ));
        }

        if self.charger.buffer_watts < 0.0 {
            return Err(AmphoraError::validation(
                "charger.buffer_watts",
                "Buffer must not be negative",
            ));
        }

        if !(5..=300).contains(&self.charger.control_interval_secs) {
            return Err(AmphoraError::validation(
                "charger.control_interval_secs",
                "Control interval must be within 5..=300 seconds",
            ));
        }

        if self.tariff.block_limits.iter().any(|w| *w <= 0.0) {
            return Err(AmphoraError::validation(
                "tariff.block_limits",
                "Block limits must be positive",
            ));
        }

        if self.tick_interval_secs == 0 {
            return Err(AmphoraError::validation(
                "tick_interval_secs",
                "Must be greater than 0",
            ));
        }

        if chrono_tz::Tz::from_str(&self.timezone).is_err() {
            return Err(AmphoraError::validation(
                "timezone",
                "Unknown timezone name",
            ));
        }

        Ok(())
    }
}

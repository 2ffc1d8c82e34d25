use crate::sensors::ina219::MeasurementProfile;
use crate::sensors::{SENSOR_COUNT, SensorDescriptor};
use crate::utils;

use thiserror::Error;
use tracing::{debug, info};

pub const POLL_INTERVAL_MS_DEFAULT: u64 = 500;
pub const I2C_DEVICE_DEFAULT: &str = "/dev/i2c-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusDriver {
    /// `/dev/i2c-*` through linux-embedded-hal
    Linux,
    /// In-memory INA219s, for running without hardware
    Mock,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ApiConfig {
    pub listen_address: String,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct BusConfig {
    pub driver: BusDriver,
    pub device: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

impl BusConfig {
    pub fn device_path(&self) -> &str {
        self.device.as_deref().unwrap_or(I2C_DEVICE_DEFAULT)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.unwrap_or(POLL_INTERVAL_MS_DEFAULT)
    }
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub bus: BusConfig,
    pub sensors: [SensorDescriptor; SENSOR_COUNT],
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.poll_interval_ms() == 0 {
            return Err(ConfigError::Invalid(
                "bus.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        let profile = MeasurementProfile::default();
        for (index, sensor) in self.sensors.iter().enumerate() {
            if sensor.address > 0x7F {
                return Err(ConfigError::Invalid(format!(
                    "sensors[{}]: address {:#04X} is not a 7-bit I2C address",
                    index, sensor.address
                )));
            }
            profile
                .calibrate(sensor.shunt_resistance_ohms)
                .map_err(|e| ConfigError::Invalid(format!("sensors[{}]: {}", index, e)))?;
        }
        Ok(())
    }
}

pub fn load_app_config_from_str(config_str: &str) -> Result<AppConfig, ConfigError> {
    let app_config: AppConfig = serde_yaml::from_str(config_str)?;
    app_config.validate()?;
    Ok(app_config)
}

pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let app_config_path = utils::filesystem::get_config_path();
    info!("Loading config from {}", app_config_path);

    let config_str = std::fs::read_to_string(&app_config_path).map_err(|e| ConfigError::Io {
        path: app_config_path.clone(),
        source: e,
    })?;

    let app_config = load_app_config_from_str(&config_str)?;

    // Log the config struct as json
    debug!(
        "Parsed app config: {}",
        serde_json::to_string(&app_config).unwrap_or_default()
    );
    Ok(app_config)
}

use serde::{Deserialize, Serialize};

pub mod current_sensors;
pub mod ina219;
pub mod sensor_mock;
pub mod transport;

/// Number of INA219 slots the service is built for.
pub const SENSOR_COUNT: usize = 4;

/// Where a sensor sits on the bus and what it measures across. Owned by the config,
/// never modified by the sensor code.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// 7-bit I2C address, set by the A0/A1 straps
    pub address: u8,

    /// Real value of the shunt resistor
    pub shunt_resistance_ohms: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorState {
    #[default]
    Uninitialized,
    ProbeFailed,
    Initialized,
}

/// Point-in-time view of one sensor slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub index: usize,
    pub address: Option<u8>,
    pub shunt_resistance_ohms: Option<f32>,
    pub state: SensorState,
    /// Calibration register value last written to the chip
    pub calibration_value: Option<u16>,
    /// `None` until the first successful read
    pub current_amps: Option<f32>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

/// What the power monitor publishes after every poll pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub sensors: Vec<SensorStatus>,
    pub polled_at: Option<String>,
}

impl SensorSnapshot {
    /// Same contract as `CurrentSensors::get_current`: NaN for an unknown index or a slot without data.
    pub fn current_amps(&self, index: usize) -> f32 {
        self.sensors
            .get(index)
            .and_then(|status| status.current_amps)
            .unwrap_or(f32::NAN)
    }

    pub fn online_count(&self) -> usize {
        self.sensors
            .iter()
            .filter(|status| status.state == SensorState::Initialized)
            .count()
    }
}

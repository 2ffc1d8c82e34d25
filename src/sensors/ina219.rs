//! INA219 register map, configuration bitfields and calibration math.
//!
//! Nothing in here talks to the bus. The transport moves the 16-bit words,
//! this module decides what the words mean.

use thiserror::Error;

/// Lowest 7-bit address an INA219 can be strapped to (A1 = A0 = GND).
pub const ADDRESS_MIN: u8 = 0x40;
/// Highest 7-bit address an INA219 can be strapped to (A1 = A0 = SCL).
pub const ADDRESS_MAX: u8 = 0x4F;

/// Writing this to the configuration register resets every register to its power-on value.
pub const CONFIG_RESET: u16 = 0x8000;
pub const CONFIG_MODE_MASK: u16 = 0x0007;

/// Fixed scale from the datasheet calibration equation: Cal = trunc(0.04096 / (Current_LSB * R_shunt)).
const CALIBRATION_SCALE: f64 = 0.04096;

pub fn is_valid_address(address: u8) -> bool {
    (ADDRESS_MIN..=ADDRESS_MAX).contains(&address)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Config = 0x00,
    ShuntVoltage = 0x01,
    BusVoltage = 0x02,
    Power = 0x03,
    Current = 0x04,
    Calibration = 0x05,
}

impl Register {
    pub fn pointer(self) -> u8 {
        self as u8
    }

    pub fn from_pointer(pointer: u8) -> Option<Register> {
        match pointer {
            0x00 => Some(Register::Config),
            0x01 => Some(Register::ShuntVoltage),
            0x02 => Some(Register::BusVoltage),
            0x03 => Some(Register::Power),
            0x04 => Some(Register::Current),
            0x05 => Some(Register::Calibration),
            _ => None,
        }
    }
}

/// Bus voltage range, BRNG (bit 13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusVoltageRange {
    Range16V = 0,
    Range32V = 1,
}

/// PGA gain and shunt voltage range, PG (bits 12-11).
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuntGain {
    Div1_40mV = 0,
    Div2_80mV = 1,
    Div4_160mV = 2,
    Div8_320mV = 3,
}

/// ADC resolution or averaging, shared encoding for BADC (bits 10-7) and SADC (bits 6-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcResolution {
    Bits9 = 0x0,
    Bits10 = 0x1,
    Bits11 = 0x2,
    Bits12 = 0x3,
    Samples2 = 0x9,
    Samples4 = 0xA,
    Samples8 = 0xB,
    Samples16 = 0xC,
    Samples32 = 0xD,
    Samples64 = 0xE,
    Samples128 = 0xF,
}

/// Operating mode, MODE (bits 2-0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    PowerDown = 0,
    ShuntTriggered = 1,
    BusTriggered = 2,
    ShuntAndBusTriggered = 3,
    AdcOff = 4,
    ShuntContinuous = 5,
    BusContinuous = 6,
    ShuntAndBusContinuous = 7,
}

/// The four power modes the driver lets callers switch between at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    PowerDown,
    ShuntAndBusTriggered,
    ShuntAndBusContinuous,
    AdcOff,
}

impl PowerMode {
    pub fn operating_mode(self) -> OperatingMode {
        match self {
            PowerMode::PowerDown => OperatingMode::PowerDown,
            PowerMode::ShuntAndBusTriggered => OperatingMode::ShuntAndBusTriggered,
            PowerMode::ShuntAndBusContinuous => OperatingMode::ShuntAndBusContinuous,
            PowerMode::AdcOff => OperatingMode::AdcOff,
        }
    }

    /// Replaces the mode bits of an existing configuration word, leaving range, gain and ADC bits alone.
    pub fn apply(self, config: u16) -> u16 {
        (config & !CONFIG_MODE_MASK) | (self.operating_mode() as u16 & CONFIG_MODE_MASK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalibrationError {
    #[error("shunt resistance must be a positive finite number of ohms, got {0}")]
    InvalidShunt(f32),
    #[error("shunt of {shunt_ohms} ohms gives calibration value {value}, outside 1..=65535")]
    OutOfRange { shunt_ohms: f32, value: f64 },
}

/// Calibration register value and the current LSB it implies. Always produced together
/// by [`MeasurementProfile::calibrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub register_value: u16,
    pub current_lsb_amps: f32,
}

impl Calibration {
    /// Converts a raw current register count to amps.
    pub fn current_amps(&self, raw: i16) -> f32 {
        raw as f32 * self.current_lsb_amps
    }
}

/// One complete chip setup: everything that goes into the configuration word plus the
/// current LSB the calibration is computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementProfile {
    pub bus_voltage_range: BusVoltageRange,
    pub gain: ShuntGain,
    pub bus_adc: AdcResolution,
    pub shunt_adc: AdcResolution,
    pub mode: OperatingMode,
    pub current_lsb_amps: f32,
}

impl MeasurementProfile {
    /// 32 V bus, ±320 mV shunt range, 12-bit single samples, continuous, 100 uA per count.
    pub const RANGE_32V_2A: MeasurementProfile = MeasurementProfile {
        bus_voltage_range: BusVoltageRange::Range32V,
        gain: ShuntGain::Div8_320mV,
        bus_adc: AdcResolution::Bits12,
        shunt_adc: AdcResolution::Bits12,
        mode: OperatingMode::ShuntAndBusContinuous,
        current_lsb_amps: 1.0e-4,
    };

    pub fn config_word(&self) -> u16 {
        ((self.bus_voltage_range as u16) << 13)
            | ((self.gain as u16) << 11)
            | ((self.bus_adc as u16) << 7)
            | ((self.shunt_adc as u16) << 3)
            | (self.mode as u16)
    }

    /// K in `calibration = round(K / shunt_ohms)`.
    pub fn calibration_constant(&self) -> f64 {
        CALIBRATION_SCALE / self.current_lsb_amps as f64
    }

    pub fn calibrate(&self, shunt_resistance_ohms: f32) -> Result<Calibration, CalibrationError> {
        if !shunt_resistance_ohms.is_finite() || shunt_resistance_ohms <= 0.0 {
            return Err(CalibrationError::InvalidShunt(shunt_resistance_ohms));
        }

        let value = (self.calibration_constant() / shunt_resistance_ohms as f64).round();
        if !(1.0..=u16::MAX as f64).contains(&value) {
            return Err(CalibrationError::OutOfRange {
                shunt_ohms: shunt_resistance_ohms,
                value,
            });
        }

        Ok(Calibration {
            register_value: value as u16,
            current_lsb_amps: self.current_lsb_amps,
        })
    }
}

impl Default for MeasurementProfile {
    fn default() -> Self {
        MeasurementProfile::RANGE_32V_2A
    }
}

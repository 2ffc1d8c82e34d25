use embedded_hal::i2c::I2c;
use tracing::{debug, info, warn};

use crate::sensors::ina219::{Calibration, CalibrationError, MeasurementProfile, PowerMode};
use crate::sensors::transport::{RegisterTransport, TransportError};
use crate::sensors::{SensorDescriptor, SensorState, SensorStatus};

/// Anything that went wrong with one slot, kept around for the status API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("sensor {0} is not initialized")]
    NotInitialized(usize),
}

#[derive(Debug, Default)]
struct SensorInstance<'d> {
    descriptor: Option<&'d SensorDescriptor>,
    state: SensorState,
    current_amps: Option<f32>,
    calibration: Option<Calibration>,
    last_error: Option<SensorError>,
    consecutive_failures: u32,
}

impl SensorInstance<'_> {
    fn record_failure(&mut self, index: usize, error: SensorError) {
        let address = self.descriptor.map(|d| d.address).unwrap_or_default();
        warn!("Sensor {} ({:#04X}): {}", index, address, error);
        self.last_error = Some(error);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

/// A fixed array of INA219s sharing one bus.
///
/// The manager owns the bus, so every transaction it issues is serialized and happens in
/// slot order. Descriptors are borrowed for `'d` and must outlive the manager.
pub struct CurrentSensors<'d, I2C, const N: usize> {
    transport: RegisterTransport<I2C>,
    profile: MeasurementProfile,
    instances: [SensorInstance<'d>; N],
}

impl<'d, I2C: I2c, const N: usize> CurrentSensors<'d, I2C, N> {
    pub fn new(i2c: I2C) -> Self {
        CurrentSensors {
            transport: RegisterTransport::new(i2c),
            profile: MeasurementProfile::RANGE_32V_2A,
            instances: std::array::from_fn(|_| SensorInstance::default()),
        }
    }

    /// Hands the bus back, dropping all sensor state.
    pub fn release(self) -> I2C {
        self.transport.release()
    }

    /// Probes and configures every slot, replacing whatever state a previous call left behind.
    ///
    /// A slot whose probe is acknowledged is `Initialized` even if the reset, calibration or
    /// config write that follows fails. The remaining writes are still sent, and each failure
    /// is recorded in the slot's `last_error` and `consecutive_failures`.
    pub fn initialize(&mut self, descriptors: &'d [SensorDescriptor; N]) {
        info!("Initializing {} INA219 sensor slot(s)", N);

        for (index, descriptor) in descriptors.iter().enumerate() {
            let instance = &mut self.instances[index];
            *instance = SensorInstance {
                descriptor: Some(descriptor),
                state: SensorState::ProbeFailed,
                ..SensorInstance::default()
            };

            if !self.transport.probe(descriptor.address) {
                warn!(
                    "Sensor {} did not answer at {:#04X}, skipping",
                    index, descriptor.address
                );
                continue;
            }

            instance.state = SensorState::Initialized;
            if !configure(&mut self.transport, &self.profile, index, descriptor, instance) {
                continue;
            }

            info!(
                "Sensor {} initialized at {:#04X} (shunt {} ohms)",
                index, descriptor.address, descriptor.shunt_resistance_ohms
            );
        }

        info!("{} of {} sensor(s) online", self.online_count(), N);
    }

    /// Recalibrates and reads every initialized slot once, in slot order.
    ///
    /// A failed write or read keeps the last good value and is recorded against the slot.
    pub fn poll_all(&mut self) {
        for (index, instance) in self.instances.iter_mut().enumerate() {
            let Some(descriptor) = instance.descriptor else {
                continue;
            };
            if instance.state != SensorState::Initialized {
                continue;
            }

            match read_current(&mut self.transport, &self.profile, descriptor, instance) {
                Ok(amps) => {
                    debug!("Sensor {} ({:#04X}): {} A", index, descriptor.address, amps);
                    instance.current_amps = Some(amps);
                    instance.last_error = None;
                    instance.consecutive_failures = 0;
                }
                Err(e) => instance.record_failure(index, e),
            }
        }
    }

    /// Last current reading in amps. NaN for an index past the end or a slot with no data.
    pub fn get_current(&self, index: usize) -> f32 {
        self.instances
            .get(index)
            .and_then(|instance| instance.current_amps)
            .unwrap_or(f32::NAN)
    }

    pub fn state(&self, index: usize) -> Option<SensorState> {
        self.instances.get(index).map(|instance| instance.state)
    }

    pub fn descriptor(&self, index: usize) -> Option<&'d SensorDescriptor> {
        self.instances
            .get(index)
            .and_then(|instance| instance.descriptor)
    }

    pub fn online_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|instance| instance.state == SensorState::Initialized)
            .count()
    }

    pub fn status(&self, index: usize) -> Option<SensorStatus> {
        let instance = self.instances.get(index)?;
        Some(SensorStatus {
            index,
            address: instance.descriptor.map(|d| d.address),
            shunt_resistance_ohms: instance.descriptor.map(|d| d.shunt_resistance_ohms),
            state: instance.state,
            calibration_value: instance.calibration.map(|c| c.register_value),
            current_amps: instance.current_amps,
            last_error: instance.last_error.as_ref().map(|e| e.to_string()),
            consecutive_failures: instance.consecutive_failures,
        })
    }

    pub fn statuses(&self) -> Vec<SensorStatus> {
        (0..N).filter_map(|index| self.status(index)).collect()
    }

    /// Switches one initialized sensor between the chip's power modes.
    pub fn set_power_mode(&mut self, index: usize, mode: PowerMode) -> Result<(), SensorError> {
        let instance = self
            .instances
            .get(index)
            .filter(|instance| instance.state == SensorState::Initialized)
            .ok_or(SensorError::NotInitialized(index))?;
        let address = instance
            .descriptor
            .map(|d| d.address)
            .ok_or(SensorError::NotInitialized(index))?;

        info!("Sensor {} ({:#04X}): power mode {:?}", index, address, mode);
        self.transport.set_power_mode(address, mode)?;
        Ok(())
    }
}

/// Reset, calibration and configuration for a freshly probed sensor.
///
/// All three writes are attempted even when an earlier one fails; every failure is recorded
/// against the slot. Returns true when all of them went through.
fn configure<I2C: I2c>(
    transport: &mut RegisterTransport<I2C>,
    profile: &MeasurementProfile,
    index: usize,
    descriptor: &SensorDescriptor,
    instance: &mut SensorInstance<'_>,
) -> bool {
    let mut configured = true;

    if let Err(e) = transport.reset(descriptor.address) {
        instance.record_failure(index, e.into());
        configured = false;
    }
    if let Err(e) = apply_calibration(transport, profile, descriptor, instance) {
        instance.record_failure(index, e);
        configured = false;
    }
    // also brings the chip out of power-down if the reset was missed
    if let Err(e) = transport.write_config(descriptor.address, profile.config_word()) {
        instance.record_failure(index, e.into());
        configured = false;
    }

    configured
}

fn apply_calibration<I2C: I2c>(
    transport: &mut RegisterTransport<I2C>,
    profile: &MeasurementProfile,
    descriptor: &SensorDescriptor,
    instance: &mut SensorInstance<'_>,
) -> Result<Calibration, SensorError> {
    let calibration = profile.calibrate(descriptor.shunt_resistance_ohms)?;
    transport.write_calibration(descriptor.address, &calibration)?;
    instance.calibration = Some(calibration);
    Ok(calibration)
}

fn read_current<I2C: I2c>(
    transport: &mut RegisterTransport<I2C>,
    profile: &MeasurementProfile,
    descriptor: &SensorDescriptor,
    instance: &mut SensorInstance<'_>,
) -> Result<f32, SensorError> {
    // the chip loses its calibration on a brown-out, so it is rewritten before every read
    let calibration = apply_calibration(transport, profile, descriptor, instance)?;
    let raw = transport.read_current_raw(descriptor.address)?;
    Ok(calibration.current_amps(raw))
}

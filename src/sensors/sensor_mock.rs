use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use tracing::debug;

use crate::sensors::SensorDescriptor;
use crate::sensors::ina219::{self, Register};

/// Power-on value of the configuration register.
const CONFIG_DEFAULT: u16 = 0x399F;

#[derive(Debug, Clone)]
struct SimulatedIna219 {
    responsive: bool,
    pointer: u8,
    config: u16,
    calibration: u16,
    raw_current: i16,
}

impl SimulatedIna219 {
    fn new() -> Self {
        SimulatedIna219 {
            responsive: true,
            pointer: 0,
            config: CONFIG_DEFAULT,
            calibration: 0,
            raw_current: 0,
        }
    }

    fn register(&self, register: Register) -> u16 {
        match register {
            Register::Config => self.config,
            Register::Calibration => self.calibration,
            // the chip reports zero current and power until it has been calibrated
            Register::Current if self.calibration == 0 => 0,
            Register::Current => self.raw_current as u16,
            Register::ShuntVoltage | Register::BusVoltage | Register::Power => 0,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer;
        if let &[msb, lsb] = data {
            let value = u16::from_be_bytes([msb, lsb]);
            match Register::from_pointer(pointer) {
                Some(Register::Config) if value & ina219::CONFIG_RESET != 0 => {
                    self.config = CONFIG_DEFAULT;
                    self.calibration = 0;
                }
                Some(Register::Config) => self.config = value,
                Some(Register::Calibration) => self.calibration = value,
                // the remaining registers are read-only
                _ => {}
            }
        }
    }

    fn read(&self, buffer: &mut [u8]) {
        let value = Register::from_pointer(self.pointer)
            .map(|register| self.register(register))
            .unwrap_or_default();
        for (slot, byte) in buffer.iter_mut().zip(value.to_be_bytes()) {
            *slot = byte;
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    devices: BTreeMap<u8, SimulatedIna219>,
    transactions: usize,
}

/// An in-memory I2C bus populated with INA219s, for running the monitor without hardware.
///
/// Clones share the same devices, so a test can keep one handle and give the other to
/// the sensor manager.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        SimulatedBus::default()
    }

    /// Bus with a responsive INA219 at every given address.
    pub fn with_devices(addresses: &[u8]) -> Self {
        let bus = SimulatedBus::new();
        for &address in addresses {
            bus.add_device(address);
        }
        bus
    }

    /// Bus with a responsive INA219 behind every descriptor, all reporting the same raw count.
    pub fn for_descriptors(descriptors: &[SensorDescriptor], raw_current: i16) -> Self {
        let bus = SimulatedBus::new();
        for descriptor in descriptors {
            bus.add_device(descriptor.address);
            bus.set_raw_current(descriptor.address, raw_current);
        }
        bus
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_device(&self, address: u8) {
        self.lock().devices.insert(address, SimulatedIna219::new());
    }

    /// An unresponsive device stays on the bus but no longer acknowledges anything.
    pub fn set_responsive(&self, address: u8, responsive: bool) {
        if let Some(device) = self.lock().devices.get_mut(&address) {
            device.responsive = responsive;
        }
    }

    /// Sets the count the current register will report once the device is calibrated.
    pub fn set_raw_current(&self, address: u8, raw: i16) {
        if let Some(device) = self.lock().devices.get_mut(&address) {
            device.raw_current = raw;
        }
    }

    pub fn register(&self, address: u8, register: Register) -> Option<u16> {
        self.lock()
            .devices
            .get(&address)
            .map(|device| device.register(register))
    }

    /// Number of transactions addressed to the bus so far, acknowledged or not.
    pub fn transaction_count(&self) -> usize {
        self.lock().transactions
    }
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for SimulatedBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.transactions += 1;

        let device = match state.devices.get_mut(&address) {
            Some(device) if device.responsive => device,
            _ => {
                debug!("Simulated bus: no acknowledge from {:#04X}", address);
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
        };

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => device.write(bytes),
                Operation::Read(buffer) => device.read(buffer),
            }
        }
        Ok(())
    }
}

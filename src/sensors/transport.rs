use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use thiserror::Error;
use tracing::debug;

use crate::sensors::ina219::{self, Calibration, PowerMode, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("address {0:#04X} is outside the INA219 address window")]
    AddressOutOfRange(u8),
    #[error("device at {address:#04X} did not acknowledge ({kind})")]
    NotAcknowledged { address: u8, kind: ErrorKind },
    #[error("short register read from {address:#04X} ({kind})")]
    ShortRead { address: u8, kind: ErrorKind },
}

/// Single-shot INA219 register access over a shared I2C bus.
///
/// Every call is exactly one bus transaction attempt. Errors come back as values; nothing
/// here retries, sleeps or remembers anything between calls.
pub struct RegisterTransport<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> RegisterTransport<I2C> {
    pub fn new(i2c: I2C) -> Self {
        RegisterTransport { i2c }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Returns true if something in the INA219 address window acknowledges a zero-length write.
    /// Addresses outside the window are rejected without touching the bus.
    pub fn probe(&mut self, address: u8) -> bool {
        if !ina219::is_valid_address(address) {
            debug!("Not probing {:#04X}: {}", address, TransportError::AddressOutOfRange(address));
            return false;
        }

        match self.i2c.write(address, &[]) {
            Ok(()) => {
                debug!("Device at {:#04X} acknowledged probe", address);
                true
            }
            Err(e) => {
                debug!("No device at {:#04X}: {:?}", address, e.kind());
                false
            }
        }
    }

    /// Points the chip at `register`, then reads the two data bytes (MSB first).
    pub fn read_register(&mut self, address: u8, register: Register) -> Result<u16, TransportError> {
        self.i2c
            .write(address, &[register.pointer()])
            .map_err(|e| TransportError::NotAcknowledged {
                address,
                kind: e.kind(),
            })?;

        let mut bytes = [0u8; 2];
        self.i2c
            .read(address, &mut bytes)
            .map_err(|e| TransportError::ShortRead {
                address,
                kind: e.kind(),
            })?;

        let value = u16::from_be_bytes(bytes);
        debug!("Read {:?} from {:#04X}: {:#06X}", register, address, value);
        Ok(value)
    }

    pub fn write_register(
        &mut self,
        address: u8,
        register: Register,
        value: u16,
    ) -> Result<(), TransportError> {
        let [msb, lsb] = value.to_be_bytes();
        self.i2c
            .write(address, &[register.pointer(), msb, lsb])
            .map_err(|e| TransportError::NotAcknowledged {
                address,
                kind: e.kind(),
            })?;

        debug!("Wrote {:#06X} to {:?} on {:#04X}", value, register, address);
        Ok(())
    }

    pub fn reset(&mut self, address: u8) -> Result<(), TransportError> {
        self.write_register(address, Register::Config, ina219::CONFIG_RESET)
    }

    pub fn write_calibration(
        &mut self,
        address: u8,
        calibration: &Calibration,
    ) -> Result<(), TransportError> {
        self.write_register(address, Register::Calibration, calibration.register_value)
    }

    pub fn read_config(&mut self, address: u8) -> Result<u16, TransportError> {
        self.read_register(address, Register::Config)
    }

    pub fn write_config(&mut self, address: u8, config: u16) -> Result<(), TransportError> {
        self.write_register(address, Register::Config, config)
    }

    /// Read-modify-write of the mode bits. Two transactions; the write is skipped if the read fails.
    pub fn set_power_mode(&mut self, address: u8, mode: PowerMode) -> Result<(), TransportError> {
        let config = self.read_config(address)?;
        self.write_config(address, mode.apply(config))
    }

    /// Raw signed count from the current register. Meaningless until calibration has been written.
    pub fn read_current_raw(&mut self, address: u8) -> Result<i16, TransportError> {
        self.read_register(address, Register::Current)
            .map(|value| value as i16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::NoAcknowledgeSource;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn nack() -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }

    #[test]
    fn test_read_register_is_big_endian() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x04]),
            I2cTransaction::read(0x40, vec![0xAB, 0xCD]),
        ];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(transport.read_register(0x40, Register::Current), Ok(0xABCD));

        transport.release().done();
    }

    #[test]
    fn test_read_register_pointer_nack() {
        let expectations = [I2cTransaction::write(0x41, vec![0x00]).with_error(nack())];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(
            transport.read_register(0x41, Register::Config),
            Err(TransportError::NotAcknowledged {
                address: 0x41,
                kind: nack()
            })
        );

        transport.release().done();
    }

    #[test]
    fn test_read_register_short_read() {
        let expectations = [
            I2cTransaction::write(0x41, vec![0x04]),
            I2cTransaction::read(0x41, vec![0x00, 0x00]).with_error(ErrorKind::Other),
        ];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(
            transport.read_register(0x41, Register::Current),
            Err(TransportError::ShortRead {
                address: 0x41,
                kind: ErrorKind::Other
            })
        );

        transport.release().done();
    }

    #[test]
    fn test_write_register_sends_msb_first() {
        let expectations = [I2cTransaction::write(0x4A, vec![0x05, 0x10, 0x00])];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(transport.write_register(0x4A, Register::Calibration, 4096), Ok(()));

        transport.release().done();
    }

    #[test]
    fn test_write_register_nack() {
        let expectations = [I2cTransaction::write(0x4A, vec![0x00, 0x80, 0x00]).with_error(nack())];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert!(transport.reset(0x4A).is_err());

        transport.release().done();
    }

    #[test]
    fn test_probe() {
        let expectations = [
            I2cTransaction::write(0x40, vec![]),
            I2cTransaction::write(0x44, vec![]).with_error(nack()),
        ];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert!(transport.probe(0x40));
        assert!(!transport.probe(0x44));

        transport.release().done();
    }

    #[test]
    fn test_probe_outside_window_skips_bus() {
        // no expectations: any bus access would fail the mock
        let expectations: [I2cTransaction; 0] = [];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        for address in (0x00..ina219::ADDRESS_MIN).chain(ina219::ADDRESS_MAX + 1..=0x7F) {
            assert!(!transport.probe(address), "probe({:#04X}) should fail", address);
        }

        transport.release().done();
    }

    #[test]
    fn test_set_power_mode_read_modify_write() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x00]),
            I2cTransaction::read(0x40, vec![0x39, 0x9F]),
            I2cTransaction::write(0x40, vec![0x00, 0x39, 0x98]),
        ];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(transport.set_power_mode(0x40, PowerMode::PowerDown), Ok(()));

        transport.release().done();
    }

    #[test]
    fn test_read_current_raw_is_signed() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x04]),
            I2cTransaction::read(0x40, vec![0xFF, 0xCE]),
        ];
        let mut transport = RegisterTransport::new(I2cMock::new(&expectations));

        assert_eq!(transport.read_current_raw(0x40), Ok(-50));

        transport.release().done();
    }
}

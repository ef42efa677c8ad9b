//! Software I2C master on top of the pin-state engine
//!
//! Three layers share the same bus primitives:
//!
//! - [`BitbangI2c`]: start/stop and byte transfers, register helpers
//! - [`Wire`] / [`WireMaster`]: an Arduino-style API that collects ACK errors
//!   and reports them when the transmission ends
//! - `embedded_hal::i2c::I2c` on [`BitbangI2c`], for off-the-shelf drivers

mod bitbang;
mod eh;

pub use bitbang::BitbangI2c;

use crate::error::{Error, Result};
use crate::pins::pin_index;
use crate::transport::Transport;

/// Capacity of the Wire receive buffer
pub const WIRE_BUFFER_LEN: usize = 256;

/// Pins carrying the I2C clock and data lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2cPins {
    /// Clock line
    pub scl: u8,
    /// Data line
    pub sda: u8,
}

impl I2cPins {
    /// Validate the pair
    pub fn new(scl: u8, sda: u8) -> Result<Self> {
        pin_index(scl)?;
        pin_index(sda)?;
        if scl == sda {
            return Err(Error::InvalidParam);
        }
        Ok(Self { scl, sda })
    }
}

/// Arduino Wire-style I2C master
///
/// Transmissions are written to the bus as they are issued. NACKs seen
/// between [`begin_transmission`](Wire::begin_transmission) and
/// [`end_transmission`](Wire::end_transmission) are remembered and returned by
/// the latter, which always attempts to put a stop condition on the bus.
pub trait Wire {
    /// Put the bus in its idle state
    fn begin(&mut self) -> Result<()>;

    /// Start a write transfer to a 7-bit address
    fn begin_transmission(&mut self, address: u8);

    /// Write one byte of the current transfer
    ///
    /// The byte is clocked out even after an earlier NACK.
    fn write(&mut self, byte: u8);

    /// Issue a stop; returns and clears the first error of the transfer
    fn end_transmission(&mut self) -> Result<()>;

    /// Read `count` bytes from a 7-bit address into the receive buffer
    ///
    /// Returns the number of bytes received.
    fn request_from(&mut self, address: u8, count: usize) -> Result<usize>;

    /// Bytes left in the receive buffer
    fn available(&self) -> usize;

    /// Next byte from the receive buffer
    fn read(&mut self) -> Option<u8>;
}

/// [`Wire`] implementation over a [`BitbangI2c`]
pub struct WireMaster<'a, T: Transport> {
    bus: BitbangI2c<'a, T>,
    rx: heapless::Vec<u8, WIRE_BUFFER_LEN>,
    pos: usize,
    error: Option<Error>,
}

impl<'a, T: Transport> WireMaster<'a, T> {
    /// Wrap a bit-banged bus
    pub fn new(bus: BitbangI2c<'a, T>) -> Self {
        Self {
            bus,
            rx: heapless::Vec::new(),
            pos: 0,
            error: None,
        }
    }

    /// Access the byte-level bus
    pub fn bus(&mut self) -> &mut BitbangI2c<'a, T> {
        &mut self.bus
    }

    /// Give back the byte-level bus
    pub fn into_bus(self) -> BitbangI2c<'a, T> {
        self.bus
    }

    fn record(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl<T: Transport> Wire for WireMaster<'_, T> {
    fn begin(&mut self) -> Result<()> {
        self.error = None;
        self.rx.clear();
        self.pos = 0;
        self.bus.idle()
    }

    fn begin_transmission(&mut self, address: u8) {
        self.error = None;
        let sent = self
            .bus
            .start()
            .and_then(|_| self.bus.write_byte(address << 1));
        match sent {
            Ok(true) => {}
            Ok(false) => self.record(Error::I2cAddressNack),
            Err(e) => self.record(e),
        }
    }

    fn write(&mut self, byte: u8) {
        match self.bus.write_byte(byte) {
            Ok(true) => {}
            Ok(false) => self.record(Error::I2cDataNack),
            Err(e) => self.record(e),
        }
    }

    fn end_transmission(&mut self) -> Result<()> {
        let stopped = self.bus.stop();
        match self.error.take() {
            Some(e) => Err(e),
            None => stopped,
        }
    }

    fn request_from(&mut self, address: u8, count: usize) -> Result<usize> {
        if count > WIRE_BUFFER_LEN {
            log::debug!("I2C read of {} bytes exceeds {}", count, WIRE_BUFFER_LEN);
            return Err(Error::I2cTooLong);
        }
        self.rx.clear();
        self.pos = 0;

        self.bus.start()?;
        self.bus.address(address, true)?;
        for i in 0..count {
            let byte = self.bus.read_byte(i + 1 < count)?;
            // count <= capacity
            let _ = self.rx.push(byte);
        }
        self.bus.stop()?;
        Ok(count)
    }

    fn available(&self) -> usize {
        self.rx.len() - self.pos
    }

    fn read(&mut self) -> Option<u8> {
        let byte = self.rx.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::Recorder;
    use crate::session::Session;

    const PINS: I2cPins = I2cPins { scl: 21, sda: 22 };

    fn session() -> Session<Recorder> {
        let mut s = Session::new(Recorder::default());
        s.reset(&[16], &[40], &[], 5.0, 0.0).unwrap();
        s.transport_mut().sent.clear();
        s
    }

    #[test]
    fn test_pins() {
        assert_eq!(I2cPins::new(21, 22), Ok(PINS));
        assert_eq!(I2cPins::new(21, 21), Err(Error::InvalidParam));
        assert_eq!(I2cPins::new(0, 22), Err(Error::OutOfRange));
    }

    #[test]
    fn test_request_too_long() {
        let mut s = session();
        let mut wire = WireMaster::new(BitbangI2c::new(&mut s, PINS));
        assert_eq!(wire.request_from(0x50, 257), Err(Error::I2cTooLong));
        assert_eq!(wire.available(), 0);
        drop(wire);
        assert!(s.transport().sent.is_empty());
    }

    #[test]
    fn test_request_address_nack() {
        let mut s = session();
        s.transport_mut().levels[PINS.sda as usize - 1] = true;
        let mut wire = WireMaster::new(BitbangI2c::new(&mut s, PINS));
        assert_eq!(wire.request_from(0x50, 2), Err(Error::I2cAddressNack));
        assert_eq!(wire.read(), None);
    }

    #[test]
    fn test_nack_reported_at_end() {
        let mut s = session();
        s.transport_mut().levels[PINS.sda as usize - 1] = true;
        let mut wire = WireMaster::new(BitbangI2c::new(&mut s, PINS));
        wire.begin().unwrap();
        wire.begin_transmission(0x60);
        wire.bus().session().transport_mut().sent.clear();

        // Data is still clocked out after the address NACK
        wire.write(0x10);
        assert_eq!(wire.bus().session().transport().commits(), 28);

        // First error wins
        assert_eq!(wire.end_transmission(), Err(Error::I2cAddressNack));
        // Cleared once reported
        assert_eq!(wire.end_transmission(), Ok(()));
    }

    #[test]
    fn test_request_reads_buffer() {
        let mut s = session();
        s.transport_mut().levels[PINS.sda as usize - 1] = false;
        let mut wire = WireMaster::new(BitbangI2c::new(&mut s, PINS));
        assert_eq!(wire.request_from(0x50, 3), Ok(3));
        assert_eq!(wire.available(), 3);
        assert_eq!(wire.read(), Some(0));
        assert_eq!(wire.available(), 2);
    }
}

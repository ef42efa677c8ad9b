//! Byte-level bit-banged I2C master
//!
//! Every line change is a committed pin-mode write, so each edge reaches the
//! programmer before the next one is issued. The hold mechanism is never used
//! here: a session held by the caller is released before the next edge, since
//! batching edges would collapse the setup/hold ordering the bus relies on.
//!
//! Lines are driven push-pull when the master owns them and released to
//! high impedance when the target may drive them (the ACK slot and read
//! data).

use crate::error::{Error, Result};
use crate::pins::PinMode;
use crate::session::Session;
use crate::transport::Transport;

use super::I2cPins;

/// Software I2C controller on two session pins
pub struct BitbangI2c<'a, T: Transport> {
    session: &'a mut Session<T>,
    pins: I2cPins,
}

impl<'a, T: Transport> BitbangI2c<'a, T> {
    /// Attach to a reset session
    pub fn new(session: &'a mut Session<T>, pins: I2cPins) -> Self {
        Self { session, pins }
    }

    /// Bus pins
    pub fn pins(&self) -> I2cPins {
        self.pins
    }

    /// Borrow the underlying session
    pub fn session(&mut self) -> &mut Session<T> {
        &mut *self.session
    }

    /// Release the bus: both lines high
    pub fn idle(&mut self) -> Result<()> {
        self.lines(true, true)
    }

    /// Issue a (repeated) start condition
    ///
    /// Sequence: clock low, both lines high, then data low while the clock
    /// stays high. The leading clock-low edge is deliberate: without it, a
    /// start issued in the middle of a transfer (clock high, data low) would
    /// raise data under a high clock, which the target reads as a stop.
    pub fn start(&mut self) -> Result<()> {
        self.scl(false)?;
        self.lines(true, true)?;
        self.sda(false)
    }

    /// Issue a stop condition: data rises while the clock is high
    pub fn stop(&mut self) -> Result<()> {
        self.lines(false, false)?;
        self.scl(true)?;
        self.sda(true)
    }

    /// Clock out one byte, most significant bit first
    ///
    /// Returns `true` if the target acknowledged (pulled data low in the
    /// ninth clock).
    pub fn write_byte(&mut self, byte: u8) -> Result<bool> {
        for bit in (0..8).rev() {
            self.scl(false)?;
            self.sda(byte & (1 << bit) != 0)?;
            self.scl(true)?;
        }

        self.scl(false)?;
        self.release_sda()?;
        self.scl(true)?;
        let nack = self.session.read_pin(self.pins.sda)?;

        log::trace!("I2C write {:#04x}: {}", byte, if nack { "NACK" } else { "ACK" });
        Ok(!nack)
    }

    /// Clock in one byte, then acknowledge it (`ack`) or end the read
    pub fn read_byte(&mut self, ack: bool) -> Result<u8> {
        self.release_sda()?;

        let mut byte = 0u8;
        for _ in 0..8 {
            self.scl(false)?;
            let bit = self.session.read_pin(self.pins.sda)?;
            byte = (byte << 1) | bit as u8;
            self.scl(true)?;
        }

        self.scl(false)?;
        self.sda(!ack)?;
        self.scl(true)?;
        self.scl(false)?;

        log::trace!("I2C read {:#04x} ({})", byte, if ack { "ACK" } else { "NACK" });
        Ok(byte)
    }

    /// Write one register of a 7-bit target
    pub fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<()> {
        self.start()?;
        self.address(address, false)?;
        self.data(register)?;
        self.data(value)?;
        self.stop()
    }

    /// Read one register of a 7-bit target
    ///
    /// The register pointer is written in its own transfer, followed by a
    /// separate single-byte read.
    pub fn read_register(&mut self, address: u8, register: u8) -> Result<u8> {
        self.start()?;
        self.address(address, false)?;
        self.data(register)?;
        self.stop()?;

        self.start()?;
        self.address(address, true)?;
        let value = self.read_byte(false)?;
        self.stop()?;
        Ok(value)
    }

    /// Send an address byte; stops the bus and fails on NACK
    pub(crate) fn address(&mut self, address: u8, read: bool) -> Result<()> {
        if !self.write_byte((address << 1) | read as u8)? {
            log::debug!("I2C address {:#04x} not acknowledged", address);
            self.stop()?;
            return Err(Error::I2cAddressNack);
        }
        Ok(())
    }

    /// Send a data byte; stops the bus and fails on NACK
    pub(crate) fn data(&mut self, byte: u8) -> Result<()> {
        if !self.write_byte(byte)? {
            log::debug!("I2C data byte {:#04x} not acknowledged", byte);
            self.stop()?;
            return Err(Error::I2cDataNack);
        }
        Ok(())
    }

    fn release_hold(&mut self) -> Result<()> {
        if self.session.is_held() {
            self.session.hold_off()?;
        }
        Ok(())
    }

    fn lines(&mut self, scl: bool, sda: bool) -> Result<()> {
        self.release_hold()?;
        self.session.set_pin_modes(
            &[self.pins.scl, self.pins.sda],
            &[PinMode::drive(scl), PinMode::drive(sda)],
        )
    }

    fn scl(&mut self, high: bool) -> Result<()> {
        self.release_hold()?;
        self.session.set_pin_mode(self.pins.scl, PinMode::drive(high))
    }

    fn sda(&mut self, high: bool) -> Result<()> {
        self.release_hold()?;
        self.session.set_pin_mode(self.pins.sda, PinMode::drive(high))
    }

    fn release_sda(&mut self) -> Result<()> {
        self.release_hold()?;
        self.session.set_pin_mode(self.pins.sda, PinMode::HighZ)
    }
}

//! Simulated I2C register-file target
//!
//! Behaves like a typical small I2C device: the first byte written after the
//! address sets the register pointer, further bytes are stored at the pointer,
//! and reads return bytes from the pointer. The pointer auto-increments and
//! wraps at 256.
//!
//! Data is sampled on rising SCL and driven after falling SCL. When the host
//! changes both lines in one commit, a falling clock is applied before the
//! data change and a rising clock after it.

use cabbic_core::I2cPins;

use crate::{Lines, Peripheral};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// Shifting in the address byte
    Address,
    /// Shifting in a data byte
    Receive,
    /// Byte accepted; ACK goes out on the next falling clock
    AckPending,
    /// Holding SDA low through the ACK clock
    Acking,
    /// ACK clock high; release on the next fall
    AckDone,
    /// Shifting out a data byte
    Transmit,
    /// Byte sent; waiting for the controller's ACK
    ControllerAck,
    /// Controller acknowledged; next byte on the next fall
    NextByte,
    /// Not addressed, or read ended; wait for START or STOP
    Ignore,
}

/// I2C target with 256 byte-wide registers
pub struct I2cTarget {
    pins: I2cPins,
    address: u8,
    memory: [u8; 256],
    pointer: u8,
    pointer_set: bool,
    reading: bool,
    read_only: bool,
    state: State,
    shift: u8,
    bits: u8,
    sda_drive: Option<bool>,
    starts: usize,
    stops: usize,
}

impl I2cTarget {
    /// Target at a 7-bit address on the given lines, registers zeroed
    pub fn new(pins: I2cPins, address: u8) -> Self {
        Self {
            pins,
            address,
            memory: [0; 256],
            pointer: 0,
            pointer_set: false,
            reading: false,
            read_only: false,
            state: State::Idle,
            shift: 0,
            bits: 0,
            sda_drive: None,
            starts: 0,
            stops: 0,
        }
    }

    /// NACK every data byte after the register pointer
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Register contents
    pub fn memory(&self) -> &[u8; 256] {
        &self.memory
    }

    /// Mutable register contents
    pub fn memory_mut(&mut self) -> &mut [u8; 256] {
        &mut self.memory
    }

    /// Current register pointer
    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    /// START conditions seen (including repeated starts)
    pub fn starts(&self) -> usize {
        self.starts
    }

    /// STOP conditions seen
    pub fn stops(&self) -> usize {
        self.stops
    }

    fn sda_changed(&mut self, rose: bool, scl_high: bool) {
        if !scl_high {
            return;
        }
        self.sda_drive = None;
        self.bits = 0;
        self.shift = 0;
        if rose {
            self.stops += 1;
            self.state = State::Idle;
        } else {
            self.starts += 1;
            self.state = State::Address;
        }
    }

    fn scl_rose(&mut self, sda: bool) {
        match self.state {
            State::Address | State::Receive => {
                self.shift = (self.shift << 1) | sda as u8;
                self.bits += 1;
                if self.bits == 8 {
                    self.byte_received();
                }
            }
            State::Acking => self.state = State::AckDone,
            State::Transmit => {
                self.bits += 1;
                if self.bits == 8 {
                    self.state = State::ControllerAck;
                }
            }
            State::ControllerAck => {
                self.pointer = self.pointer.wrapping_add(1);
                self.state = if sda { State::Ignore } else { State::NextByte };
            }
            _ => {}
        }
    }

    fn scl_fell(&mut self) {
        match self.state {
            State::AckPending => {
                self.sda_drive = Some(false);
                self.state = State::Acking;
            }
            State::AckDone => {
                self.sda_drive = None;
                if self.reading {
                    self.start_transmit();
                } else {
                    self.state = State::Receive;
                    self.bits = 0;
                    self.shift = 0;
                }
            }
            State::Transmit => self.drive_bit(),
            State::ControllerAck => self.sda_drive = None,
            State::NextByte => self.start_transmit(),
            _ => {}
        }
    }

    fn byte_received(&mut self) {
        let byte = self.shift;
        if self.state == State::Address {
            if byte >> 1 != self.address {
                self.state = State::Ignore;
                return;
            }
            self.reading = byte & 1 != 0;
            if !self.reading {
                self.pointer_set = false;
            }
            self.state = State::AckPending;
            return;
        }

        if !self.pointer_set {
            self.pointer = byte;
            self.pointer_set = true;
        } else if self.read_only {
            log::debug!("i2c target: refusing write of {:#04x}", byte);
            self.state = State::Ignore;
            return;
        } else {
            self.memory[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.state = State::AckPending;
    }

    fn start_transmit(&mut self) {
        self.state = State::Transmit;
        self.bits = 0;
        self.drive_bit();
    }

    fn drive_bit(&mut self) {
        let byte = self.memory[self.pointer as usize];
        self.sda_drive = Some(byte & (0x80 >> self.bits) != 0);
    }
}

impl Peripheral for I2cTarget {
    fn on_change(&mut self, before: &Lines, after: &Lines) {
        let I2cPins { scl, sda } = self.pins;
        let sda_rose = Lines::rose(before, after, sda);
        let sda_changed = sda_rose || Lines::fell(before, after, sda);

        if Lines::fell(before, after, scl) {
            self.scl_fell();
            if sda_changed {
                self.sda_changed(sda_rose, false);
            }
        } else if Lines::rose(before, after, scl) {
            if sda_changed {
                self.sda_changed(sda_rose, false);
            }
            self.scl_rose(after.get(sda));
        } else if sda_changed {
            self.sda_changed(sda_rose, after.get(scl));
        }
    }

    fn drive(&self, pin: u8) -> Option<bool> {
        if pin == self.pins.sda {
            self.sda_drive
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DummyT48;
    use cabbic_core::error::Error;
    use cabbic_core::i2c::{Wire, WireMaster};
    use cabbic_core::{BitbangI2c, Session};
    use embedded_hal::i2c::I2c;

    const PINS: I2cPins = I2cPins { scl: 21, sda: 22 };
    const ADDR: u8 = 0x60;

    fn session_with(target: I2cTarget) -> Session<DummyT48<I2cTarget>> {
        let mut session = Session::new(DummyT48::with_peripheral(target));
        session.reset(&[16], &[40], &[], 5.0, 0.0).unwrap();
        BitbangI2c::new(&mut session, PINS).idle().unwrap();
        session
    }

    fn session() -> Session<DummyT48<I2cTarget>> {
        session_with(I2cTarget::new(PINS, ADDR))
    }

    fn target(session: &Session<DummyT48<I2cTarget>>) -> &I2cTarget {
        session.transport().peripheral()
    }

    #[test]
    fn test_register_write_and_read() {
        let mut session = session();
        let mut bus = BitbangI2c::new(&mut session, PINS);
        bus.write_register(ADDR, 0x10, 0xA5).unwrap();
        assert_eq!(bus.read_register(ADDR, 0x10), Ok(0xA5));
        assert_eq!(bus.read_register(ADDR, 0x11), Ok(0x00));

        let t = target(&session);
        assert_eq!(t.memory()[0x10], 0xA5);
        assert_eq!(t.starts(), 5);
        assert_eq!(t.stops(), 5);
    }

    #[test]
    fn test_write_byte_ack_and_nack() {
        let mut session = session();
        let mut bus = BitbangI2c::new(&mut session, PINS);
        bus.start().unwrap();
        assert_eq!(bus.write_byte(ADDR << 1), Ok(true));
        bus.stop().unwrap();

        bus.start().unwrap();
        assert_eq!(bus.write_byte(0x50 << 1), Ok(false));
        bus.stop().unwrap();
    }

    #[test]
    fn test_unknown_address() {
        let mut session = session();
        let mut bus = BitbangI2c::new(&mut session, PINS);
        assert_eq!(bus.write_register(0x50, 0, 1), Err(Error::I2cAddressNack));
        assert_eq!(bus.read_register(0x50, 0), Err(Error::I2cAddressNack));
        // The bus was stopped after each NACK
        assert_eq!(target(&session).stops(), 2);
    }

    #[test]
    fn test_embedded_hal_write_read() {
        let mut session = session();
        {
            let mem = session.transport_mut().peripheral_mut().memory_mut();
            mem[0x20..0x24].copy_from_slice(&[1, 2, 3, 4]);
        }

        let mut bus = BitbangI2c::new(&mut session, PINS);
        let mut buf = [0u8; 4];
        bus.write_read(ADDR, &[0x20], &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        bus.write(ADDR, &[0x30, 0xDE, 0xAD]).unwrap();
        let mut two = [0u8; 2];
        bus.write_read(ADDR, &[0x30], &mut two).unwrap();
        assert_eq!(two, [0xDE, 0xAD]);

        // Repeated start between the write and the read, one stop at the end
        let t = target(&session);
        assert_eq!(t.starts(), 5);
        assert_eq!(t.stops(), 3);
    }

    #[test]
    fn test_embedded_hal_split_reads() {
        use embedded_hal::i2c::Operation;

        let mut session = session();
        session.transport_mut().peripheral_mut().memory_mut()[..3].copy_from_slice(&[7, 8, 9]);

        let mut bus = BitbangI2c::new(&mut session, PINS);
        let mut first = [0u8; 1];
        let mut rest = [0u8; 2];
        bus.transaction(
            ADDR,
            &mut [
                Operation::Write(&[0x00]),
                Operation::Read(&mut first),
                Operation::Read(&mut rest),
            ],
        )
        .unwrap();
        assert_eq!(first, [7]);
        assert_eq!(rest, [8, 9]);
        assert_eq!(target(&session).pointer(), 3);
    }

    #[test]
    fn test_embedded_hal_errors() {
        use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};

        let mut session = session_with(I2cTarget::new(PINS, ADDR).read_only(true));
        let mut bus = BitbangI2c::new(&mut session, PINS);

        let err = bus.write(0x51, &[0]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );

        let err = bus.write(ADDR, &[0x00, 0x12]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        assert_eq!(target(&session).memory()[0], 0);
    }

    #[test]
    fn test_wire_round_trip() {
        let mut session = session();
        let mut wire = WireMaster::new(BitbangI2c::new(&mut session, PINS));
        wire.begin().unwrap();

        wire.begin_transmission(ADDR);
        wire.write(0x40);
        wire.write(0x11);
        wire.write(0x22);
        wire.write(0x33);
        assert_eq!(wire.end_transmission(), Ok(()));

        wire.begin_transmission(ADDR);
        wire.write(0x40);
        assert_eq!(wire.end_transmission(), Ok(()));

        assert_eq!(wire.request_from(ADDR, 3), Ok(3));
        assert_eq!(wire.available(), 3);
        assert_eq!(wire.read(), Some(0x11));
        assert_eq!(wire.read(), Some(0x22));
        assert_eq!(wire.read(), Some(0x33));
        assert_eq!(wire.read(), None);
        assert_eq!(wire.available(), 0);
    }

    #[test]
    fn test_wire_errors() {
        let mut session = session_with(I2cTarget::new(PINS, ADDR).read_only(true));
        let mut wire = WireMaster::new(BitbangI2c::new(&mut session, PINS));
        wire.begin().unwrap();

        wire.begin_transmission(0x22);
        wire.write(0x00);
        assert_eq!(wire.end_transmission(), Err(Error::I2cAddressNack));

        wire.begin_transmission(ADDR);
        wire.write(0x00);
        wire.write(0x55);
        wire.write(0x66);
        assert_eq!(wire.end_transmission(), Err(Error::I2cDataNack));

        assert_eq!(wire.request_from(ADDR, 300), Err(Error::I2cTooLong));
        assert_eq!(wire.request_from(0x22, 1), Err(Error::I2cAddressNack));

        let stops = target(wire.bus().session()).stops();
        assert_eq!(stops, 3);
    }

    #[test]
    fn test_stop_ends_transfer() {
        let mut session = session();
        let mut bus = BitbangI2c::new(&mut session, PINS);
        bus.start().unwrap();
        assert_eq!(bus.write_byte(ADDR << 1), Ok(true));
        bus.stop().unwrap();
        // A data byte outside any transfer is not acknowledged
        assert_eq!(bus.write_byte(0x12), Ok(false));
    }
}

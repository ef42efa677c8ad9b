//! Simulated parallel ROMs

use crate::{Lines, Peripheral};

fn bus_value(lines: &Lines, pins: &[u8]) -> usize {
    pins.iter()
        .enumerate()
        .filter(|(_, &pin)| lines.get(pin))
        .fold(0, |value, (bit, _)| value | 1 << bit)
}

fn data_bit(data_pins: &[u8], byte: u8, pin: u8) -> Option<bool> {
    let bit = data_pins.iter().position(|&p| p == pin)?;
    Some(byte & (1 << bit) != 0)
}

/// Asynchronous ROM with separate address and data lines
///
/// Drives the addressed byte whenever the active-low enable is asserted.
/// Address bits beyond the image size wrap around.
pub struct ParallelRom {
    address_pins: Vec<u8>,
    data_pins: Vec<u8>,
    enable_pin: u8,
    image: Vec<u8>,
    lines: Lines,
    reads: usize,
}

impl ParallelRom {
    /// ROM wired to the given pins, least significant bit first
    pub fn new(address_pins: &[u8], data_pins: &[u8], enable_pin: u8, image: Vec<u8>) -> Self {
        Self {
            address_pins: address_pins.to_vec(),
            data_pins: data_pins.to_vec(),
            enable_pin,
            image,
            lines: Lines::default(),
            reads: 0,
        }
    }

    /// Number of enable strobes seen
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Peripheral for ParallelRom {
    fn on_change(&mut self, before: &Lines, after: &Lines) {
        if Lines::fell(before, after, self.enable_pin) {
            self.reads += 1;
        }
        self.lines = *after;
    }

    fn drive(&self, pin: u8) -> Option<bool> {
        if self.lines.get(self.enable_pin) || self.image.is_empty() {
            return None;
        }
        let addr = bus_value(&self.lines, &self.address_pins) % self.image.len();
        data_bit(&self.data_pins, self.image[addr], pin)
    }
}

/// ROM with a multiplexed address/data bus, in the style of MCS-48 verify
///
/// The low address byte is taken from the data lines and the high bits from
/// `high_pins` when the latch line rises. While both latch and output enable
/// are high the latched byte is driven onto the data lines.
pub struct LatchedRom {
    data_pins: Vec<u8>,
    high_pins: Vec<u8>,
    latch_pin: u8,
    enable_pin: u8,
    image: Vec<u8>,
    latched: usize,
    lines: Lines,
}

impl LatchedRom {
    /// ROM wired to the given pins, least significant bit first
    pub fn new(
        data_pins: &[u8],
        high_pins: &[u8],
        latch_pin: u8,
        enable_pin: u8,
        image: Vec<u8>,
    ) -> Self {
        Self {
            data_pins: data_pins.to_vec(),
            high_pins: high_pins.to_vec(),
            latch_pin,
            enable_pin,
            image,
            latched: 0,
            lines: Lines::default(),
        }
    }

    /// Address captured by the last latch strobe
    pub fn latched(&self) -> usize {
        self.latched
    }
}

impl Peripheral for LatchedRom {
    fn on_change(&mut self, before: &Lines, after: &Lines) {
        if Lines::rose(before, after, self.latch_pin) {
            let low = bus_value(after, &self.data_pins);
            let high = bus_value(after, &self.high_pins);
            self.latched = low | high << self.data_pins.len();
        }
        self.lines = *after;
    }

    fn drive(&self, pin: u8) -> Option<bool> {
        if !self.lines.get(self.latch_pin) || !self.lines.get(self.enable_pin) {
            return None;
        }
        let byte = *self.image.get(self.latched)?;
        data_bit(&self.data_pins, byte, pin)
    }
}

//! cabbic-dummy - In-memory T48 emulator for testing
//!
//! This crate provides a dummy programmer that decodes every message the
//! core sends, keeps the socket's power roles and pin modes, and answers
//! configure-and-read transactions with simulated line levels. Simulated
//! chips plug in as [`Peripheral`]s so whole bus protocols and ROM dumps can
//! run without hardware.

mod i2c_target;
mod rom;

pub use i2c_target::I2cTarget;
pub use rom::{LatchedRom, ParallelRom};

use cabbic_core::error::{Error, Result};
use cabbic_core::pins::{PinMode, PowerRole, MAX_PINS};
use cabbic_core::protocol::{self, CONFIG_LEN, QUERY_REPLY_LEN, T48_DEVICE_TYPE};
use cabbic_core::tables;
use cabbic_core::transport::Transport;

/// Resolved logic level of every socket pin, indexed by pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lines([bool; MAX_PINS]);

impl Lines {
    /// Level of a pin (1..=40)
    pub fn get(&self, pin: u8) -> bool {
        self.0[pin as usize - 1]
    }

    /// Whether a pin went from low to high between two snapshots
    pub fn rose(before: &Lines, after: &Lines, pin: u8) -> bool {
        !before.get(pin) && after.get(pin)
    }

    /// Whether a pin went from high to low between two snapshots
    pub fn fell(before: &Lines, after: &Lines, pin: u8) -> bool {
        before.get(pin) && !after.get(pin)
    }
}

impl Default for Lines {
    fn default() -> Self {
        Self([true; MAX_PINS])
    }
}

/// A simulated chip wired into the socket
pub trait Peripheral {
    /// React to the host changing line levels
    fn on_change(&mut self, before: &Lines, after: &Lines);

    /// Level this chip drives on a pin, if any
    fn drive(&self, pin: u8) -> Option<bool>;
}

/// Empty socket
impl Peripheral for () {
    fn on_change(&mut self, _before: &Lines, _after: &Lines) {}

    fn drive(&self, _pin: u8) -> Option<bool> {
        None
    }
}

/// Identity reported by the dummy's query reply
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Firmware major version
    pub firmware_major: u8,
    /// Firmware minor version
    pub firmware_minor: u8,
    /// Device type byte (7 for a T48)
    pub device_type: u8,
    /// Device code string
    pub device_code: &'static str,
    /// Serial number string
    pub serial: &'static str,
    /// Date of manufacture string
    pub manufactured: &'static str,
    /// USB speed code
    pub usb_speed: u8,
    /// Raw USB voltage reading
    pub usb_voltage_raw: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            firmware_major: 1,
            firmware_minor: 7,
            device_type: T48_DEVICE_TYPE,
            device_code: "T48",
            serial: "DUMMY0000000000000000001",
            manufactured: "2024-01-01",
            usb_speed: 1,
            usb_voltage_raw: 1522, // ~5.0 V
        }
    }
}

/// Dummy T48 programmer
///
/// Line levels resolve in priority order: power roles, then push-pull
/// outputs from the host, then whatever the peripheral drives, then levels
/// injected with [`set_input`](Self::set_input), and finally the pull
/// (high unless the host asked for [`PinMode::PullLow`]).
pub struct DummyT48<P: Peripheral = ()> {
    config: DummyConfig,
    peripheral: P,
    messages: Vec<Vec<u8>>,
    roles: [Option<PowerRole>; MAX_PINS],
    modes: [PinMode; MAX_PINS],
    inputs: [Option<bool>; MAX_PINS],
    lines: Lines,
    pullup: bool,
    supply_code: u8,
    programming_code: u8,
    logic_code: u8,
    overcurrent: bool,
    disconnected: bool,
    reply_limit: Option<usize>,
}

impl DummyT48<()> {
    /// Create a dummy with an empty socket
    pub fn new() -> Self {
        Self::with_peripheral(())
    }
}

impl Default for DummyT48<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Peripheral> DummyT48<P> {
    /// Create a dummy with a chip in the socket
    pub fn with_peripheral(peripheral: P) -> Self {
        Self {
            config: DummyConfig::default(),
            peripheral,
            messages: Vec::new(),
            roles: [None; MAX_PINS],
            modes: [PinMode::HighZ; MAX_PINS],
            inputs: [None; MAX_PINS],
            lines: Lines::default(),
            pullup: false,
            supply_code: 0,
            programming_code: 0,
            logic_code: 0,
            overcurrent: false,
            disconnected: false,
            reply_limit: None,
        }
    }

    /// Replace the reported identity
    pub fn with_config(mut self, config: DummyConfig) -> Self {
        self.config = config;
        self
    }

    /// The simulated chip
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Mutable access to the simulated chip
    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    /// Every message received, in order
    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    /// Command byte of every message received
    pub fn commands(&self) -> Vec<u8> {
        self.messages.iter().map(|m| m[0]).collect()
    }

    /// Number of configure-and-read transactions received
    pub fn commits(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m[0] == protocol::CMD_CONFIG_AND_READ)
            .count()
    }

    /// Forget recorded messages
    pub fn clear_log(&mut self) {
        self.messages.clear();
    }

    /// Power role of a pin
    pub fn role(&self, pin: u8) -> Option<PowerRole> {
        self.roles[pin as usize - 1]
    }

    /// Mode of a pin as last applied
    pub fn mode(&self, pin: u8) -> PinMode {
        self.modes[pin as usize - 1]
    }

    /// Current level of a pin
    pub fn level(&self, pin: u8) -> bool {
        self.lines.get(pin)
    }

    /// Whether the last commit enabled pull-ups
    pub fn pullup(&self) -> bool {
        self.pullup
    }

    /// Last supply voltage code
    pub fn supply_code(&self) -> u8 {
        self.supply_code
    }

    /// Last programming voltage code
    pub fn programming_code(&self) -> u8 {
        self.programming_code
    }

    /// Last logic level code
    pub fn logic_code(&self) -> u8 {
        self.logic_code
    }

    /// Drive an input pin from outside, or stop driving it with `None`
    pub fn set_input(&mut self, pin: u8, level: Option<bool>) {
        self.inputs[pin as usize - 1] = level;
        self.lines = self.resolve();
    }

    /// Report overcurrent on every following configure-and-read
    pub fn set_overcurrent(&mut self, tripped: bool) {
        self.overcurrent = tripped;
    }

    /// Fail every following exchange with a transport error
    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }

    /// Truncate replies to at most `limit` bytes
    pub fn set_reply_limit(&mut self, limit: Option<usize>) {
        self.reply_limit = limit;
    }

    fn resolve(&self) -> Lines {
        let mut lines = [true; MAX_PINS];
        for (idx, level) in lines.iter_mut().enumerate() {
            let pin = idx as u8 + 1;
            *level = match self.roles[idx] {
                Some(PowerRole::Ground) => false,
                Some(_) => true,
                None => self.modes[idx]
                    .driven_level()
                    .or_else(|| self.peripheral.drive(pin))
                    .or(self.inputs[idx])
                    .unwrap_or(self.modes[idx] != PinMode::PullLow),
            };
        }
        Lines(lines)
    }

    fn assign_roles(&mut self, role: PowerRole, msg: &[u8]) {
        let bitmap = &msg[protocol::ROLE_BITMAP_OFFSET..][..protocol::ROLE_BITMAP_LEN];
        for (idx, slot) in tables::table(role).iter().enumerate() {
            if slot.supported && bitmap[slot.offset as usize] & slot.mask() != 0 {
                self.roles[idx] = Some(role);
            }
        }
        log::debug!("dummy: {} pins assigned", role);
    }

    fn handle_config(&mut self, msg: &[u8], reply: &mut [u8]) {
        let modes = protocol::decode_modes(msg).unwrap_or([None; MAX_PINS]);
        for (idx, mode) in modes.iter().enumerate() {
            self.modes[idx] = mode.unwrap_or(PinMode::HighZ);
        }
        self.pullup = msg[protocol::CONFIG_FLAGS_OFFSET]
            & protocol::ConfigFlags::PULLUP.bits()
            != 0;

        let before = self.lines;
        let after = self.resolve();
        self.peripheral.on_change(&before, &after);
        self.lines = self.resolve();

        reply.fill(0);
        reply[0] = protocol::CMD_CONFIG_AND_READ;
        reply[protocol::REPLY_OVERCURRENT_OFFSET] = self.overcurrent as u8;
        for idx in 0..MAX_PINS {
            protocol::set_reply_level(reply, idx, self.lines.0[idx]);
        }
    }

    fn handle_query(&self, reply: &mut [u8]) {
        fn put(reply: &mut [u8], at: usize, text: &str) {
            reply[at..at + text.len()].copy_from_slice(text.as_bytes());
        }

        reply.fill(0);
        reply[4] = self.config.firmware_minor;
        reply[5] = self.config.firmware_major;
        reply[6] = self.config.device_type;
        put(reply, 8, self.config.manufactured);
        put(reply, 24, self.config.device_code);
        put(reply, 32, self.config.serial);
        reply[56..60].copy_from_slice(&self.config.usb_voltage_raw.to_le_bytes());
        reply[60] = self.config.usb_speed;
    }
}

impl<P: Peripheral> Transport for DummyT48<P> {
    fn exchange(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        if self.disconnected {
            return Err(Error::Transport);
        }
        let Some(&cmd) = output.first() else {
            return Err(Error::Transport);
        };
        self.messages.push(output.to_vec());
        log::trace!("dummy: command {:#04x}, {} bytes", cmd, output.len());

        match cmd {
            protocol::CMD_QUERY if input.len() >= QUERY_REPLY_LEN => self.handle_query(input),
            protocol::CMD_RESET_PINS => {
                self.roles = [None; MAX_PINS];
                self.modes = [PinMode::HighZ; MAX_PINS];
                self.lines = self.resolve();
            }
            protocol::CMD_SET_GND_PINS => self.assign_roles(PowerRole::Ground, output),
            protocol::CMD_SET_VCC_PINS => {
                self.assign_roles(PowerRole::Supply, output);
                self.supply_code = output[protocol::ROLE_VOLTAGE_OFFSET];
            }
            protocol::CMD_SET_VPP_PINS => match output[protocol::VOLTAGE_SUBCMD_OFFSET] {
                0 => self.assign_roles(PowerRole::ProgrammingVoltage, output),
                1 => self.programming_code = output[protocol::VOLTAGE_CODE_OFFSET],
                2 => self.logic_code = output[protocol::VOLTAGE_CODE_OFFSET],
                sub => log::warn!("dummy: unknown VPP sub-command {}", sub),
            },
            protocol::CMD_CONFIG_AND_READ if input.len() >= CONFIG_LEN => {
                self.handle_config(output, input)
            }
            _ => {
                log::warn!("dummy: unsupported command {:#04x}", cmd);
                return Err(Error::Transport);
            }
        }

        if matches!(
            cmd,
            protocol::CMD_RESET_PINS
                | protocol::CMD_SET_GND_PINS
                | protocol::CMD_SET_VCC_PINS
                | protocol::CMD_SET_VPP_PINS
        ) {
            self.lines = self.resolve();
        }

        Ok(self.reply_limit.map_or(input.len(), |limit| limit.min(input.len())))
    }
}

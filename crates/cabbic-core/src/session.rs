//! Device session and pin-state engine
//!
//! A [`Session`] owns everything the host knows about the programmer's pins:
//! the last requested mode of every pin, which pins carry a power role, the
//! hold and pull-up flags, and whether a reset has happened. All hardware
//! mutation goes through a single configure-and-read transaction; every other
//! call only edits this cached state.

use crate::config::PowerConfig;
use crate::error::{Error, Result};
use crate::pins::{pin_index, PinMode, PowerRole, MAX_PINS};
use crate::protocol::{self, DeviceInfo, VoltageSetting, CONFIG_LEN, QUERY_REPLY_LEN};
use crate::transport::Transport;
use crate::voltage::{self, VoltageRange};

/// Live connection to a T48 programmer
///
/// Created unreset. Only [`reset`](Self::reset) and [`query`](Self::query)
/// are accepted until a reset succeeds.
pub struct Session<T: Transport> {
    transport: T,
    reset_done: bool,
    hold: bool,
    pullup: bool,
    modes: [PinMode; MAX_PINS],
    roles: [Option<PowerRole>; MAX_PINS],
}

impl<T: Transport> Session<T> {
    /// Wrap a transport in a fresh, unreset session
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            reset_done: false,
            hold: false,
            pullup: false,
            modes: [PinMode::HighZ; MAX_PINS],
            roles: [None; MAX_PINS],
        }
    }

    /// Read the programmer's identity
    ///
    /// Does not require a reset.
    pub fn query(&mut self) -> Result<DeviceInfo> {
        let mut reply = [0u8; QUERY_REPLY_LEN];
        self.transport
            .transact(&protocol::query_message(), &mut reply)?;
        let info = DeviceInfo::parse(&reply)?;
        log::debug!(
            "T48 firmware {}.{:02}, serial {}",
            info.firmware_major,
            info.firmware_minor,
            info.serial
        );
        Ok(info)
    }

    /// Reset the programmer and assign power roles
    ///
    /// Ground is always assigned before supply, and the programming voltage
    /// last (only when `progvolt_pins` is non-empty). On any failure the
    /// session is left unreset.
    pub fn reset(
        &mut self,
        ground_pins: &[u8],
        supply_pins: &[u8],
        progvolt_pins: &[u8],
        supply_v: f32,
        progvolt_v: f32,
    ) -> Result<()> {
        self.reset_done = false;
        self.hold = false;
        self.roles = [None; MAX_PINS];
        self.modes = [PinMode::HighZ; MAX_PINS];

        log::debug!(
            "Reset: GND {:?}, VCC {:?} @ {} V, VPP {:?} @ {} V",
            ground_pins,
            supply_pins,
            supply_v,
            progvolt_pins,
            progvolt_v
        );

        self.transport.send(&protocol::reset_message())?;
        self.assign(PowerRole::Ground, ground_pins, 0.0)?;
        self.assign(PowerRole::Supply, supply_pins, supply_v)?;
        if !progvolt_pins.is_empty() {
            self.assign(PowerRole::ProgrammingVoltage, progvolt_pins, progvolt_v)?;
        }

        self.reset_done = true;
        Ok(())
    }

    /// Reset using a power configuration
    pub fn reset_with(&mut self, config: &PowerConfig) -> Result<()> {
        self.reset(
            &config.ground,
            &config.supply,
            &config.programming,
            config.supply_v,
            config.programming_v,
        )
    }

    /// Assign a power role to further pins of a reset session
    ///
    /// Every pin and the voltage are validated before anything is sent. A
    /// pin may carry only one role between resets. The programming voltage
    /// is set by a second message following the pin assignment. Pins gaining
    /// a role drop their cached mode back to [`PinMode::HighZ`].
    pub fn assign_role(&mut self, role: PowerRole, pins: &[u8], volts: f32) -> Result<()> {
        self.check_reset()?;
        self.assign(role, pins, volts)
    }

    fn assign(&mut self, role: PowerRole, pins: &[u8], volts: f32) -> Result<()> {
        if pins.is_empty() {
            log::debug!("No pins given for {}", role);
            return Err(Error::InvalidParam);
        }

        for &pin in pins {
            let idx = pin_index(pin)?;
            if let Some(held) = self.roles[idx] {
                if held != role {
                    log::debug!("Pin {} already carries {}", pin, held);
                    return Err(Error::InvalidParam);
                }
            }
        }

        let code = voltage::quantize(role, volts)?;
        let msg = match role {
            PowerRole::ProgrammingVoltage => protocol::role_message(role, pins, 0)?,
            _ => protocol::role_message(role, pins, code)?,
        };

        log::debug!("Assigning {} to pins {:?} (code {})", role, pins, code);
        self.transport.send(&msg)?;
        if role == PowerRole::ProgrammingVoltage {
            self.transport
                .send(&protocol::voltage_message(VoltageSetting::Programming, code))?;
        }

        for &pin in pins {
            self.roles[pin as usize - 1] = Some(role);
            self.modes[pin as usize - 1] = PinMode::HighZ;
        }
        Ok(())
    }

    /// Change the programming voltage without touching pin roles
    pub fn set_progvolt_voltage(&mut self, volts: f32) -> Result<()> {
        self.check_reset()?;
        let code = VoltageRange::PROGRAMMING.quantize(volts)?;
        log::debug!("VPP set to {} V (code {})", volts, code);
        self.transport
            .send(&protocol::voltage_message(VoltageSetting::Programming, code))
    }

    /// Change the I/O logic level
    pub fn set_logic_voltage(&mut self, volts: f32) -> Result<()> {
        self.check_reset()?;
        let code = VoltageRange::LOGIC.quantize(volts)?;
        log::debug!("Logic level set to {} V (code {})", volts, code);
        self.transport
            .send(&protocol::voltage_message(VoltageSetting::Logic, code))
    }

    /// Enable or disable pull-ups; applied by the next commit
    pub fn set_pullup(&mut self, enabled: bool) {
        self.pullup = enabled;
    }

    /// Start buffering mode changes
    pub fn hold_on(&mut self) -> Result<()> {
        self.check_reset()?;
        self.hold = true;
        Ok(())
    }

    /// Commit buffered mode changes and stop buffering
    pub fn hold_off(&mut self) -> Result<()> {
        self.check_reset()?;
        self.commit(&mut [0u8; CONFIG_LEN])?;
        self.hold = false;
        Ok(())
    }

    /// Set the mode of one pin
    pub fn set_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        self.check_reset()?;
        let idx = pin_index(pin)?;
        self.apply_mode(idx, mode);
        self.commit_unless_held()
    }

    /// Set the modes of several pins at once
    ///
    /// `pins` and `modes` are paired and must have the same length. All pins
    /// are validated before any mode changes.
    pub fn set_pin_modes(&mut self, pins: &[u8], modes: &[PinMode]) -> Result<()> {
        self.check_reset()?;
        if pins.len() != modes.len() {
            return Err(Error::LengthMismatch);
        }
        for &pin in pins {
            pin_index(pin)?;
        }
        for (&pin, &mode) in pins.iter().zip(modes) {
            self.apply_mode(pin as usize - 1, mode);
        }
        self.commit_unless_held()
    }

    /// Commit pending modes and sample pin levels
    ///
    /// `values[i]` receives the level of `pins[i]`. Always commits, and
    /// releases any hold.
    pub fn read(&mut self, pins: &[u8], values: &mut [bool]) -> Result<()> {
        self.check_reset()?;
        if pins.len() != values.len() {
            return Err(Error::LengthMismatch);
        }
        for &pin in pins {
            pin_index(pin)?;
        }

        let mut reply = [0u8; CONFIG_LEN];
        self.commit(&mut reply)?;
        self.hold = false;

        for (&pin, value) in pins.iter().zip(values.iter_mut()) {
            *value = protocol::reply_level(&reply, pin as usize - 1)?;
        }
        log::trace!("Read {:?} -> {:?}", pins, values);
        Ok(())
    }

    /// Commit pending modes and sample one pin
    pub fn read_pin(&mut self, pin: u8) -> Result<bool> {
        let mut value = [false];
        self.read(&[pin], &mut value)?;
        Ok(value[0])
    }

    /// Whether a reset has completed successfully
    pub fn is_reset(&self) -> bool {
        self.reset_done
    }

    /// Whether mode changes are currently being buffered
    pub fn is_held(&self) -> bool {
        self.hold
    }

    /// Whether pull-ups are enabled
    pub fn pullup(&self) -> bool {
        self.pullup
    }

    /// Last requested mode of a pin
    pub fn pin_mode(&self, pin: u8) -> Result<PinMode> {
        Ok(self.modes[pin_index(pin)?])
    }

    /// Power role assigned to a pin at the last reset
    pub fn role(&self, pin: u8) -> Result<Option<PowerRole>> {
        Ok(self.roles[pin_index(pin)?])
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, returning the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn check_reset(&self) -> Result<()> {
        if !self.reset_done {
            log::debug!("Pin operation before reset");
            return Err(Error::State);
        }
        Ok(())
    }

    fn apply_mode(&mut self, idx: usize, mode: PinMode) {
        if let Some(role) = self.roles[idx] {
            log::warn!(
                "Pin {} carries {}; ignoring mode {:?}",
                idx + 1,
                role,
                mode
            );
            return;
        }
        self.modes[idx] = mode;
    }

    fn commit_unless_held(&mut self) -> Result<()> {
        if self.hold {
            return Ok(());
        }
        self.commit(&mut [0u8; CONFIG_LEN])
    }

    /// Send the configure-and-read transaction
    fn commit(&mut self, reply: &mut [u8; CONFIG_LEN]) -> Result<()> {
        let msg = protocol::config_message(self.pullup, &self.modes);
        log::trace!("Commit {:02x?}", &msg[..]);
        self.transport.transact(&msg, reply)?;
        if protocol::reply_overcurrent(reply) {
            log::warn!("Overcurrent detected, check the chip orientation");
            return Err(Error::Overcurrent);
        }
        Ok(())
    }
}

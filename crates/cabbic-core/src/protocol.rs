//! T48 wire protocol
//!
//! Every message is a fixed-size buffer starting with a command byte.
//! Builders here are pure: they validate their inputs completely before
//! producing a buffer, and never touch the transport.
//!
//! | Message             | Cmd  | Out | In |
//! |---------------------|------|-----|----|
//! | Query               | 0x00 | 5   | 80 |
//! | Configure-and-read  | 0x28 | 32  | 32 |
//! | Reset pins          | 0x2D | 10  | -  |
//! | Set VCC pins        | 0x2E | 48  | -  |
//! | Set VPP pins/levels | 0x2F | 48  | -  |
//! | Set GND pins        | 0x30 | 48  | -  |

use core::fmt;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::pins::{PinMode, PowerRole, MAX_PINS};
use crate::tables;

/// Device type reported in the query reply
pub const T48_DEVICE_TYPE: u8 = 7;

/// Read the programmer's identity
pub const CMD_QUERY: u8 = 0x00;
/// Apply pin modes and sample every pin
pub const CMD_CONFIG_AND_READ: u8 = 0x28;
/// Drop all power roles and release every pin
pub const CMD_RESET_PINS: u8 = 0x2D;
/// Assign supply (VCC) pins and voltage
pub const CMD_SET_VCC_PINS: u8 = 0x2E;
/// Assign programming-voltage (VPP) pins, or update a voltage level
pub const CMD_SET_VPP_PINS: u8 = 0x2F;
/// Assign ground pins
pub const CMD_SET_GND_PINS: u8 = 0x30;

/// Query message length
pub const QUERY_LEN: usize = 5;
/// Query reply length
pub const QUERY_REPLY_LEN: usize = 80;
/// Reset message length
pub const RESET_LEN: usize = 10;
/// Role-assignment and voltage-update message length
pub const ROLE_LEN: usize = 48;
/// Configure-and-read message and reply length
pub const CONFIG_LEN: usize = 32;

/// Start of the pin bitmap in a role message
pub const ROLE_BITMAP_OFFSET: usize = 8;
/// Bytes in the role bitmap
pub const ROLE_BITMAP_LEN: usize = 4;
/// Voltage code in a role message
pub const ROLE_VOLTAGE_OFFSET: usize = 22;
/// Sub-command byte of a voltage update
pub const VOLTAGE_SUBCMD_OFFSET: usize = 1;
/// Voltage code in a voltage update
pub const VOLTAGE_CODE_OFFSET: usize = 8;
/// [`ConfigFlags`] byte of a configure-and-read message
pub const CONFIG_FLAGS_OFFSET: usize = 1;
/// Pin count byte of a configure-and-read message
pub const CONFIG_PIN_COUNT_OFFSET: usize = 2;
/// Apply byte of a configure-and-read message
pub const CONFIG_APPLY_OFFSET: usize = 4;
/// Start of the packed pin modes (and of the sampled levels in the reply)
pub const CONFIG_MODES_OFFSET: usize = 8;
/// Bytes of packed pin nibbles
pub const CONFIG_MODES_LEN: usize = MAX_PINS / 2;
/// Reply byte flagging an overcurrent trip (shares the flags offset)
pub const REPLY_OVERCURRENT_OFFSET: usize = 1;

bitflags! {
    /// Flag byte of the configure-and-read message
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConfigFlags: u8 {
        /// Enable the programmer's pull-up resistors on I/O pins
        const PULLUP = 0x80;
    }
}

/// Voltage settings updated through the VPP command's sub-command byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageSetting {
    /// Programming voltage (VPP)
    Programming = 1,
    /// I/O logic level
    Logic = 2,
}

/// Command byte of a role-assignment message
pub const fn role_command(role: PowerRole) -> u8 {
    match role {
        PowerRole::Ground => CMD_SET_GND_PINS,
        PowerRole::Supply => CMD_SET_VCC_PINS,
        PowerRole::ProgrammingVoltage => CMD_SET_VPP_PINS,
    }
}

/// Build the query message
pub fn query_message() -> [u8; QUERY_LEN] {
    let mut msg = [0u8; QUERY_LEN];
    msg[0] = CMD_QUERY;
    msg
}

/// Build the pin reset message
pub fn reset_message() -> [u8; RESET_LEN] {
    let mut msg = [0u8; RESET_LEN];
    msg[0] = CMD_RESET_PINS;
    msg
}

/// Build a role-assignment message
///
/// Every pin is looked up in the role's capability table before anything is
/// written, so a failure never yields a partially built message.
pub fn role_message(role: PowerRole, pins: &[u8], voltage_code: u8) -> Result<[u8; ROLE_LEN]> {
    let mut bitmap = [0u8; ROLE_BITMAP_LEN];
    for &pin in pins {
        let slot = tables::slot(role, pin)?;
        bitmap[slot.offset as usize] |= slot.mask();
    }

    let mut msg = [0u8; ROLE_LEN];
    msg[0] = role_command(role);
    msg[ROLE_BITMAP_OFFSET..ROLE_BITMAP_OFFSET + ROLE_BITMAP_LEN].copy_from_slice(&bitmap);
    msg[ROLE_VOLTAGE_OFFSET] = voltage_code;
    Ok(msg)
}

/// Build a one-shot voltage update message
pub fn voltage_message(setting: VoltageSetting, code: u8) -> [u8; ROLE_LEN] {
    let mut msg = [0u8; ROLE_LEN];
    msg[0] = CMD_SET_VPP_PINS;
    msg[VOLTAGE_SUBCMD_OFFSET] = setting as u8;
    msg[VOLTAGE_CODE_OFFSET] = code;
    msg
}

/// Nibble position of a zero-based pin index: (byte offset, shift)
const fn nibble_position(idx: usize) -> (usize, u32) {
    (
        CONFIG_MODES_OFFSET + (idx >> 1),
        if idx & 1 == 1 { 4 } else { 0 },
    )
}

/// Build the configure-and-read message for the given pin modes
///
/// Modes are packed two per byte: even zero-based pins in the low nibble,
/// odd pins in the high nibble.
pub fn config_message(pullup: bool, modes: &[PinMode; MAX_PINS]) -> [u8; CONFIG_LEN] {
    let mut msg = [0u8; CONFIG_LEN];
    msg[0] = CMD_CONFIG_AND_READ;
    let mut flags = ConfigFlags::empty();
    flags.set(ConfigFlags::PULLUP, pullup);
    msg[CONFIG_FLAGS_OFFSET] = flags.bits();
    msg[CONFIG_PIN_COUNT_OFFSET] = MAX_PINS as u8;
    msg[CONFIG_APPLY_OFFSET] = 1;

    for (idx, mode) in modes.iter().enumerate() {
        let (byte, shift) = nibble_position(idx);
        msg[byte] |= (mode.code() & 0xF) << shift;
    }
    msg
}

/// Decode the pin modes packed into a configure-and-read message
///
/// Unknown codes decode as `None`.
pub fn decode_modes(msg: &[u8]) -> Result<[Option<PinMode>; MAX_PINS]> {
    if msg.len() < CONFIG_MODES_OFFSET + CONFIG_MODES_LEN {
        return Err(Error::ShortReply);
    }
    let mut modes = [None; MAX_PINS];
    for (idx, mode) in modes.iter_mut().enumerate() {
        *mode = PinMode::from_code(nibble(msg, idx));
    }
    Ok(modes)
}

/// Raw 4-bit field for a zero-based pin index in a buffer already checked
/// to hold every pin nibble
fn nibble(buf: &[u8], idx: usize) -> u8 {
    let (byte, shift) = nibble_position(idx);
    (buf[byte] >> shift) & 0xF
}

/// Sampled logic level of a zero-based pin index in a configure-and-read reply
pub fn reply_level(reply: &[u8; CONFIG_LEN], idx: usize) -> Result<bool> {
    if idx >= MAX_PINS {
        return Err(Error::OutOfRange);
    }
    Ok(nibble(reply, idx) & 1 != 0)
}

/// Store a sampled level into a configure-and-read reply buffer
///
/// Indices past the last pin, or past the end of `reply`, leave it untouched.
pub fn set_reply_level(reply: &mut [u8], idx: usize, high: bool) {
    if idx >= MAX_PINS {
        return;
    }
    let (byte, shift) = nibble_position(idx);
    if let Some(b) = reply.get_mut(byte) {
        *b &= !(0x0Fu8 << shift);
        *b |= (high as u8) << shift;
    }
}

/// Whether a configure-and-read reply reports an overcurrent trip
pub fn reply_overcurrent(reply: &[u8; CONFIG_LEN]) -> bool {
    reply[REPLY_OVERCURRENT_OFFSET] != 0
}

/// USB link speed reported by the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbSpeed {
    /// 12 Mbps
    Full,
    /// 480 Mbps
    High,
    /// 5 Gbps
    Super,
    /// Unrecognized speed code
    Unknown(u8),
}

impl UsbSpeed {
    fn from_code(code: u8) -> Self {
        match code {
            0 => UsbSpeed::Full,
            1 => UsbSpeed::High,
            3 => UsbSpeed::Super,
            other => UsbSpeed::Unknown(other),
        }
    }
}

impl fmt::Display for UsbSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbSpeed::Full => write!(f, "12Mbps"),
            UsbSpeed::High => write!(f, "480Mbps"),
            UsbSpeed::Super => write!(f, "5Gbps"),
            UsbSpeed::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

/// Programmer identity decoded from the query reply
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Device type (always 7 for a T48)
    pub device_type: u8,
    /// Firmware major version
    pub firmware_major: u8,
    /// Firmware minor version
    pub firmware_minor: u8,
    /// Device code string
    pub device_code: heapless::String<8>,
    /// Serial number string
    pub serial: heapless::String<24>,
    /// Date of manufacture string
    pub manufactured: heapless::String<16>,
    /// USB link speed
    pub usb_speed: UsbSpeed,
    /// USB supply voltage in volts
    pub usb_voltage: f32,
}

// Query reply layout
const QUERY_FW_MINOR: usize = 4;
const QUERY_FW_MAJOR: usize = 5;
const QUERY_DEVICE_TYPE: usize = 6;
const QUERY_DATE: core::ops::Range<usize> = 8..24;
const QUERY_CODE: core::ops::Range<usize> = 24..32;
const QUERY_SERIAL: core::ops::Range<usize> = 32..56;
const QUERY_USB_VOLTAGE: core::ops::Range<usize> = 56..60;
const QUERY_USB_SPEED: usize = 60;

impl DeviceInfo {
    /// Decode a query reply, rejecting anything that is not a T48
    pub fn parse(reply: &[u8]) -> Result<Self> {
        if reply.len() <= QUERY_USB_SPEED {
            return Err(Error::ShortReply);
        }

        let device_type = reply[QUERY_DEVICE_TYPE];
        if device_type != T48_DEVICE_TYPE {
            return Err(Error::UnsupportedDevice { device_type });
        }

        let mut raw = [0u8; 4];
        raw.copy_from_slice(&reply[QUERY_USB_VOLTAGE]);
        let usb_voltage = u32::from_le_bytes(raw) as f32 * 0xCCF7 as f32 / 0x27000 as f32 / 100.0;

        Ok(Self {
            device_type,
            firmware_major: reply[QUERY_FW_MAJOR],
            firmware_minor: reply[QUERY_FW_MINOR],
            device_code: c_string(&reply[QUERY_CODE]),
            serial: c_string(&reply[QUERY_SERIAL]),
            manufactured: c_string(&reply[QUERY_DATE]),
            usb_speed: UsbSpeed::from_code(reply[QUERY_USB_SPEED]),
            usb_voltage,
        })
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device Type: {} (T48)", self.device_type)?;
        writeln!(
            f,
            "Firmware Version: {}.{:02}",
            self.firmware_major, self.firmware_minor
        )?;
        writeln!(f, "Device Code: {}", self.device_code)?;
        writeln!(f, "Device Serial: {}", self.serial)?;
        writeln!(f, "Date of Manufacture: {}", self.manufactured)?;
        writeln!(f, "USB Speed: {}", self.usb_speed)?;
        write!(f, "USB Supply Voltage: {:.2}", self.usb_voltage)
    }
}

/// NUL-terminated field to string; non-ASCII bytes become '?'
fn c_string<const N: usize>(field: &[u8]) -> heapless::String<N> {
    let mut s = heapless::String::new();
    for &b in field.iter().take_while(|&&b| b != 0).take(N) {
        let c = if b.is_ascii() && !b.is_ascii_control() {
            b as char
        } else {
            '?'
        };
        // Capacity is bounded by take(N)
        let _ = s.push(c);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_message() {
        let msg = reset_message();
        assert_eq!(msg.len(), 10);
        assert_eq!(msg[0], 0x2D);
        assert!(msg[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_ground_message() {
        let msg = role_message(PowerRole::Ground, &[16, 1, 40], 0).unwrap();
        assert_eq!(msg[0], CMD_SET_GND_PINS);
        assert_eq!(&msg[8..12], &[0x80, 0x01, 0x00, 0x01]);
        assert_eq!(msg[22], 0);
    }

    #[test]
    fn test_supply_message_carries_voltage() {
        let msg = role_message(PowerRole::Supply, &[40], 42).unwrap();
        assert_eq!(msg[0], CMD_SET_VCC_PINS);
        assert_eq!(&msg[8..12], &[0, 0, 0, 0x80]);
        assert_eq!(msg[22], 42);
    }

    #[test]
    fn test_role_message_validates_all_pins() {
        assert_eq!(
            role_message(PowerRole::ProgrammingVoltage, &[1, 5], 0),
            Err(Error::InvalidParam)
        );
        assert_eq!(
            role_message(PowerRole::Ground, &[1, 41], 0),
            Err(Error::OutOfRange)
        );
    }

    #[test]
    fn test_voltage_message() {
        let msg = voltage_message(VoltageSetting::Logic, 3);
        assert_eq!(msg[0], CMD_SET_VPP_PINS);
        assert_eq!(msg[1], 2);
        assert_eq!(msg[8], 3);
        assert_eq!(msg.len(), 48);
    }

    #[test]
    fn test_config_message_packing() {
        let mut modes = [PinMode::HighZ; MAX_PINS];
        modes[0] = PinMode::DriveLow; // pin 1, low nibble
        modes[1] = PinMode::DriveHigh; // pin 2, high nibble
        modes[39] = PinMode::Clamp; // pin 40, high nibble of last byte
        let msg = config_message(true, &modes);

        assert_eq!(msg[0], 0x28);
        assert_eq!(msg[1], 0x80);
        assert_eq!(msg[2], 40);
        assert_eq!(msg[4], 1);
        assert_eq!(msg[8], 0x10);
        assert_eq!(msg[9], 0x55);
        assert_eq!(msg[27], 0x45);
        assert!(msg[28..].iter().all(|&b| b == 0));

        let decoded = decode_modes(&msg).unwrap();
        assert_eq!(decoded[0], Some(PinMode::DriveLow));
        assert_eq!(decoded[1], Some(PinMode::DriveHigh));
        assert_eq!(decoded[39], Some(PinMode::Clamp));

        assert_eq!(config_message(false, &modes)[1], 0);
    }

    #[test]
    fn test_reply_levels() {
        let mut reply = [0u8; CONFIG_LEN];
        set_reply_level(&mut reply, 15, true); // pin 16
        assert_eq!(reply[15], 0x10);
        assert_eq!(reply_level(&reply, 15), Ok(true));
        assert_eq!(reply_level(&reply, 14), Ok(false));
        assert_eq!(reply_level(&reply, MAX_PINS), Err(Error::OutOfRange));
        assert!(!reply_overcurrent(&reply));
        reply[1] = 1;
        assert!(reply_overcurrent(&reply));
    }

    #[test]
    fn test_set_reply_level_bounds() {
        let mut short = [0u8; 10];
        set_reply_level(&mut short, 39, true);
        set_reply_level(&mut short, 2, true);
        assert_eq!(short[9], 0x01);
        assert_eq!(short.iter().filter(|&&b| b != 0).count(), 1);

        let mut reply = [0u8; CONFIG_LEN];
        set_reply_level(&mut reply, MAX_PINS, true);
        assert!(reply.iter().all(|&b| b == 0));
    }

    fn query_reply() -> [u8; QUERY_REPLY_LEN] {
        let mut reply = [0u8; QUERY_REPLY_LEN];
        reply[4] = 7;
        reply[5] = 1;
        reply[6] = T48_DEVICE_TYPE;
        reply[8..18].copy_from_slice(b"2023-05-01");
        reply[24..28].copy_from_slice(b"T48A");
        reply[32..40].copy_from_slice(b"ABCD1234");
        reply[56..60].copy_from_slice(&0x27000u32.to_le_bytes());
        reply[60] = 1;
        reply
    }

    #[test]
    fn test_parse_device_info() {
        let info = DeviceInfo::parse(&query_reply()).unwrap();
        assert_eq!(info.firmware_major, 1);
        assert_eq!(info.firmware_minor, 7);
        assert_eq!(info.device_code.as_str(), "T48A");
        assert_eq!(info.serial.as_str(), "ABCD1234");
        assert_eq!(info.manufactured.as_str(), "2023-05-01");
        assert_eq!(info.usb_speed, UsbSpeed::High);
        assert!((info.usb_voltage - 0xCCF7 as f32 / 100.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_rejects_other_devices() {
        let mut reply = query_reply();
        reply[6] = 5;
        assert_eq!(
            DeviceInfo::parse(&reply),
            Err(Error::UnsupportedDevice { device_type: 5 })
        );
        assert_eq!(DeviceInfo::parse(&reply[..40]), Err(Error::ShortReply));
    }
}

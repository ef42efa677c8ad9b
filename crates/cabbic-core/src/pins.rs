//! Pin numbering, drive modes and power roles
//!
//! Pins are numbered 1..=40 following the ZIF socket. There is no
//! sub-structuring: every pin is addressed by its socket number.

use core::fmt;

use crate::error::{Error, Result};

/// Number of addressable ZIF socket pins on the T48
pub const MAX_PINS: usize = 40;

/// Drive/sense configuration of a non-power pin
///
/// The programmer treats these as opaque 4-bit codes. Only [`PinMode::HighZ`]
/// carries meaning on the host side: it is the canonical input mode and the
/// mode every pin returns to after a reset.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinMode {
    /// Drive the pin low
    DriveLow = 0,
    /// Drive the pin high
    DriveHigh = 1,
    /// Weak pull low
    PullLow = 2,
    /// Weak pull high
    PullHigh = 3,
    /// Clamp
    Clamp = 4,
    /// High impedance; configures the pin as an input
    #[default]
    HighZ = 5,
    /// Device-specific mode 6
    Extra1 = 6,
    /// Device-specific mode 7
    Extra2 = 7,
    /// Device-specific mode 8
    Extra3 = 8,
}

impl PinMode {
    /// 4-bit code placed in the configure-and-read message
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a 4-bit mode code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::DriveLow),
            1 => Some(Self::DriveHigh),
            2 => Some(Self::PullLow),
            3 => Some(Self::PullHigh),
            4 => Some(Self::Clamp),
            5 => Some(Self::HighZ),
            6 => Some(Self::Extra1),
            7 => Some(Self::Extra2),
            8 => Some(Self::Extra3),
            _ => None,
        }
    }

    /// Push-pull output mode for a logic level
    pub const fn drive(high: bool) -> Self {
        if high {
            Self::DriveHigh
        } else {
            Self::DriveLow
        }
    }

    /// Level this mode actively drives, if any
    pub const fn driven_level(self) -> Option<bool> {
        match self {
            Self::DriveLow => Some(false),
            Self::DriveHigh => Some(true),
            _ => None,
        }
    }
}

/// Power function a pin can be given at reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerRole {
    /// Pin is tied to ground
    Ground,
    /// Pin supplies VCC
    Supply,
    /// Pin supplies the programming voltage (VPP)
    ProgrammingVoltage,
}

impl PowerRole {
    /// All roles, in the order a reset assigns them
    pub const ALL: [PowerRole; 3] = [
        PowerRole::Ground,
        PowerRole::Supply,
        PowerRole::ProgrammingVoltage,
    ];
}

impl fmt::Display for PowerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerRole::Ground => write!(f, "GND"),
            PowerRole::Supply => write!(f, "VCC"),
            PowerRole::ProgrammingVoltage => write!(f, "VPP"),
        }
    }
}

/// Validate a pin number and convert it to a zero-based index
pub fn pin_index(pin: u8) -> Result<usize> {
    if pin == 0 || pin as usize > MAX_PINS {
        return Err(Error::OutOfRange);
    }
    Ok(pin as usize - 1)
}

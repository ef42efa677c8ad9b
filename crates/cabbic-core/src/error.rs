//! Error types for cabbic-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every variant maps to a stable numeric code so
//! applications layered on the core can report failures the same way the
//! programmer's native tooling does.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Session errors
    /// Operation attempted before a successful reset
    State,
    /// Pin index or voltage outside its valid span
    OutOfRange,
    /// Pin does not support the requested power role
    InvalidParam,
    /// Paired pin/value arguments have inconsistent lengths
    LengthMismatch,

    // Device errors
    /// The programmer reported an overcurrent fault during configure-and-read
    Overcurrent,
    /// The underlying transport failed to complete an exchange
    Transport,
    /// The programmer replied with fewer bytes than the message requires
    ShortReply,
    /// The attached device is not a T48
    UnsupportedDevice {
        /// Device type byte reported by the query reply
        device_type: u8,
    },

    // I2C errors
    /// Requested I2C read exceeds the receive buffer
    I2cTooLong,
    /// I2C target did not acknowledge its address
    I2cAddressNack,
    /// I2C target did not acknowledge a data byte
    I2cDataNack,
}

impl Error {
    /// Numeric error code, matching the codes used by the programmer's C API
    ///
    /// I2C errors use the Wire-library codes offset by 0x10 so they never
    /// collide with session codes.
    pub const fn code(&self) -> u8 {
        match self {
            Self::State => 1,
            Self::OutOfRange => 2,
            Self::InvalidParam => 3,
            Self::LengthMismatch => 4,
            Self::Overcurrent => 5,
            Self::Transport => 8,
            Self::ShortReply => 9,
            Self::UnsupportedDevice { .. } => 10,
            Self::I2cTooLong => 0x11,
            Self::I2cAddressNack => 0x12,
            Self::I2cDataNack => 0x13,
        }
    }

    /// Whether retrying the operation could succeed
    ///
    /// Transport hiccups are worth retrying; everything else indicates a
    /// programming error in the client or a hardware fault.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport | Self::ShortReply)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => write!(f, "bad state: device has not been reset"),
            Self::OutOfRange => write!(f, "value out of range"),
            Self::InvalidParam => write!(f, "pin cannot be used for the requested role"),
            Self::LengthMismatch => write!(f, "pin and value arrays differ in length"),
            Self::Overcurrent => write!(f, "overcurrent detector triggered"),
            Self::Transport => write!(f, "USB transport failure"),
            Self::ShortReply => write!(f, "short reply from programmer"),
            Self::UnsupportedDevice { device_type } => {
                write!(f, "unsupported device type {} (expected 7, T48)", device_type)
            }
            Self::I2cTooLong => write!(f, "I2C read request too long"),
            Self::I2cAddressNack => write!(f, "I2C address not acknowledged"),
            Self::I2cDataNack => write!(f, "I2C data not acknowledged"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_c_api() {
        assert_eq!(Error::State.code(), 1);
        assert_eq!(Error::OutOfRange.code(), 2);
        assert_eq!(Error::InvalidParam.code(), 3);
        assert_eq!(Error::LengthMismatch.code(), 4);
        assert_eq!(Error::Overcurrent.code(), 5);
    }

    #[test]
    fn test_transient() {
        assert!(Error::Transport.is_transient());
        assert!(!Error::State.is_transient());
        assert!(!Error::OutOfRange.is_transient());
    }
}

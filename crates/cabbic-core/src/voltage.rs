//! Voltage quantization
//!
//! The programmer takes voltages as small integer codes. Each setting maps
//! its voltage range affinely onto `0..=scale` and rounds half up; the
//! resulting code must then land inside the setting's valid code span.

use crate::error::{Error, Result};
use crate::pins::PowerRole;

/// Affine voltage-to-code mapping for one programmer setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageRange {
    /// Voltage mapped to code 0
    pub min_v: f32,
    /// Voltage mapped to code `scale`
    pub max_v: f32,
    /// Code corresponding to `max_v`
    pub scale: u8,
    /// Smallest accepted code
    pub min_code: u8,
    /// Largest accepted code
    pub max_code: u8,
}

impl VoltageRange {
    /// VCC: 1.8 V to 6.5 V over 62 steps; code 0 means "leave unchanged"
    pub const SUPPLY: Self = Self {
        min_v: 1.8,
        max_v: 6.5,
        scale: 62,
        min_code: 1,
        max_code: 63,
    };

    /// VPP: 9.0 V to 25.0 V over 63 steps
    pub const PROGRAMMING: Self = Self {
        min_v: 9.0,
        max_v: 25.0,
        scale: 63,
        min_code: 0,
        max_code: 63,
    };

    /// I/O logic level: 2.35 V to 3.45 V over 4 steps
    pub const LOGIC: Self = Self {
        min_v: 2.35,
        max_v: 3.45,
        scale: 4,
        min_code: 0,
        max_code: 4,
    };

    /// Range used for a power role, if the role carries a voltage
    pub const fn for_role(role: PowerRole) -> Option<Self> {
        match role {
            PowerRole::Ground => None,
            PowerRole::Supply => Some(Self::SUPPLY),
            PowerRole::ProgrammingVoltage => Some(Self::PROGRAMMING),
        }
    }

    /// Convert a voltage to its device code
    ///
    /// Voltages outside `[min_v, max_v]` (including NaN) are rejected before
    /// rounding, as are codes outside `[min_code, max_code]`.
    pub fn quantize(&self, volts: f32) -> Result<u8> {
        if !(self.min_v..=self.max_v).contains(&volts) {
            log::debug!(
                "Voltage {} outside {}..={} V",
                volts,
                self.min_v,
                self.max_v
            );
            return Err(Error::OutOfRange);
        }

        // Non-negative here, so truncation rounds half up
        let scaled = (volts - self.min_v) / (self.max_v - self.min_v) * self.scale as f32 + 0.5;
        let code = scaled as u32;

        if code < self.min_code as u32 || code > self.max_code as u32 {
            log::debug!("Voltage {} quantizes to reserved code {}", volts, code);
            return Err(Error::OutOfRange);
        }

        Ok(code as u8)
    }

    /// Nominal voltage for a code (inverse of [`quantize`](Self::quantize))
    pub fn voltage(&self, code: u8) -> f32 {
        self.min_v + (self.max_v - self.min_v) * code as f32 / self.scale as f32
    }
}

/// Quantize the voltage for a power role
///
/// Ground carries no voltage and always yields code 0.
pub fn quantize(role: PowerRole, volts: f32) -> Result<u8> {
    match VoltageRange::for_role(role) {
        Some(range) => range.quantize(volts),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programming_bounds() {
        let vpp = VoltageRange::PROGRAMMING;
        assert_eq!(vpp.quantize(9.0), Ok(0));
        assert_eq!(vpp.quantize(25.0), Ok(63));
        assert_eq!(vpp.quantize(8.9), Err(Error::OutOfRange));
        assert_eq!(vpp.quantize(25.1), Err(Error::OutOfRange));
        assert_eq!(vpp.quantize(f32::NAN), Err(Error::OutOfRange));
    }

    #[test]
    fn test_round_half_up() {
        let vpp = VoltageRange::PROGRAMMING;
        // One step is 16/63 V; half a step past 12 V rounds up
        let step = 16.0 / 63.0;
        assert_eq!(vpp.quantize(9.0 + 10.0 * step), Ok(10));
        assert_eq!(vpp.quantize(9.0 + 10.4 * step), Ok(10));
        assert_eq!(vpp.quantize(9.0 + 10.6 * step), Ok(11));
    }

    #[test]
    fn test_supply_never_zero() {
        let vcc = VoltageRange::SUPPLY;
        // The bottom of the range rounds to the reserved code
        assert_eq!(vcc.quantize(1.8), Err(Error::OutOfRange));
        assert_eq!(vcc.quantize(1.84), Ok(1));
        assert_eq!(vcc.quantize(5.0), Ok(42));
        assert_eq!(vcc.quantize(6.5), Ok(62));
        assert_eq!(vcc.quantize(6.6), Err(Error::OutOfRange));

        let mut v = 1.8f32;
        while v <= 6.5 {
            assert_ne!(vcc.quantize(v), Ok(0));
            v += 0.01;
        }
    }

    #[test]
    fn test_logic_level() {
        let io = VoltageRange::LOGIC;
        assert_eq!(io.quantize(2.35), Ok(0));
        assert_eq!(io.quantize(3.3), Ok(3));
        assert_eq!(io.quantize(3.45), Ok(4));
        assert_eq!(io.quantize(1.8), Err(Error::OutOfRange));
    }

    #[test]
    fn test_role_quantize() {
        assert_eq!(quantize(PowerRole::Ground, 123.0), Ok(0));
        assert_eq!(quantize(PowerRole::Supply, 5.0), Ok(42));
        assert_eq!(quantize(PowerRole::ProgrammingVoltage, 25.0), Ok(63));
    }

    #[test]
    fn test_voltage_inverse() {
        let vpp = VoltageRange::PROGRAMMING;
        for code in 0..=63u8 {
            assert_eq!(vpp.quantize(vpp.voltage(code)), Ok(code));
        }
    }
}

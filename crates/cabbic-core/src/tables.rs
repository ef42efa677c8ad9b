//! Pin capability tables
//!
//! For each power role, one record per ZIF pin saying whether the pin can
//! take that role and where its bit lives in the role-assignment bitmap.
//! These tables are a wire contract with the T48 firmware: the byte offset
//! is relative to the start of the 4-byte bitmap and `bit` is the bit number
//! within that byte.

use crate::error::{Error, Result};
use crate::pins::{pin_index, PowerRole, MAX_PINS};

/// Position of a pin in a role-assignment bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSlot {
    /// Whether the pin supports the role at all
    pub supported: bool,
    /// Byte offset into the bitmap (0..4)
    pub offset: u8,
    /// Bit within that byte (0..8)
    pub bit: u8,
}

impl PinSlot {
    const fn on(offset: u8, bit: u8) -> Self {
        Self {
            supported: true,
            offset,
            bit,
        }
    }

    const fn off(offset: u8, bit: u8) -> Self {
        Self {
            supported: false,
            offset,
            bit,
        }
    }

    /// Bit mask for this slot within its byte
    pub const fn mask(&self) -> u8 {
        1 << self.bit
    }
}

const NONE: PinSlot = PinSlot::off(0, 0);

/// Ground-capable pins
///
/// Pins 18 and 20 have bitmap positions but the firmware does not accept
/// them as ground.
pub static GROUND: [PinSlot; MAX_PINS] = [
    PinSlot::on(0, 7), // 1
    PinSlot::on(0, 6), // 2
    PinSlot::on(0, 5), // 3
    PinSlot::on(0, 4), // 4
    PinSlot::on(0, 3), // 5
    PinSlot::on(0, 2), // 6
    PinSlot::on(0, 1), // 7
    PinSlot::on(0, 0), // 8
    PinSlot::on(1, 7), // 9
    PinSlot::on(1, 6), // 10
    PinSlot::on(1, 5), // 11
    PinSlot::on(1, 4), // 12
    PinSlot::on(1, 3), // 13
    PinSlot::on(1, 2), // 14
    PinSlot::on(1, 1), // 15
    PinSlot::on(1, 0), // 16
    NONE,              // 17
    PinSlot::off(2, 7), // 18
    NONE,              // 19
    PinSlot::off(2, 6), // 20
    NONE,              // 21
    NONE,              // 22
    NONE,              // 23
    NONE,              // 24
    PinSlot::on(2, 5), // 25
    NONE,              // 26
    PinSlot::on(2, 4), // 27
    NONE,              // 28
    PinSlot::on(2, 3), // 29
    PinSlot::on(2, 2), // 30
    PinSlot::on(2, 1), // 31
    PinSlot::on(2, 0), // 32
    PinSlot::on(3, 7), // 33
    PinSlot::on(3, 6), // 34
    PinSlot::on(3, 5), // 35
    PinSlot::on(3, 4), // 36
    PinSlot::on(3, 3), // 37
    PinSlot::on(3, 2), // 38
    PinSlot::on(3, 1), // 39
    PinSlot::on(3, 0), // 40
];

/// VCC-capable pins
pub static SUPPLY: [PinSlot; MAX_PINS] = [
    PinSlot::on(0, 0), // 1
    PinSlot::on(0, 1), // 2
    PinSlot::on(0, 2), // 3
    PinSlot::on(0, 3), // 4
    PinSlot::on(0, 4), // 5
    PinSlot::on(0, 5), // 6
    PinSlot::on(0, 6), // 7
    PinSlot::on(0, 7), // 8
    PinSlot::on(1, 7), // 9
    PinSlot::on(1, 6), // 10
    PinSlot::on(1, 5), // 11
    PinSlot::on(1, 4), // 12
    PinSlot::on(1, 3), // 13
    PinSlot::on(1, 2), // 14
    PinSlot::on(1, 1), // 15
    PinSlot::on(1, 0), // 16
    NONE,              // 17
    NONE,              // 18
    NONE,              // 19
    NONE,              // 20
    NONE,              // 21
    NONE,              // 22
    NONE,              // 23
    NONE,              // 24
    PinSlot::on(2, 0), // 25
    PinSlot::on(2, 1), // 26
    PinSlot::on(2, 2), // 27
    PinSlot::on(2, 3), // 28
    PinSlot::on(2, 4), // 29
    PinSlot::on(2, 5), // 30
    PinSlot::on(2, 6), // 31
    PinSlot::on(2, 7), // 32
    PinSlot::on(3, 0), // 33
    PinSlot::on(3, 1), // 34
    PinSlot::on(3, 2), // 35
    PinSlot::on(3, 3), // 36
    PinSlot::on(3, 4), // 37
    PinSlot::on(3, 5), // 38
    PinSlot::on(3, 6), // 39
    PinSlot::on(3, 7), // 40
];

/// VPP-capable pins
pub static PROGRAMMING_VOLTAGE: [PinSlot; MAX_PINS] = [
    PinSlot::on(0, 7), // 1
    PinSlot::on(0, 6), // 2
    PinSlot::on(0, 5), // 3
    PinSlot::on(0, 4), // 4
    NONE,              // 5
    NONE,              // 6
    NONE,              // 7
    NONE,              // 8
    PinSlot::on(0, 3), // 9
    PinSlot::on(0, 2), // 10
    NONE,              // 11
    NONE,              // 12
    NONE,              // 13
    NONE,              // 14
    NONE,              // 15
    NONE,              // 16
    NONE,              // 17
    NONE,              // 18
    NONE,              // 19
    NONE,              // 20
    NONE,              // 21
    NONE,              // 22
    NONE,              // 23
    NONE,              // 24
    NONE,              // 25
    NONE,              // 26
    NONE,              // 27
    NONE,              // 28
    NONE,              // 29
    PinSlot::on(0, 1), // 30
    PinSlot::on(0, 0), // 31
    PinSlot::on(1, 0), // 32
    PinSlot::on(1, 1), // 33
    PinSlot::on(1, 2), // 34
    NONE,              // 35
    PinSlot::on(1, 3), // 36
    PinSlot::on(1, 4), // 37
    PinSlot::on(1, 5), // 38
    PinSlot::on(1, 6), // 39
    PinSlot::on(1, 7), // 40
];

/// Capability table for a role
pub fn table(role: PowerRole) -> &'static [PinSlot; MAX_PINS] {
    match role {
        PowerRole::Ground => &GROUND,
        PowerRole::Supply => &SUPPLY,
        PowerRole::ProgrammingVoltage => &PROGRAMMING_VOLTAGE,
    }
}

/// Look up a pin's bitmap slot for a role
///
/// Fails with [`Error::OutOfRange`] for pins outside 1..=40 and with
/// [`Error::InvalidParam`] when the pin cannot take the role.
pub fn slot(role: PowerRole, pin: u8) -> Result<PinSlot> {
    let idx = pin_index(pin)?;
    let slot = table(role)[idx];
    if !slot.supported {
        log::debug!("Pin {} can't be used for {}", pin, role);
        return Err(Error::InvalidParam);
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lookup() {
        assert_eq!(slot(PowerRole::Ground, 16), Ok(PinSlot::on(1, 0)));
        assert_eq!(slot(PowerRole::Supply, 40), Ok(PinSlot::on(3, 7)));
        assert_eq!(
            slot(PowerRole::ProgrammingVoltage, 1),
            Ok(PinSlot::on(0, 7))
        );
        assert_eq!(slot(PowerRole::Supply, 0), Err(Error::OutOfRange));
        assert_eq!(slot(PowerRole::Supply, 41), Err(Error::OutOfRange));
    }

    #[test]
    fn test_unsupported_pins() {
        assert_eq!(slot(PowerRole::Ground, 17), Err(Error::InvalidParam));
        // Positioned but disabled
        assert_eq!(slot(PowerRole::Ground, 18), Err(Error::InvalidParam));
        assert_eq!(slot(PowerRole::Ground, 20), Err(Error::InvalidParam));
        assert_eq!(slot(PowerRole::Supply, 20), Err(Error::InvalidParam));
        assert_eq!(
            slot(PowerRole::ProgrammingVoltage, 5),
            Err(Error::InvalidParam)
        );
        assert_eq!(
            slot(PowerRole::ProgrammingVoltage, 35),
            Err(Error::InvalidParam)
        );
    }

    #[test]
    fn test_supported_slots_are_unique() {
        for role in PowerRole::ALL {
            let mut seen = [0u8; 4];
            for s in table(role).iter().filter(|s| s.supported) {
                assert!(s.offset < 4 && s.bit < 8);
                assert_eq!(seen[s.offset as usize] & s.mask(), 0, "{} slot reused", role);
                seen[s.offset as usize] |= s.mask();
            }
        }
    }

    #[test]
    fn test_capability_counts() {
        let count = |role| table(role).iter().filter(|s| s.supported).count();
        assert_eq!(count(PowerRole::Ground), 30);
        assert_eq!(count(PowerRole::Supply), 32);
        assert_eq!(count(PowerRole::ProgrammingVoltage), 16);
    }
}

//! ROM dump sequences for legacy parts
//!
//! Each supported part knows its socket wiring, power configuration and the
//! strobe sequence that presents one byte on its data pins. Dumps go into a
//! caller-provided buffer; writing them anywhere is up to the application.

mod d8741;
mod mk36000;

pub use d8741::D8741;
pub use mk36000::Mk36000;

use embedded_hal::delay::DelayNs;

use crate::config::{PowerConfig, Timing};
use crate::error::{Error, Result};
use crate::pins::PinMode;
use crate::session::Session;
use crate::transport::Transport;

/// A part whose contents can be read out through the socket
pub trait RomDump {
    /// Part name
    const NAME: &'static str;
    /// Bytes in the dump
    const SIZE: usize;

    /// Power roles and voltages the part needs
    fn power() -> Result<PowerConfig>;

    /// Reset the programmer for this part and read its contents into `out`
    ///
    /// `out` must be exactly [`SIZE`](Self::SIZE) bytes long.
    fn read<T: Transport, D: DelayNs>(
        session: &mut Session<T>,
        delay: &mut D,
        timing: &Timing,
        out: &mut [u8],
    ) -> Result<()>;
}

/// Check the output buffer against a part's size
fn check_len<R: RomDump>(out: &[u8]) -> Result<()> {
    if out.len() != R::SIZE {
        log::error!(
            "{} dump needs {} bytes, buffer holds {}",
            R::NAME,
            R::SIZE,
            out.len()
        );
        return Err(Error::LengthMismatch);
    }
    Ok(())
}

/// Output modes presenting `value` on address lines, bit 0 first
fn address_modes<const N: usize>(value: usize) -> [PinMode; N] {
    core::array::from_fn(|bit| PinMode::drive(value & (1 << bit) != 0))
}

/// Byte from data line levels, bit 0 first
fn pack(levels: &[bool; 8]) -> u8 {
    levels
        .iter()
        .enumerate()
        .fold(0, |byte, (bit, &high)| byte | ((high as u8) << bit))
}

/// Log progress every KiB
fn progress(name: &str, addr: usize, size: usize) {
    if addr % 1024 == 1023 {
        log::debug!("{}: read {} of {} bytes", name, addr + 1, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_modes() {
        let modes: [PinMode; 4] = address_modes(0b1010);
        assert_eq!(
            modes,
            [
                PinMode::DriveLow,
                PinMode::DriveHigh,
                PinMode::DriveLow,
                PinMode::DriveHigh
            ]
        );
    }

    #[test]
    fn test_pack() {
        assert_eq!(pack(&[true, false, false, false, false, false, false, true]), 0x81);
        assert_eq!(pack(&[false; 8]), 0);
    }

    #[test]
    fn test_part_power() {
        assert_eq!(Mk36000::power().and_then(|p| p.validate()), Ok(()));
        assert_eq!(D8741::power().and_then(|p| p.validate()), Ok(()));
    }
}

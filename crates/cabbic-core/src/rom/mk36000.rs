//! MK36000 24-pin mask ROM (e.g. the IBM CGA character ROM)

use embedded_hal::delay::DelayNs;

use super::{address_modes, check_len, pack, progress, RomDump};
use crate::config::{PowerConfig, Timing};
use crate::error::Result;
use crate::pins::{PinMode, MAX_PINS};
use crate::session::Session;
use crate::transport::Transport;

const ROM_PINS: u8 = 24;

/// Socket pin for a package pin of a 24-pin part seated at the lever end
const fn mp(pin: u8) -> u8 {
    if pin <= ROM_PINS / 2 {
        pin
    } else {
        pin + (MAX_PINS as u8 - ROM_PINS)
    }
}

const VCC_V: f32 = 5.0;
const PIN_CE: u8 = mp(20);
const GND_PINS: [u8; 1] = [mp(12)];
const VCC_PINS: [u8; 3] = [mp(18), mp(21), mp(24)];
const ADDR_PINS: [u8; 11] = [
    mp(8),
    mp(7),
    mp(6),
    mp(5),
    mp(4),
    mp(3),
    mp(2),
    mp(1),
    mp(23),
    mp(22),
    mp(19),
];
const DATA_PINS: [u8; 8] = [mp(9), mp(10), mp(11), mp(13), mp(14), mp(15), mp(16), mp(17)];

/// MK36000 mask ROM
pub struct Mk36000;

impl RomDump for Mk36000 {
    const NAME: &'static str = "MK36000";
    const SIZE: usize = 8192;

    fn power() -> Result<PowerConfig> {
        PowerConfig::new(&GND_PINS, &VCC_PINS, VCC_V)
    }

    fn read<T: Transport, D: DelayNs>(
        session: &mut Session<T>,
        delay: &mut D,
        timing: &Timing,
        out: &mut [u8],
    ) -> Result<()> {
        check_len::<Self>(out)?;
        session.reset_with(&Self::power()?)?;

        session.set_pin_modes(&DATA_PINS, &[PinMode::HighZ; 8])?;
        session.set_pin_mode(PIN_CE, PinMode::DriveHigh)?;

        let mut levels = [false; 8];
        for (addr, byte) in out.iter_mut().enumerate() {
            session.set_pin_modes(&ADDR_PINS, &address_modes::<11>(addr))?;
            delay.delay_us(timing.address_setup_us);

            session.set_pin_mode(PIN_CE, PinMode::DriveLow)?;
            session.read(&DATA_PINS, &mut levels)?;
            session.set_pin_mode(PIN_CE, PinMode::DriveHigh)?;

            *byte = pack(&levels);
            progress(Self::NAME, addr, Self::SIZE);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_map() {
        assert_eq!(mp(1), 1);
        assert_eq!(mp(12), 12);
        assert_eq!(mp(13), 29);
        assert_eq!(mp(24), 40);
        assert_eq!(PIN_CE, 36);
    }
}

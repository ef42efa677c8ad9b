//! Intel D8741 EPROM, read through a Willem MCS-48 adapter
//!
//! The adapter clocks the part and routes its pins to fixed socket
//! positions. Data lines D0-D7 double as the low address byte: the address
//! is latched on RST rising, then the part drives the byte back on the same
//! lines while T0 is high (verify mode).
//!
//! The programming voltage is the T48 maximum of 25 V, which reaches EA as
//! roughly 22 V. That is below the 23 V the datasheet asks for but is enough
//! for reading.

use embedded_hal::delay::DelayNs;

use super::{address_modes, check_len, pack, progress, RomDump};
use crate::config::{PowerConfig, Timing};
use crate::error::Result;
use crate::pins::PinMode;
use crate::session::Session;
use crate::transport::Transport;

const VCC_V: f32 = 5.6;
const VPP_V: f32 = 25.0;

const PIN_EA: u8 = 1;
const PIN_T0: u8 = 8;
const PIN_A3: u8 = 9;
const PIN_A2: u8 = 10;
const PIN_A1: u8 = 11;
const PIN_A0: u8 = 12;
const PIN_D0: u8 = 13;
const PIN_D1: u8 = 14;
const PIN_D2: u8 = 15;
const PIN_GND: u8 = 16;
const PIN_D3: u8 = 25;
const PIN_D4: u8 = 26;
const PIN_D5: u8 = 27;
const PIN_D6: u8 = 28;
const PIN_D7: u8 = 29;
// PROG/VDD programming supply, grounded for reads
const PIN_CE: u8 = 30;
const PIN_RST: u8 = 32;
const PIN_VCC: u8 = 40;

const GND_PINS: [u8; 4] = [PIN_GND, PIN_A2, PIN_A3, PIN_CE];
const ADDR_PINS: [u8; 10] = [
    PIN_D0, PIN_D1, PIN_D2, PIN_D3, PIN_D4, PIN_D5, PIN_D6, PIN_D7, PIN_A0, PIN_A1,
];
const DATA_PINS: [u8; 8] = [
    PIN_D0, PIN_D1, PIN_D2, PIN_D3, PIN_D4, PIN_D5, PIN_D6, PIN_D7,
];

/// D8741 MCU EPROM
pub struct D8741;

impl RomDump for D8741 {
    const NAME: &'static str = "D8741";
    const SIZE: usize = 1024;

    fn power() -> Result<PowerConfig> {
        PowerConfig::new(&GND_PINS, &[PIN_VCC], VCC_V)?.with_programming(&[PIN_EA], VPP_V)
    }

    fn read<T: Transport, D: DelayNs>(
        session: &mut Session<T>,
        delay: &mut D,
        timing: &Timing,
        out: &mut [u8],
    ) -> Result<()> {
        check_len::<Self>(out)?;
        session.reset_with(&Self::power()?)?;
        delay.delay_us(timing.reset_settle_us);

        session.hold_on()?;
        session.set_pin_mode(PIN_T0, PinMode::DriveLow)?;
        session.set_pin_mode(PIN_RST, PinMode::DriveLow)?;
        session.hold_off()?;
        delay.delay_us(timing.idle_settle_us);

        let mut levels = [false; 8];
        for (addr, byte) in out.iter_mut().enumerate() {
            session.set_pin_modes(&ADDR_PINS, &address_modes::<10>(addr))?;

            // Latch the address, then enter verify mode
            session.hold_on()?;
            session.set_pin_mode(PIN_RST, PinMode::DriveHigh)?;
            session.set_pin_mode(PIN_T0, PinMode::DriveHigh)?;
            session.hold_off()?;
            delay.delay_us(timing.strobe_us);

            session.hold_on()?;
            session.set_pin_modes(&DATA_PINS, &[PinMode::HighZ; 8])?;
            session.read(&DATA_PINS, &mut levels)?;

            session.set_pin_mode(PIN_T0, PinMode::DriveLow)?;
            delay.delay_us(timing.strobe_us);
            session.set_pin_mode(PIN_RST, PinMode::DriveLow)?;
            delay.delay_us(timing.strobe_us);

            *byte = pack(&levels);
            progress(Self::NAME, addr, Self::SIZE);
        }
        Ok(())
    }
}

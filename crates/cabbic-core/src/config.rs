//! Power, bus and timing configuration
//!
//! A [`ProgrammerConfig`] gathers everything a chip application needs before
//! it touches the socket: which pins get which power role, the I2C lines, and
//! the settle intervals of its read sequence. With the `std` feature it can be
//! built from programmer option pairs or a TOML file:
//!
//! ```toml
//! [power]
//! ground = [16]
//! supply = [40]
//! supply_v = 5.0
//! programming = [1]
//! programming_v = 25.0
//!
//! [i2c]
//! scl = 21
//! sda = 22
//!
//! [timing]
//! reset_settle_us = 20000
//! ```

use crate::error::{Error, Result};
use crate::i2c::I2cPins;
use crate::pins::{PowerRole, MAX_PINS};
use crate::tables;
use crate::voltage;

/// Fixed-capacity list of socket pins
pub type PinList = heapless::Vec<u8, MAX_PINS>;

/// Power role assignment applied at reset
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerConfig {
    /// Pins tied to ground
    pub ground: PinList,
    /// Pins supplying VCC
    pub supply: PinList,
    /// Pins supplying VPP (may be empty)
    #[cfg_attr(feature = "serde", serde(default))]
    pub programming: PinList,
    /// VCC in volts
    pub supply_v: f32,
    /// VPP in volts, ignored when no programming pins are given
    #[cfg_attr(feature = "serde", serde(default))]
    pub programming_v: f32,
}

impl PowerConfig {
    /// Ground and supply only
    pub fn new(ground: &[u8], supply: &[u8], supply_v: f32) -> Result<Self> {
        Ok(Self {
            ground: pin_list(ground)?,
            supply: pin_list(supply)?,
            programming: PinList::new(),
            supply_v,
            programming_v: 0.0,
        })
    }

    /// Add programming-voltage pins
    pub fn with_programming(mut self, pins: &[u8], volts: f32) -> Result<Self> {
        self.programming = pin_list(pins)?;
        self.programming_v = volts;
        Ok(self)
    }

    /// Check the configuration the way a reset would, without a device
    pub fn validate(&self) -> Result<()> {
        let mut roles: [Option<PowerRole>; MAX_PINS] = [None; MAX_PINS];
        let groups = [
            (PowerRole::Ground, &self.ground, 0.0),
            (PowerRole::Supply, &self.supply, self.supply_v),
            (PowerRole::ProgrammingVoltage, &self.programming, self.programming_v),
        ];

        for (role, pins, volts) in groups {
            if pins.is_empty() {
                if role == PowerRole::ProgrammingVoltage {
                    continue;
                }
                return Err(Error::InvalidParam);
            }
            voltage::quantize(role, volts)?;
            for &pin in pins.iter() {
                tables::slot(role, pin)?;
                let held = &mut roles[pin as usize - 1];
                if held.is_some() {
                    return Err(Error::InvalidParam);
                }
                *held = Some(role);
            }
        }
        Ok(())
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            ground: PinList::new(),
            supply: PinList::new(),
            programming: PinList::new(),
            supply_v: 5.0,
            programming_v: 0.0,
        }
    }
}

fn pin_list(pins: &[u8]) -> Result<PinList> {
    PinList::from_slice(pins).map_err(|_| Error::OutOfRange)
}

/// Settle intervals used by chip read sequences, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Timing {
    /// After reset, before the first pin change
    pub reset_settle_us: u32,
    /// After parking control lines in their idle state
    pub idle_settle_us: u32,
    /// Between driving an address and strobing the chip
    pub address_setup_us: u32,
    /// Width of each control strobe phase
    pub strobe_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reset_settle_us: 20_000,
            idle_settle_us: 5_000,
            address_setup_us: 100,
            strobe_us: 1_000,
        }
    }
}

impl Timing {
    /// No waiting at all, for emulated devices
    pub const fn none() -> Self {
        Self {
            reset_settle_us: 0,
            idle_settle_us: 0,
            address_setup_us: 0,
            strobe_us: 0,
        }
    }
}

/// Complete programmer setup for one application
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgrammerConfig {
    /// Power roles
    pub power: PowerConfig,
    /// I2C bus lines, if the application uses the bus
    #[cfg_attr(feature = "serde", serde(default))]
    pub i2c: Option<I2cPins>,
    /// Read sequence timing
    #[cfg_attr(feature = "serde", serde(default))]
    pub timing: Timing,
}

#[cfg(feature = "std")]
pub use self::host::*;

#[cfg(feature = "std")]
mod host {
    use std::path::Path;
    use std::string::{String, ToString};
    use std::time::Duration;

    use embedded_hal::delay::DelayNs;
    use thiserror::Error;

    use super::{pin_list, PinList, ProgrammerConfig};
    use crate::i2c::I2cPins;

    /// Configuration loading errors
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Option value could not be parsed
        #[error("Invalid {key} value: {value}")]
        InvalidValue {
            /// Option name
            key: &'static str,
            /// Offending value
            value: String,
        },

        /// Option name not recognized
        #[error("Unknown option: {0}")]
        UnknownOption(String),

        /// Only one of the I2C lines was given
        #[error("Both scl and sda must be specified for I2C")]
        IncompleteI2c,

        /// Configuration is well-formed but unusable
        #[error("Invalid configuration: {0}")]
        Invalid(#[from] crate::Error),

        /// TOML syntax or schema error
        #[error("Failed to parse TOML: {0}")]
        Toml(#[from] toml::de::Error),

        /// Configuration file could not be read
        #[error("Failed to read configuration: {0}")]
        Io(#[from] std::io::Error),
    }

    fn parse_value<V: core::str::FromStr>(
        key: &'static str,
        value: &str,
    ) -> Result<V, ConfigError> {
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
    }

    fn parse_pins(key: &'static str, value: &str) -> Result<PinList, ConfigError> {
        let mut pins = [0u8; super::MAX_PINS];
        let mut count = 0;
        for part in value.split('+').filter(|p| !p.trim().is_empty()) {
            if count == pins.len() {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                });
            }
            pins[count] = parse_value(key, part)?;
            count += 1;
        }
        Ok(pin_list(&pins[..count])?)
    }

    /// Parse programmer options
    ///
    /// Recognized keys: `gnd`, `vcc`, `vpp` (pin lists joined by `+`),
    /// `vcc_v`, `vpp_v` (volts), `scl`, `sda` (I2C pins). The result is
    /// validated before it is returned.
    pub fn parse_options(options: &[(&str, &str)]) -> Result<ProgrammerConfig, ConfigError> {
        let mut config = ProgrammerConfig::default();
        let mut scl: Option<u8> = None;
        let mut sda: Option<u8> = None;

        for (key, value) in options {
            match *key {
                "gnd" => config.power.ground = parse_pins("gnd", value)?,
                "vcc" => config.power.supply = parse_pins("vcc", value)?,
                "vpp" => config.power.programming = parse_pins("vpp", value)?,
                "vcc_v" => config.power.supply_v = parse_value("vcc_v", value)?,
                "vpp_v" => config.power.programming_v = parse_value("vpp_v", value)?,
                "scl" => scl = Some(parse_value("scl", value)?),
                "sda" => sda = Some(parse_value("sda", value)?),
                other => {
                    log::warn!("Unknown T48 option: {}", other);
                    return Err(ConfigError::UnknownOption(other.to_string()));
                }
            }
        }

        config.i2c = match (scl, sda) {
            (Some(scl), Some(sda)) => Some(I2cPins::new(scl, sda)?),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteI2c),
        };

        config.power.validate()?;
        Ok(config)
    }

    impl ProgrammerConfig {
        /// Parse and validate a TOML document
        pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
            let config: Self = toml::from_str(content)?;
            config.power.validate()?;
            if let Some(pins) = config.i2c {
                I2cPins::new(pins.scl, pins.sda)?;
            }
            Ok(config)
        }

        /// Load and validate a TOML file
        pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        }
    }

    /// Host delay backed by `std::thread::sleep`
    #[derive(Debug, Clone, Copy, Default)]
    pub struct StdDelay;

    impl DelayNs for StdDelay {
        fn delay_ns(&mut self, ns: u32) {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let ok = PowerConfig::new(&[16], &[40], 5.0).unwrap();
        assert_eq!(ok.validate(), Ok(()));

        let vpp = ok.clone().with_programming(&[1], 25.0).unwrap();
        assert_eq!(vpp.validate(), Ok(()));

        let bad_vpp_pin = ok.clone().with_programming(&[5], 25.0).unwrap();
        assert_eq!(bad_vpp_pin.validate(), Err(Error::InvalidParam));

        let shared = PowerConfig::new(&[16], &[16], 5.0).unwrap();
        assert_eq!(shared.validate(), Err(Error::InvalidParam));

        let low = PowerConfig::new(&[16], &[40], 1.0).unwrap();
        assert_eq!(low.validate(), Err(Error::OutOfRange));

        assert_eq!(PowerConfig::default().validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn test_pin_list_capacity() {
        let many = [1u8; MAX_PINS + 1];
        assert_eq!(PowerConfig::new(&many, &[40], 5.0), Err(Error::OutOfRange));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("gnd", "16+10"),
            ("vcc", "40"),
            ("vcc_v", "5.6"),
            ("vpp", "1"),
            ("vpp_v", "25"),
            ("scl", "21"),
            ("sda", "22"),
        ])
        .unwrap();
        assert_eq!(&config.power.ground[..], &[16, 10]);
        assert_eq!(&config.power.programming[..], &[1]);
        assert_eq!(config.power.supply_v, 5.6);
        assert_eq!(config.i2c, Some(I2cPins { scl: 21, sda: 22 }));

        assert!(matches!(
            parse_options(&[("gnd", "x")]),
            Err(ConfigError::InvalidValue { key: "gnd", .. })
        ));
        assert!(matches!(
            parse_options(&[("gnd", "16"), ("vcc", "40"), ("scl", "21")]),
            Err(ConfigError::IncompleteI2c)
        ));
        assert!(matches!(
            parse_options(&[("speed", "1")]),
            Err(ConfigError::UnknownOption(_))
        ));
        assert!(matches!(
            parse_options(&[("gnd", "17"), ("vcc", "40")]),
            Err(ConfigError::Invalid(Error::InvalidParam))
        ));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_toml() {
        let config = ProgrammerConfig::from_toml_str(
            r#"
            [power]
            ground = [12]
            supply = [34, 37, 40]
            supply_v = 5.0

            [timing]
            address_setup_us = 250
            "#,
        )
        .unwrap();
        assert_eq!(&config.power.supply[..], &[34, 37, 40]);
        assert!(config.power.programming.is_empty());
        assert_eq!(config.i2c, None);
        assert_eq!(config.timing.address_setup_us, 250);
        assert_eq!(config.timing.reset_settle_us, 20_000);

        assert!(matches!(
            ProgrammerConfig::from_toml_str("[power]\nground = 16\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}

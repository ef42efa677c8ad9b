//! cabbic-core - Pin-level driver core for the T48 universal programmer
//!
//! This crate turns the programmer's ZIF socket into 40 host-controlled
//! pins: power roles assigned at reset, per-pin drive modes, and sampled
//! levels. On top of that it provides a software I2C master and read
//! sequences for a few legacy ROMs. It is designed to be `no_std`
//! compatible; USB access is supplied by the host through [`Transport`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `serde`), TOML and
//!   option configuration parsing, and a sleeping delay
//! - `serde` - Derive serde traits for configuration types
//!
//! # Example
//!
//! ```ignore
//! use cabbic_core::{PinMode, Session};
//!
//! fn blink<T: cabbic_core::Transport>(transport: T) -> cabbic_core::Result<()> {
//!     let mut session = Session::new(transport);
//!     session.reset(&[16], &[40], &[], 5.0, 0.0)?;
//!     session.set_pin_mode(1, PinMode::DriveHigh)?;
//!     let level = session.read_pin(2)?;
//!     println!("pin 2 is {}", if level { "high" } else { "low" });
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod error;
pub mod i2c;
pub mod pins;
pub mod protocol;
pub mod rom;
pub mod session;
pub mod tables;
pub mod transport;
pub mod voltage;

pub use config::{PowerConfig, ProgrammerConfig, Timing};
pub use error::{Error, Result};
pub use i2c::{BitbangI2c, I2cPins, Wire, WireMaster};
pub use pins::{PinMode, PowerRole, MAX_PINS};
pub use protocol::DeviceInfo;
pub use session::Session;
pub use transport::Transport;

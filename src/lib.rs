//! SHT1x Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic driver for the Sensirion SHT1x and
//! SHT7x temperature and humidity sensors (SHT10, SHT11, SHT15, SHT71, SHT75),
//! built on top of the [`embedded-hal`] traits.
//!
//! The sensor speaks a two-wire serial protocol that looks like I²C but is not
//! compatible with it, so the driver bit-bangs it on two GPIO lines: SCK, which
//! the host always drives, and DATA, which changes direction several times in
//! every transaction.
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits
//! - Designed for `no_std` environments
//! - Handshake failures and measurement timeouts are reported as errors
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! This driver depends on the following `embedded-hal` traits:
//! - [`InputPin`] and [`OutputPin`] for GPIO access, plus [`IoPin`] for
//!   switching direction
//! - [`DelayNs`] for accurate timing
//!
//! # Example
//!
//! ```ignore
//! let mut sht = Sht1x::new(data_pin, clock_pin, delay)?;
//! let reading = sht.read_temperature_and_humidity()?;
//! sht.close()?;
//! ```
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` and logs protocol failures
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod error;
pub mod pin;
pub mod protocol;
pub mod sht1x;

pub use error::{Ack, Error, Signal};
pub use pin::{Gpio, IoPin, Line, PinMode};
pub use protocol::{Command, MIN_SETTLE_NS, Protocol, Timing};
pub use sht1x::{Reading, Sht1x, State};

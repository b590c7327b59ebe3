//! DHT11 Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic driver for the DHT11 temperature
//! and humidity sensor, built on top of the [`embedded-hal`] traits, plus a
//! small loop that reports readings over any serial byte sink.
//!
//! # Features
//! - Blocking synchronous API; the read cycle never yields mid-transfer
//! - Every edge wait bounded by a millisecond timeout budget
//! - Designed for `no_std` environments
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! This driver depends on the following traits:
//! - [`FlexPin`], implemented for any open-drain [`InputPin`] + [`OutputPin`]
//!   through [`OpenDrain`]
//! - [`Timer`], a [`DelayNs`] with a millisecond tick
//! - [`embedded_io::Write`] for the report sink
//!
//! # Example
//!
//! ```ignore
//! let dht = Dht11::new(OpenDrain::new(pin), timer);
//! let mut monitor = Monitor::new(dht, usb_serial);
//! monitor.run_until(|| false);
//! ```
//!
//! The DHT11 must not be sampled more often than about once per second;
//! [`Monitor`] defaults to one read every 10 seconds.
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` and enables log output
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod dht11;
pub mod error;
pub mod frame;
pub mod line;
pub mod monitor;
pub mod report;
pub mod timing;

#[cfg(test)]
mod sim;

pub use dht11::{Config, Dht11, Phase, TimeoutPolicy};
pub use error::DhtError;
pub use frame::{ChecksumMismatch, RawFrame, Reading, validate};
pub use line::{Direction, FlexPin, Line, OpenDrain, Pull};
pub use monitor::{CycleError, Monitor, MonitorConfig};
pub use report::{ReportLine, format_reading};
pub use timing::Timer;

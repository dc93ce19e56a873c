// Register-level drivers for MikroElektronika Click boards
//
// Board independent: every driver is generic over embedded-hal 1.0
// (I2C / SPI / GPIO / delay) or embedded-io (UART). Pin and bus wiring
// lives in the firmware crate.

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod drivers;
pub mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use bus::{I2cRegisters, RegisterBus, SpiRegisters};
pub use error::{Error, Result};

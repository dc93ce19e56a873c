// Board support and cooperative kernel for the Click demo
//
// Drivers live in click-drivers and know nothing about the board;
// this crate wires them to ESP32-C3 peripherals and schedules polling.

#![no_std]

pub mod board;
pub mod kernel;

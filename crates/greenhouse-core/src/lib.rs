//! Hardware-independent core library for the greenhouse sensor node
//!
//! This crate contains all platform-agnostic logic: sensor trait definitions,
//! the DHT11 single-wire decoder, CSV payload framing, the broker link
//! abstraction and the sample/publish control loop.
//!
//! It is `#![no_std]` so it compiles on both the ESP32 firmware and desktop
//! hosts (for the simulator and tests).

#![no_std]

pub mod broker;
pub mod comfort;
pub mod config;
pub mod node;
pub mod payload;
pub mod sensors;

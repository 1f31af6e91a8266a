//! ESP32 firmware-specific modules for the greenhouse sensor node
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: GPIO and ADC access, Wi-Fi association, the MQTT client over the
//! embassy-net stack, and the compile-time node settings.

#![no_std]

extern crate alloc;

pub mod config;
pub mod dht_pin;
pub mod mqtt_link;
pub mod shared_adc;
pub mod wifi;

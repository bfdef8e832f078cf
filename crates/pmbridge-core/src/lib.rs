//! Hardware-independent core library for pmbridge
//!
//! This crate contains all platform-agnostic logic for the particulate sensor
//! bridge: the PM1006 frame parser/relay, sensor and control state, the MQTT
//! publish schedule, update coordination and the cooperative bridge loop.
//! Hardware (UART, I2C, WiFi, flash) is reached only through the traits
//! defined here.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for the simulator and tests).

#![no_std]

pub mod app_state;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod control;
pub mod frame;
pub mod publisher;
pub mod sensors;
pub mod update;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod test_support;

//! Climate sensor wiring for the firmware
//!
//! With the `sensor-sht40` feature the bridge reads an SHT40 on the shared
//! I2C bus; without it the climate topics are never published.

#[cfg(feature = "sensor-sht40")]
mod sht40;

#[cfg(feature = "sensor-sht40")]
pub use sht40::SHT40Sensor;

#[cfg(feature = "sensor-sht40")]
pub type BoardClimate = SHT40Sensor<esp_hal::i2c::master::I2c<'static, esp_hal::Async>>;

#[cfg(not(feature = "sensor-sht40"))]
pub type BoardClimate = pmbridge_core::sensors::NoClimateSensor;

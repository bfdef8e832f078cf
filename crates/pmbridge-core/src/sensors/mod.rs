//! Temperature/humidity sensor abstraction
//!
//! The climate sensor is polled synchronously at publish time. Concrete
//! drivers live in the firmware crate; the core only sees [`ClimateSensor`].

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} not present")]
    Missing { sensor: &'static str },
}

/// One temperature/humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
}

/// Trait for sensors that produce temperature and humidity readings.
pub trait ClimateSensor {
    /// Read the sensor and return a measurement.
    fn read(&mut self) -> impl Future<Output = Result<ClimateReading, SensorError>>;
}

/// Stand-in for builds without a climate sensor. Every read fails, so only
/// particulates get published.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClimateSensor;

impl ClimateSensor for NoClimateSensor {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        Err(SensorError::Missing {
            sensor: "climate sensor",
        })
    }
}

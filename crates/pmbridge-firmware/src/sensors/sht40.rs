use embedded_hal_async::i2c::I2c;
use pmbridge_core::sensors::{ClimateReading, ClimateSensor, SensorError};
use sht4x::Sht4xAsync;

pub struct SHT40Sensor<I> {
    sensor: Sht4xAsync<I, embassy_time::Delay>,
}

impl<I: I2c> SHT40Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, embassy_time::Delay>::new(i2c),
        }
    }
}

impl<I: I2c> ClimateSensor for SHT40Sensor<I> {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let measurement = self
            .sensor
            .measure(sht4x::Precision::High, &mut embassy_time::Delay)
            .await
            .map_err(|e| {
                log::error!("SHT40 measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "SHT40",
                    operation: "measure temperature/humidity",
                    details: "I2C communication error or sensor not responding",
                }
            })?;

        Ok(ClimateReading {
            temperature_celsius: measurement.temperature_celsius().to_num::<f32>(),
            humidity_percent: measurement.humidity_percent().to_num::<f32>(),
        })
    }
}

//! Peripheral bring-up for the bridge board
//!
//! The PM1006 module sits on UART1 at 9600 baud with its TX wired to
//! GPIO18 and its RX to GPIO17. The optional climate sensor shares I2C0
//! on GPIO12 (SDA) and GPIO11 (SCL).

use esp_hal::{
    i2c::master::{Config as I2cConfig, ConfigError as I2cConfigError, I2c},
    peripherals::{GPIO11, GPIO12, GPIO17, GPIO18, I2C0, UART1},
    time::Rate,
    uart::{Config as UartConfig, ConfigError as UartConfigError, Uart},
    Async,
};
use pmbridge_core::config::SENSOR_BAUD_RATE;

/// Open the sensor UART.
///
/// Bytes written here travel to the fan controller on the same wire the
/// module listens on, so the link is full duplex at the sensor's own rate.
pub fn create_sensor_uart(
    uart1: UART1<'static>,
    rx: GPIO18<'static>,
    tx: GPIO17<'static>,
) -> Result<Uart<'static, Async>, UartConfigError> {
    let uart = Uart::new(uart1, UartConfig::default().with_baudrate(SENSOR_BAUD_RATE))?
        .with_rx(rx)
        .with_tx(tx)
        .into_async();
    Ok(uart)
}

/// Initialize the I2C bus for the climate sensor.
pub fn create_i2c_bus(
    i2c0: I2C0<'static>,
    sda: GPIO12<'static>,
    scl: GPIO11<'static>,
) -> Result<I2c<'static, Async>, I2cConfigError> {
    let i2c = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))?
        .with_sda(sda)
        .with_scl(scl)
        .into_async();
    Ok(i2c)
}

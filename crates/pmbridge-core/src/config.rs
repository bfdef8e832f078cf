//! Device configuration and the settings derived from it

use core::fmt::Write;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::app_state::{AppError, FromTruncated};

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_ROOT: &str = "custom";
pub const DEFAULT_PUBLISH_INTERVAL_SECS: u32 = 30;
pub const DEFAULT_CLIENT_ID: &str = "pmbridge";
pub const DEFAULT_DEVICE_NAME: &str = "pmbridge";
/// Baud rate of the particulate sensor link.
pub const SENSOR_BAUD_RATE: u32 = 9600;

/// Capacity of every topic string.
pub const TOPIC_CAPACITY: usize = 64;

pub type Topic = heapless::String<TOPIC_CAPACITY>;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub broker: BrokerConfig<'a>,
    pub device: DeviceConfig<'a>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BrokerConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
}

impl Default for BrokerConfig<'_> {
    fn default() -> Self {
        Self {
            host: "",
            port: DEFAULT_MQTT_PORT,
            client_id: DEFAULT_CLIENT_ID,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeviceConfig<'a> {
    /// Device-scoped segment of every topic.
    pub name: &'a str,
    pub topic_root: &'a str,
    pub publish_interval_secs: u32,
}

impl Default for DeviceConfig<'_> {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME,
            topic_root: DEFAULT_TOPIC_ROOT,
            publish_interval_secs: DEFAULT_PUBLISH_INTERVAL_SECS,
        }
    }
}

/// Topics the bridge talks on, all under `<root>/<device>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub particles: Topic,
    pub temperature: Topic,
    pub humidity: Topic,
    pub set: Topic,
}

impl Topics {
    pub fn new(root: &str, device: &str) -> Result<Self, AppError> {
        Ok(Self {
            particles: topic(root, device, "particles")?,
            temperature: topic(root, device, "temperature")?,
            humidity: topic(root, device, "humidity")?,
            set: topic(root, device, "set")?,
        })
    }
}

fn topic(root: &str, device: &str, leaf: &str) -> Result<Topic, AppError> {
    let mut out = Topic::new();
    write!(out, "{}/{}/{}", root, device, leaf).map_err(|_| {
        AppError::Config(heapless::String::from_truncated(format_args!(
            "topic for {} longer than {} bytes",
            leaf, TOPIC_CAPACITY
        )))
    })?;
    Ok(out)
}

/// Validated runtime settings for the bridge loop.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub topics: Topics,
    pub client_id: heapless::String<32>,
    pub publish_interval: Duration,
}

impl BridgeSettings {
    pub fn from_config(config: &Config<'_>) -> Result<Self, AppError> {
        let device = &config.device;

        if device.name.is_empty() || device.name.contains(['/', '+', '#']) {
            return Err(AppError::Config(heapless::String::from_truncated(
                "device name must be a single non-empty topic level",
            )));
        }

        if device.publish_interval_secs == 0 {
            return Err(AppError::Config(heapless::String::from_truncated(
                "publish interval must be non-zero",
            )));
        }

        let client_id = heapless::String::try_from(config.broker.client_id).map_err(|_| {
            AppError::Config(heapless::String::from_truncated("client id too long"))
        })?;

        Ok(Self {
            topics: Topics::new(device.topic_root, device.name)?,
            client_id,
            publish_interval: Duration::from_secs(u64::from(device.publish_interval_secs)),
        })
    }
}

//! Build-time configuration
//!
//! `build.rs` exports the keys from `.env` as compile-time environment
//! variables. Anything missing falls back to the defaults in
//! [`pmbridge_core::config`].

use pmbridge_core::config::{
    BrokerConfig, Config, DEFAULT_CLIENT_ID, DEFAULT_DEVICE_NAME, DEFAULT_MQTT_PORT,
    DEFAULT_PUBLISH_INTERVAL_SECS, DEFAULT_TOPIC_ROOT, DeviceConfig, InternetConfig,
};

pub fn load() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: option_env!("WIFI_SSID").unwrap_or(""),
            password: option_env!("WIFI_PASSWORD").unwrap_or(""),
        },
        broker: BrokerConfig {
            host: option_env!("MQTT_HOST").unwrap_or(""),
            port: parse_or(option_env!("MQTT_PORT"), DEFAULT_MQTT_PORT),
            client_id: option_env!("MQTT_CLIENT_ID").unwrap_or(DEFAULT_CLIENT_ID),
        },
        device: DeviceConfig {
            name: option_env!("DEVICE_NAME").unwrap_or(DEFAULT_DEVICE_NAME),
            topic_root: option_env!("TOPIC_ROOT").unwrap_or(DEFAULT_TOPIC_ROOT),
            publish_interval_secs: parse_or(
                option_env!("PUBLISH_INTERVAL_SECS"),
                DEFAULT_PUBLISH_INTERVAL_SECS,
            ),
        },
    }
}

fn parse_or<T: core::str::FromStr>(value: Option<&str>, default: T) -> T {
    match value.map(str::parse) {
        Some(Ok(parsed)) => parsed,
        Some(Err(_)) => {
            log::warn!("Ignoring malformed numeric setting {:?}", value);
            default
        }
        None => default,
    }
}

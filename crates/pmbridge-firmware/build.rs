//! Loads build-time configuration from `.env` and sets up linking.

const CONFIG_KEYS: &[&str] = &[
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "MQTT_HOST",
    "MQTT_PORT",
    "MQTT_CLIENT_ID",
    "DEVICE_NAME",
    "TOPIC_ROOT",
    "PUBLISH_INTERVAL_SECS",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in CONFIG_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // Variables already in the environment win over the file
    match dotenvy::dotenv_iter() {
        Ok(entries) => {
            for (key, value) in entries.flatten() {
                if CONFIG_KEYS.contains(&key.as_str()) && std::env::var_os(&key).is_none() {
                    println!("cargo:rustc-env={key}={value}");
                }
            }
        }
        Err(_) => println!("cargo:warning=no .env file found, using environment and defaults"),
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

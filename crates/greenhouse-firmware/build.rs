//! Bakes the node settings from `.env` into the firmware.
//!
//! Every key is re-exported as a `rustc-env` variable so `src/config.rs` can
//! read it with `env!`. Unset keys fall back to the defaults below.

use std::env;

const SETTINGS: &[(&str, &str)] = &[
    ("WIFI_SSID", ""),
    ("WIFI_PASSWORD", ""),
    ("MQTT_HOST", ""),
    ("MQTT_PORT", "1883"),
    ("MQTT_CLIENT_ID", "ESP32_Sensor_Publisher"),
    ("MQTT_USERNAME", ""),
    ("MQTT_PASSWORD", ""),
    ("MQTT_TOPIC", "iot/esp/data"),
    ("MQTT_METRIC_TOPICS", "false"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rustc-link-arg=-Tlinkall.x");

    // A missing .env is fine, the defaults apply.
    let _ = dotenvy::dotenv();

    for (key, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string());

        let value = match *key {
            "MQTT_PORT" => {
                if value.parse::<u16>().is_err() {
                    panic!("MQTT_PORT must be a port number, got {value:?}");
                }
                value
            }
            "MQTT_METRIC_TOPICS" => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => "1".to_string(),
                _ => "0".to_string(),
            },
            _ => value,
        };

        println!("cargo:rustc-env={key}={value}");
    }
}

//! Compile-time node settings, injected from `.env` by the build script.

use greenhouse_core::config::{BrokerConfig, MetricTopics, NodeConfig, WifiConfig};

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

pub const MQTT_HOST: &str = env!("MQTT_HOST");
pub const MQTT_PORT: u16 = match u16::from_str_radix(env!("MQTT_PORT"), 10) {
    Ok(port) => port,
    Err(_) => panic!("MQTT_PORT is not a port number"),
};
pub const MQTT_CLIENT_ID: &str = env!("MQTT_CLIENT_ID");
pub const MQTT_USERNAME: Option<&str> = non_empty(env!("MQTT_USERNAME"));
pub const MQTT_PASSWORD: Option<&str> = non_empty(env!("MQTT_PASSWORD"));
pub const MQTT_TOPIC: &str = env!("MQTT_TOPIC");
pub const MQTT_METRIC_TOPICS: bool = matches!(env!("MQTT_METRIC_TOPICS").as_bytes(), b"1");

const fn non_empty(value: &'static str) -> Option<&'static str> {
    if value.is_empty() { None } else { Some(value) }
}

pub fn node_config() -> NodeConfig<'static> {
    NodeConfig {
        wifi: WifiConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        broker: BrokerConfig {
            host: MQTT_HOST,
            port: MQTT_PORT,
            client_id: MQTT_CLIENT_ID,
            username: MQTT_USERNAME,
            password: MQTT_PASSWORD,
            topic: MQTT_TOPIC,
            metric_topics: MetricTopics::default(),
            ..BrokerConfig::default()
        },
        publish_metric_topics: MQTT_METRIC_TOPICS,
        ..NodeConfig::default()
    }
}

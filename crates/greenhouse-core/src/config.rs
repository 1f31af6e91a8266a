//! Node configuration
//!
//! On the device every value is a compile-time constant, so the structs only
//! borrow `'static` strings. The defaults mirror the deployed greenhouse
//! network layout.

/// Default MQTT port of the broker running on the gateway.
pub const DEFAULT_BROKER_PORT: u16 = 1883;
/// Default MQTT client identifier.
pub const DEFAULT_CLIENT_ID: &str = "ESP32_Sensor_Publisher";
/// Topic carrying the combined CSV frame.
pub const DEFAULT_TOPIC: &str = "iot/esp/data";
pub const DEFAULT_GAS_TOPIC: &str = "iot/esp/co2";
pub const DEFAULT_HUMIDITY_TOPIC: &str = "iot/esp/humidity";
pub const DEFAULT_SOIL_TOPIC: &str = "iot/esp/soil";
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

/// Time between two sample/publish cycles.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 5000;
/// Wait between two failed broker connection attempts.
pub const DEFAULT_RECONNECT_BACKOFF_MS: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Per-metric topics, published in addition to the combined frame when
/// [`NodeConfig::publish_metric_topics`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricTopics<'a> {
    pub gas: &'a str,
    pub humidity: &'a str,
    pub soil: &'a str,
}

impl Default for MetricTopics<'_> {
    fn default() -> Self {
        Self {
            gas: DEFAULT_GAS_TOPIC,
            humidity: DEFAULT_HUMIDITY_TOPIC,
            soil: DEFAULT_SOIL_TOPIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig<'a> {
    /// IPv4 literal or host name of the broker
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub topic: &'a str,
    pub metric_topics: MetricTopics<'a>,
    pub keep_alive_secs: u16,
}

impl Default for BrokerConfig<'_> {
    fn default() -> Self {
        Self {
            host: "",
            port: DEFAULT_BROKER_PORT,
            client_id: DEFAULT_CLIENT_ID,
            username: None,
            password: None,
            topic: DEFAULT_TOPIC,
            metric_topics: MetricTopics::default(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig<'a> {
    pub wifi: WifiConfig<'a>,
    pub broker: BrokerConfig<'a>,
    pub sample_interval_ms: u32,
    pub reconnect_backoff_ms: u32,
    pub publish_metric_topics: bool,
}

impl Default for NodeConfig<'_> {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            broker: BrokerConfig::default(),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
            publish_metric_topics: false,
        }
    }
}

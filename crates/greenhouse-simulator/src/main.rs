//! Desktop simulator for the greenhouse sensor node.
//!
//! Runs the same control loop as the firmware with synthetic sensors. When a
//! broker host is configured the frames go to a real broker through `rumqttc`,
//! otherwise they are only logged.
//!
//! # Environment
//!
//! | Variable                      | Default          |
//! |-------------------------------|------------------|
//! | `GREENHOUSE_BROKER_HOST`      | unset (log only) |
//! | `GREENHOUSE_BROKER_PORT`      | `1883`           |
//! | `GREENHOUSE_CLIENT_ID`        | `ESP32_Sensor_Publisher` |
//! | `GREENHOUSE_TOPIC`            | `iot/esp/data`   |
//! | `GREENHOUSE_INTERVAL_MS`      | `5000`           |
//! | `GREENHOUSE_METRIC_TOPICS`    | `false`          |
//! | `GREENHOUSE_HUMIDITY_FAIL_EVERY` | `7`           |
//!
//! Set `RUST_LOG=info` to see the cycle log.

mod mock;
mod mqtt;

use std::env;
use std::str::FromStr;

use embassy_futures::block_on;
use greenhouse_core::broker::LogOnlyConnector;
use greenhouse_core::config::{BrokerConfig, NodeConfig};
use greenhouse_core::node::SensorNode;
use greenhouse_core::sensors::{GasSensor, SoilSensor};
use log::{info, warn};

use mock::{StdDelay, SyntheticChannel, SyntheticHumidity};
use mqtt::RumqttConnector;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Owned copies of the string settings, borrowed by [`NodeConfig`].
struct Settings {
    host: Option<String>,
    client_id: Option<String>,
    topic: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            host: env::var("GREENHOUSE_BROKER_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
            client_id: env::var("GREENHOUSE_CLIENT_ID").ok(),
            topic: env::var("GREENHOUSE_TOPIC").ok(),
        }
    }

    fn node_config(&self) -> NodeConfig<'_> {
        let defaults = NodeConfig::default();
        let broker_defaults = BrokerConfig::default();

        NodeConfig {
            broker: BrokerConfig {
                host: self.host.as_deref().unwrap_or(broker_defaults.host),
                port: env_or("GREENHOUSE_BROKER_PORT", broker_defaults.port),
                client_id: self
                    .client_id
                    .as_deref()
                    .unwrap_or(broker_defaults.client_id),
                topic: self.topic.as_deref().unwrap_or(broker_defaults.topic),
                ..broker_defaults
            },
            sample_interval_ms: env_or("GREENHOUSE_INTERVAL_MS", defaults.sample_interval_ms),
            publish_metric_topics: env_or("GREENHOUSE_METRIC_TOPICS", false),
            ..defaults
        }
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting greenhouse-node simulator");

    let settings = Settings::from_env();
    let config = settings.node_config();
    let fail_every: u32 = env_or("GREENHOUSE_HUMIDITY_FAIL_EVERY", 7);

    let mut node = SensorNode::new(
        config,
        GasSensor::gas(SyntheticChannel::gas()),
        SyntheticHumidity::new(Some(fail_every)),
        SoilSensor::soil(SyntheticChannel::soil()),
        StdDelay,
    );

    info!(
        "Sampling every {} ms, humidity fails every {} reads",
        config.sample_interval_ms, fail_every
    );

    if settings.host.is_some() {
        let mut connector = RumqttConnector::new(&config.broker);
        block_on(node.run(&mut connector))
    } else {
        info!("GREENHOUSE_BROKER_HOST not set, publishing to the log only");
        let mut connector = LogOnlyConnector::new();
        block_on(node.run(&mut connector))
    }
}

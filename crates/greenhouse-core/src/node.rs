//! The sample/publish control loop
//!
//! One cycle is: service the broker link, read gas, humidity and soil, publish
//! the CSV frame unless the humidity reading is invalid, log a summary line and
//! sleep for the sample interval. When the link drops the node reconnects,
//! retrying with a fixed backoff until the broker accepts it.

use core::fmt::{self, Display, Write};

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info, warn};

use crate::broker::{BrokerConnector, BrokerLink};
use crate::comfort::{ComfortBands, ComfortReport};
use crate::config::NodeConfig;
use crate::payload::SensorFrame;
use crate::sensors::{AnalogReading, Humidity, Sensor};

/// Why a cycle did not publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The humidity read failed or produced an impossible value.
    InvalidHumidity,
    /// One of the analog conversions failed.
    SensorFault,
    /// The frame could not be rendered.
    Encoding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    Published(SensorFrame),
    Skipped(SkipReason),
    /// Servicing the link or publishing failed; the session has to be rebuilt.
    LinkLost,
}

/// Result of one connection attempt, see [`SensorNode::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The broker refused or could not be reached; the backoff was applied.
    ConnectFailed,
    /// A session ran until the link dropped.
    SessionEnded { cycles: u32 },
}

/// A sensor node publishing gas, humidity and soil readings.
pub struct SensorNode<'c, G, H, S, D> {
    config: NodeConfig<'c>,
    bands: ComfortBands,
    gas: G,
    humidity: H,
    soil: S,
    delay: D,
    cycles: u32,
}

impl<'c, G, H, S, D> SensorNode<'c, G, H, S, D>
where
    G: Sensor<Readings = AnalogReading>,
    H: Sensor,
    H::Readings: Humidity,
    S: Sensor<Readings = AnalogReading>,
    D: DelayNs,
{
    pub fn new(config: NodeConfig<'c>, gas: G, humidity: H, soil: S, delay: D) -> Self {
        Self {
            config,
            bands: ComfortBands::default(),
            gas,
            humidity,
            soil,
            delay,
            cycles: 0,
        }
    }

    /// Number of cycles run since start-up.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Run forever: connect, cycle while connected, reconnect when the link drops.
    pub async fn run<C: BrokerConnector>(&mut self, connector: &mut C) -> ! {
        loop {
            self.step(connector).await;
        }
    }

    /// One connection attempt followed, on success, by a session that lasts
    /// until the link drops.
    ///
    /// A failed attempt waits the reconnect backoff, and so does a session that
    /// drops before its first cycle. A session that ran cycles returns without
    /// waiting so the next attempt starts right away.
    pub async fn step<C: BrokerConnector>(&mut self, connector: &mut C) -> StepOutcome {
        let broker = &self.config.broker;
        info!(
            "Attempting MQTT connection to {}:{} as {}...",
            broker.host, broker.port, broker.client_id
        );

        match connector.connect().await {
            Ok(mut link) => {
                info!("MQTT connected");
                let cycles = self.run_session(&mut link).await;
                warn!("MQTT link lost after {} cycles", cycles);
                if cycles == 0 {
                    // The session died before the first cycle and no interval
                    // delay ran, so back off as for a refused connection.
                    self.delay.delay_ms(self.config.reconnect_backoff_ms).await;
                }
                StepOutcome::SessionEnded { cycles }
            }
            Err(e) => {
                warn!(
                    "MQTT connection failed: {:?}, trying again in {} ms",
                    e, self.config.reconnect_backoff_ms
                );
                self.delay.delay_ms(self.config.reconnect_backoff_ms).await;
                StepOutcome::ConnectFailed
            }
        }
    }

    /// Cycle at the sample interval until the link drops. Returns the number
    /// of cycles run on this link.
    pub async fn run_session<L: BrokerLink>(&mut self, link: &mut L) -> u32 {
        let mut cycles = 0;
        while link.is_connected() {
            let outcome = self.run_cycle(link).await;
            cycles += 1;

            self.delay.delay_ms(self.config.sample_interval_ms).await;

            if outcome == CycleOutcome::LinkLost {
                break;
            }
        }
        cycles
    }

    /// Sample all sensors once and publish the frame.
    pub async fn run_cycle<L: BrokerLink>(&mut self, link: &mut L) -> CycleOutcome {
        self.cycles = self.cycles.wrapping_add(1);

        if let Err(e) = link.maintain().await {
            error!("MQTT keep-alive failed: {:?}", e);
            return CycleOutcome::LinkLost;
        }

        let gas = self.gas.read().await.map(|r| r.raw);
        let humidity = self
            .humidity
            .read()
            .await
            .map(|r| r.relative_humidity());
        let soil = self.soil.read().await.map(|r| r.raw);

        let outcome = match (gas, humidity, soil) {
            (_, Err(e), _) => {
                warn!("Humidity read failed ({}), not publishing this cycle", e);
                CycleOutcome::Skipped(SkipReason::InvalidHumidity)
            }
            (Ok(gas), Ok(humidity), Ok(soil)) => match SensorFrame::new(gas, humidity, soil) {
                Ok(frame) => self.publish(link, &frame).await,
                Err(_) => {
                    warn!(
                        "Humidity reading {} is not a valid percentage, not publishing this cycle",
                        humidity
                    );
                    CycleOutcome::Skipped(SkipReason::InvalidHumidity)
                }
            },
            _ => CycleOutcome::Skipped(SkipReason::SensorFault),
        };

        info!(
            "CO2: {} | Humidity: {:.2} | Soil: {}",
            Shown(gas.ok()),
            Shown(humidity.ok()),
            Shown(soil.ok())
        );

        outcome
    }

    async fn publish<L: BrokerLink>(&mut self, link: &mut L, frame: &SensorFrame) -> CycleOutcome {
        let payload = match frame.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode frame {:?}: {}", frame, e);
                return CycleOutcome::Skipped(SkipReason::Encoding);
            }
        };

        let topic = self.config.broker.topic;
        if let Err(e) = link.publish(topic, payload.as_bytes()).await {
            error!("Publish to {} failed: {:?}", topic, e);
            return CycleOutcome::LinkLost;
        }
        info!("Published to {}: {}", topic, payload);

        if self.config.publish_metric_topics {
            let topics = self.config.broker.metric_topics;
            let mut values: [(&str, String<16>); 3] = Default::default();
            values[0].0 = topics.gas;
            values[1].0 = topics.humidity;
            values[2].0 = topics.soil;
            // Values are at most 6 characters, the writes cannot overflow.
            let _ = write!(values[0].1, "{}", frame.gas);
            let _ = write!(values[1].1, "{:.2}", frame.humidity);
            let _ = write!(values[2].1, "{}", frame.soil);

            for (topic, value) in &values {
                if let Err(e) = link.publish(topic, value.as_bytes()).await {
                    error!("Publish to {} failed: {:?}", topic, e);
                    return CycleOutcome::LinkLost;
                }
            }
        }

        let report = ComfortReport::assess(frame, &self.bands);
        if report.needs_attention() {
            warn!(
                "Reading outside comfort band: CO2 {} | Humidity {}",
                report.gas.label(),
                report.humidity.label()
            );
        }

        CycleOutcome::Published(*frame)
    }
}

/// Displays a reading, or `n/a` when the sensor failed.
struct Shown<T>(Option<T>);

impl<T: Display> Display for Shown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::broker::LogOnlyConnector;
    use crate::sensors::{AnalogChannel, AnalogSensor, Dht11Reading, SensorError};
    use core::cell::RefCell;
    use embassy_futures::block_on;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::string::{String as StdString, ToString};
    use std::vec::Vec;

    std::thread_local! {
        static CAPTURED: RefCell<Vec<StdString>> = const { RefCell::new(Vec::new()) };
    }

    /// Records log messages of the current test thread.
    struct CapturingLogger;

    impl log::Log for CapturingLogger {
        fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            CAPTURED.with(|lines| lines.borrow_mut().push(record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger;

    fn capture_logs() {
        // Another test may have installed it already.
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Info);
        CAPTURED.with(|lines| lines.borrow_mut().clear());
    }

    fn logged(line: &str) -> bool {
        CAPTURED.with(|lines| lines.borrow().iter().any(|l| l.as_str() == line))
    }

    struct FixedChannel(u16);

    impl AnalogChannel for FixedChannel {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            Ok(self.0)
        }
    }

    struct FailingChannel;

    impl AnalogChannel for FailingChannel {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            Err(SensorError::ReadFailed {
                sensor: "MQ135",
                operation: "convert",
                details: "ADC busy",
            })
        }
    }

    /// Humidity sensor replaying scripted readings, then repeating the last one.
    struct ScriptedHumidity {
        script: VecDeque<Result<f32, SensorError>>,
        last: Result<f32, SensorError>,
    }

    impl ScriptedHumidity {
        fn new(script: &[Result<f32, SensorError>]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                last: Ok(50.0),
            }
        }
    }

    impl Sensor for ScriptedHumidity {
        type Readings = Dht11Reading;

        async fn read(&mut self) -> Result<Dht11Reading, SensorError> {
            if let Some(next) = self.script.pop_front() {
                self.last = next;
            }
            self.last.map(|relative_humidity| Dht11Reading {
                relative_humidity,
                temperature_celsius: 24.0,
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDelay {
        calls: Rc<RefCell<Vec<u32>>>,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.calls.borrow_mut().push(ms);
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        refusals: u32,
        /// Hand out links that are already disconnected
        dead_links: bool,
        /// Publishes accepted per link before it drops
        drop_after: Option<usize>,
        published: Vec<(StdString, StdString)>,
        connects: u32,
    }

    #[derive(Debug)]
    struct Refused;

    impl BrokerConnector for FakeConnector {
        type Error = Refused;
        type Link<'a>
            = FakeLink<'a>
        where
            Self: 'a;

        async fn connect(&mut self) -> Result<FakeLink<'_>, Refused> {
            self.connects += 1;
            if self.refusals > 0 {
                self.refusals -= 1;
                return Err(Refused);
            }
            Ok(FakeLink {
                remaining: self.drop_after,
                published: &mut self.published,
                connected: !self.dead_links,
            })
        }
    }

    struct FakeLink<'a> {
        remaining: Option<usize>,
        published: &'a mut Vec<(StdString, StdString)>,
        connected: bool,
    }

    impl BrokerLink for FakeLink<'_> {
        type Error = Refused;

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn maintain(&mut self) -> Result<(), Refused> {
            Ok(())
        }

        async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Refused> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    self.connected = false;
                    return Err(Refused);
                }
                *remaining -= 1;
            }
            self.published.push((
                topic.to_string(),
                StdString::from_utf8(payload.to_vec()).unwrap(),
            ));
            Ok(())
        }
    }

    type TestNode = SensorNode<
        'static,
        AnalogSensor<FixedChannel>,
        ScriptedHumidity,
        AnalogSensor<FixedChannel>,
        RecordingDelay,
    >;

    fn node(humidity: &[Result<f32, SensorError>], config: NodeConfig<'static>) -> TestNode {
        SensorNode::new(
            config,
            AnalogSensor::gas(FixedChannel(412)),
            ScriptedHumidity::new(humidity),
            AnalogSensor::soil(FixedChannel(2890)),
            RecordingDelay::default(),
        )
    }

    const DHT_TIMEOUT: SensorError = SensorError::Timeout {
        sensor: "DHT11",
        operation: "sensor response",
    };

    #[test]
    fn test_valid_cycle_publishes_csv_frame() {
        let mut node = node(&[Ok(55.0)], NodeConfig::default());
        let mut connector = FakeConnector::default();

        let outcome = block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert_eq!(
            outcome,
            CycleOutcome::Published(SensorFrame::new(412, 55.0, 2890).unwrap())
        );
        assert_eq!(
            connector.published,
            [("iot/esp/data".to_string(), "412,55.00,2890".to_string())]
        );
    }

    #[test]
    fn test_failed_humidity_read_skips_publish() {
        let mut node = node(&[Err(DHT_TIMEOUT)], NodeConfig::default());
        let mut connector = FakeConnector::default();

        let outcome = block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::InvalidHumidity));
        assert!(connector.published.is_empty());
    }

    #[test]
    fn test_impossible_humidity_skips_publish() {
        let mut node = node(&[Ok(f32::NAN)], NodeConfig::default());
        let mut connector = FakeConnector::default();

        let outcome = block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::InvalidHumidity));
        assert!(connector.published.is_empty());
    }

    #[test]
    fn test_analog_fault_skips_publish() {
        let mut node = SensorNode::new(
            NodeConfig::default(),
            AnalogSensor::gas(FailingChannel),
            ScriptedHumidity::new(&[Ok(55.0)]),
            AnalogSensor::soil(FixedChannel(2890)),
            RecordingDelay::default(),
        );
        let mut connector = FakeConnector::default();

        let outcome = block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::SensorFault));
        assert!(connector.published.is_empty());
    }

    #[test]
    fn test_metric_topics_follow_combined_frame() {
        let config = NodeConfig {
            publish_metric_topics: true,
            ..NodeConfig::default()
        };
        let mut node = node(&[Ok(61.5)], config);
        let mut connector = FakeConnector::default();

        block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        let published: Vec<(&str, &str)> = connector
            .published
            .iter()
            .map(|(topic, payload)| (topic.as_str(), payload.as_str()))
            .collect();
        assert_eq!(
            published,
            [
                ("iot/esp/data", "412,61.50,2890"),
                ("iot/esp/co2", "412"),
                ("iot/esp/humidity", "61.50"),
                ("iot/esp/soil", "2890"),
            ]
        );
    }

    #[test]
    fn test_session_cycles_at_fixed_interval_until_link_drops() {
        let mut node = node(&[Ok(55.0)], NodeConfig::default());
        let delays = node.delay.calls.clone();
        let mut connector = FakeConnector {
            drop_after: Some(3),
            ..FakeConnector::default()
        };

        let outcome = block_on(node.step(&mut connector));

        // Three publishes succeed, the fourth fails and ends the session.
        assert_eq!(outcome, StepOutcome::SessionEnded { cycles: 4 });
        assert_eq!(connector.published.len(), 3);
        assert_eq!(*delays.borrow(), [5000; 4]);
        assert_eq!(node.cycles(), 4);
    }

    #[test]
    fn test_skipped_cycles_keep_the_cadence() {
        let mut node = node(&[Err(DHT_TIMEOUT), Ok(55.0)], NodeConfig::default());
        let delays = node.delay.calls.clone();
        let mut connector = FakeConnector {
            drop_after: Some(1),
            ..FakeConnector::default()
        };

        let outcome = block_on(node.step(&mut connector));

        assert_eq!(outcome, StepOutcome::SessionEnded { cycles: 3 });
        assert_eq!(connector.published.len(), 1);
        assert_eq!(delays.borrow().len(), 3);
    }

    #[test]
    fn test_refused_connection_waits_backoff_then_retries() {
        let config = NodeConfig {
            reconnect_backoff_ms: 1234,
            ..NodeConfig::default()
        };
        let mut node = node(&[Ok(55.0)], config);
        let delays = node.delay.calls.clone();
        let mut connector = FakeConnector {
            refusals: 2,
            drop_after: Some(0),
            ..FakeConnector::default()
        };

        block_on(async {
            assert_eq!(node.step(&mut connector).await, StepOutcome::ConnectFailed);
            assert_eq!(node.step(&mut connector).await, StepOutcome::ConnectFailed);
            assert_eq!(
                node.step(&mut connector).await,
                StepOutcome::SessionEnded { cycles: 1 }
            );
        });

        assert_eq!(connector.connects, 3);
        assert_eq!(*delays.borrow(), [1234, 1234, 5000]);
    }

    #[test]
    fn test_dropped_session_reconnects_without_backoff() {
        let mut node = node(&[Ok(55.0)], NodeConfig::default());
        let delays = node.delay.calls.clone();
        let mut connector = FakeConnector {
            drop_after: Some(1),
            ..FakeConnector::default()
        };

        block_on(async {
            node.step(&mut connector).await;
            node.step(&mut connector).await;
        });

        assert_eq!(connector.connects, 2);
        assert_eq!(connector.published.len(), 2);
        // Only sample intervals, no reconnect backoff in between.
        assert!(delays.borrow().iter().all(|&ms| ms == 5000));
    }

    #[test]
    fn test_session_dead_on_arrival_waits_backoff() {
        let config = NodeConfig {
            reconnect_backoff_ms: 1234,
            ..NodeConfig::default()
        };
        let mut node = node(&[Ok(55.0)], config);
        let delays = node.delay.calls.clone();
        let mut connector = FakeConnector {
            dead_links: true,
            ..FakeConnector::default()
        };

        block_on(async {
            for _ in 0..3 {
                assert_eq!(
                    node.step(&mut connector).await,
                    StepOutcome::SessionEnded { cycles: 0 }
                );
            }
        });

        assert_eq!(connector.connects, 3);
        assert!(connector.published.is_empty());
        assert_eq!(*delays.borrow(), [1234; 3]);
    }

    #[test]
    fn test_log_only_cycle_logs_payload_and_summary() {
        capture_logs();
        let mut node = node(&[Ok(55.0)], NodeConfig::default());
        let mut connector = LogOnlyConnector::new();

        let outcome = block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert!(matches!(outcome, CycleOutcome::Published(_)));
        assert_eq!(connector.published(), 1);
        assert!(logged("mqtt(LOG): topic='iot/esp/data' payload='412,55.00,2890'"));
        assert!(logged("Published to iot/esp/data: 412,55.00,2890"));
        assert!(logged("CO2: 412 | Humidity: 55.00 | Soil: 2890"));
    }

    #[test]
    fn test_log_only_skipped_cycle_shows_missing_humidity() {
        capture_logs();
        let mut node = node(&[Err(DHT_TIMEOUT)], NodeConfig::default());
        let mut connector = LogOnlyConnector::new();

        block_on(async {
            let mut link = connector.connect().await.unwrap();
            node.run_cycle(&mut link).await
        });

        assert_eq!(connector.published(), 0);
        assert!(logged("CO2: 412 | Humidity: n/a | Soil: 2890"));
    }
}

//! Broker link abstraction
//!
//! Decouples the control loop from a specific MQTT client crate. The firmware
//! implements these traits over `rust-mqtt` and an embassy-net TCP socket, the
//! simulator over `rumqttc`.
//!
//! A link borrows its connector for as long as it lives: clients on the
//! device borrow socket and packet buffers owned by the connector, so a new
//! link can only be created once the previous one is dropped.

use core::convert::Infallible;
use core::fmt::Debug;

use log::info;

/// A connected session with the broker.
///
/// Messages are published with QoS 0 and without the retain flag.
pub trait BrokerLink {
    type Error: Debug;

    /// Whether the session is still believed to be alive.
    fn is_connected(&self) -> bool;

    /// Service the connection (keep-alive, incoming traffic).
    fn maintain(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Opens broker sessions.
pub trait BrokerConnector {
    type Error: Debug;
    type Link<'a>: BrokerLink
    where
        Self: 'a;

    /// Single connection attempt. Retrying is up to the caller.
    fn connect(&mut self) -> impl Future<Output = Result<Self::Link<'_>, Self::Error>>;
}

/// Connector that never touches the network and only logs what would be
/// published. Used when no broker is configured.
#[derive(Debug, Default)]
pub struct LogOnlyConnector {
    published: u32,
}

impl LogOnlyConnector {
    pub const fn new() -> Self {
        Self { published: 0 }
    }

    /// Number of messages logged so far.
    pub const fn published(&self) -> u32 {
        self.published
    }
}

impl BrokerConnector for LogOnlyConnector {
    type Error = Infallible;
    type Link<'a>
        = LogOnlyLink<'a>
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<LogOnlyLink<'_>, Infallible> {
        info!("mqtt(LOG): log-only mode, no broker configured");
        Ok(LogOnlyLink {
            published: &mut self.published,
        })
    }
}

pub struct LogOnlyLink<'a> {
    published: &'a mut u32,
}

impl BrokerLink for LogOnlyLink<'_> {
    type Error = Infallible;

    fn is_connected(&self) -> bool {
        true
    }

    async fn maintain(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Infallible> {
        *self.published = self.published.wrapping_add(1);
        info!(
            "mqtt(LOG): topic='{}' payload='{}'",
            topic,
            core::str::from_utf8(payload).unwrap_or("<binary>")
        );
        Ok(())
    }
}

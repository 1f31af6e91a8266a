//! Broker link over `rumqttc`'s blocking client.
//!
//! `connect` drives the event loop until the broker acknowledges the session,
//! then hands the connection to a worker thread that keeps it serviced and
//! flags the link as lost on the first connection error.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use greenhouse_core::broker::{BrokerConnector, BrokerLink};
use greenhouse_core::config::BrokerConfig;
use log::{debug, warn};
use rumqttc::{Client, ClientError, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS};

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 10;

#[derive(Debug)]
pub enum LinkError {
    Client(ClientError),
    Connection(ConnectionError),
    Refused(ConnectReturnCode),
    /// The event loop stopped before the broker answered.
    Closed,
}

pub struct RumqttConnector {
    options: MqttOptions,
}

impl RumqttConnector {
    pub fn new(config: &BrokerConfig<'_>) -> Self {
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs as u64));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }

        Self { options }
    }
}

impl BrokerConnector for RumqttConnector {
    type Error = LinkError;
    type Link<'a>
        = RumqttLink<'a>
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<RumqttLink<'_>, LinkError> {
        let (client, mut connection) = Client::new(self.options.clone(), REQUEST_CAPACITY);

        {
            let mut events = connection.iter();
            loop {
                match events.next() {
                    Some(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                        if ack.code != ConnectReturnCode::Success {
                            return Err(LinkError::Refused(ack.code));
                        }
                        break;
                    }
                    Some(Ok(event)) => debug!("mqtt: {:?}", event),
                    Some(Err(e)) => return Err(LinkError::Connection(e)),
                    None => return Err(LinkError::Closed),
                }
            }
        }

        let connected = Arc::new(AtomicBool::new(true));
        let flag = connected.clone();
        thread::spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(event) => debug!("mqtt: {:?}", event),
                    Err(e) => {
                        warn!("mqtt: connection error: {}", e);
                        break;
                    }
                }
            }
            flag.store(false, Ordering::Release);
        });

        Ok(RumqttLink {
            client,
            connected,
            _connector: PhantomData,
        })
    }
}

pub struct RumqttLink<'a> {
    client: Client,
    connected: Arc<AtomicBool>,
    _connector: PhantomData<&'a mut RumqttConnector>,
}

impl BrokerLink for RumqttLink<'_> {
    type Error = LinkError;

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn maintain(&mut self) -> Result<(), LinkError> {
        // Keep-alive is handled by the worker thread.
        if self.is_connected() {
            Ok(())
        } else {
            Err(LinkError::Closed)
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(LinkError::Client)
    }
}

impl Drop for RumqttLink<'_> {
    fn drop(&mut self) {
        let _ = self.client.disconnect();
    }
}

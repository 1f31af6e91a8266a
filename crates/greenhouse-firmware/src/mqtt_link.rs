//! MQTT broker link over an embassy-net TCP socket
//!
//! The connector owns the socket and packet buffers; every link created by
//! [`MqttConnector::connect`] borrows them, so only one session exists at a
//! time and a dropped session frees the buffers for the next attempt.

use core::net::Ipv4Addr;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, Instant};
use greenhouse_core::broker::{BrokerConnector, BrokerLink};
use greenhouse_core::config::BrokerConfig;
use log::debug;
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use thiserror_no_std::Error;

const SOCKET_BUFFER_LEN: usize = 1024;
/// Largest MQTT packet exchanged with the broker.
const PACKET_BUFFER_LEN: usize = 256;
const MAX_PROPERTIES: usize = 5;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("DNS lookup failed: {0:?}")]
    Dns(embassy_net::dns::Error),
    #[error("broker host has no IPv4 address")]
    NoAddress,
    #[error("TCP connect failed: {0:?}")]
    Tcp(ConnectError),
    #[error("MQTT error: {0:?}")]
    Mqtt(ReasonCode),
}

pub struct MqttConnector<'s> {
    stack: Stack<'s>,
    broker: BrokerConfig<'static>,
    rx_buffer: [u8; SOCKET_BUFFER_LEN],
    tx_buffer: [u8; SOCKET_BUFFER_LEN],
    write_buffer: [u8; PACKET_BUFFER_LEN],
    recv_buffer: [u8; PACKET_BUFFER_LEN],
}

impl<'s> MqttConnector<'s> {
    pub const fn new(stack: Stack<'s>, broker: BrokerConfig<'static>) -> Self {
        Self {
            stack,
            broker,
            rx_buffer: [0; SOCKET_BUFFER_LEN],
            tx_buffer: [0; SOCKET_BUFFER_LEN],
            write_buffer: [0; PACKET_BUFFER_LEN],
            recv_buffer: [0; PACKET_BUFFER_LEN],
        }
    }

    /// The broker host may be an IPv4 literal or a name served by DHCP's DNS.
    async fn resolve(&self) -> Result<IpAddress, LinkError> {
        if let Ok(address) = self.broker.host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(address));
        }

        let addresses = self
            .stack
            .dns_query(self.broker.host, DnsQueryType::A)
            .await
            .map_err(LinkError::Dns)?;
        addresses.first().copied().ok_or(LinkError::NoAddress)
    }
}

impl<'s> BrokerConnector for MqttConnector<'s> {
    type Error = LinkError;
    type Link<'a>
        = MqttLink<'a>
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<MqttLink<'_>, LinkError> {
        let address = self.resolve().await?;
        debug!("mqtt: broker resolved to {}", address);

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket
            .connect((address, self.broker.port))
            .await
            .map_err(LinkError::Tcp)?;

        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        config.add_client_id(self.broker.client_id);
        config.max_packet_size = PACKET_BUFFER_LEN as u32;
        config.keep_alive = self.broker.keep_alive_secs;
        if let (Some(username), Some(password)) = (self.broker.username, self.broker.password) {
            config.add_username(username);
            config.add_password(password);
        }

        let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
            socket,
            &mut self.write_buffer,
            PACKET_BUFFER_LEN,
            &mut self.recv_buffer,
            PACKET_BUFFER_LEN,
            config,
        );
        client.connect_to_broker().await.map_err(LinkError::Mqtt)?;

        // Ping at half the keep-alive so the broker never times the session out,
        // even when cycles are skipped and nothing is published.
        let ping_after = Duration::from_secs((self.broker.keep_alive_secs / 2).max(1) as u64);

        Ok(MqttLink {
            client,
            connected: true,
            last_activity: Instant::now(),
            ping_after,
        })
    }
}

pub struct MqttLink<'a> {
    client: MqttClient<'a, TcpSocket<'a>, MAX_PROPERTIES, CountingRng>,
    connected: bool,
    last_activity: Instant,
    ping_after: Duration,
}

impl BrokerLink for MqttLink<'_> {
    type Error = LinkError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn maintain(&mut self) -> Result<(), LinkError> {
        if self.last_activity.elapsed() < self.ping_after {
            return Ok(());
        }

        self.client.send_ping().await.map_err(|e| {
            self.connected = false;
            LinkError::Mqtt(e)
        })?;
        self.last_activity = Instant::now();
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        self.client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
            .map_err(|e| {
                self.connected = false;
                LinkError::Mqtt(e)
            })?;
        self.last_activity = Instant::now();
        Ok(())
    }
}

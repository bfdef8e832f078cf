//! MQTT session over an embassy-net TCP socket
//!
//! `rust-mqtt` borrows its transport and buffers for as long as a client
//! value lives, so [`MqttLink`] keeps those and builds a short-lived client
//! for each operation. The session itself lives on the broker side and in
//! the TCP connection, which is all that needs to persist between calls.

use core::net::Ipv4Addr;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, Instant};
use log::{debug, info};
use pmbridge_core::app_state::FromTruncated;
use pmbridge_core::publisher::{BrokerClient, INBOUND_PAYLOAD_CAPACITY, InboundMessage};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use thiserror_no_std::Error;

pub const MQTT_BUFFER_SIZE: usize = 512;
const MAX_PROPERTIES: usize = 5;
const KEEP_ALIVE_SECS: u16 = 60;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum MqttError {
    #[error("network is down")]
    NetworkDown,
    #[error("broker host is not configured")]
    NoHost,
    #[error("DNS lookup for broker failed")]
    Dns,
    #[error("TCP connect failed: {0:?}")]
    Tcp(ConnectError),
    #[error("MQTT protocol error: {0:?}")]
    Protocol(ReasonCode),
    #[error("not connected")]
    NotConnected,
}

type Client<'c, 'a> = MqttClient<'c, &'c mut TcpSocket<'a>, MAX_PROPERTIES, CountingRng>;

/// Broker connection used by the bridge publisher.
pub struct MqttLink<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
    host: &'a str,
    port: u16,
    client_id: heapless::String<32>,
    write_buffer: [u8; MQTT_BUFFER_SIZE],
    recv_buffer: [u8; MQTT_BUFFER_SIZE],
    connected: bool,
    last_ping: Instant,
}

impl<'a> MqttLink<'a> {
    pub fn new(stack: Stack<'a>, socket: TcpSocket<'a>, host: &'a str, port: u16) -> Self {
        Self {
            stack,
            socket,
            host,
            port,
            client_id: heapless::String::new(),
            write_buffer: [0; MQTT_BUFFER_SIZE],
            recv_buffer: [0; MQTT_BUFFER_SIZE],
            connected: false,
            last_ping: Instant::MIN,
        }
    }

    fn client(&mut self) -> Client<'_, 'a> {
        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20_000));
        config.add_max_subscribe_qos(QualityOfService::QoS0);
        config.add_client_id(&self.client_id);
        config.keep_alive = KEEP_ALIVE_SECS;
        config.max_packet_size = MQTT_BUFFER_SIZE as u32;

        MqttClient::<_, MAX_PROPERTIES, _>::new(
            &mut self.socket,
            &mut self.write_buffer,
            MQTT_BUFFER_SIZE,
            &mut self.recv_buffer,
            MQTT_BUFFER_SIZE,
            config,
        )
    }

    async fn resolve(&self) -> Result<IpAddress, MqttError> {
        if self.host.is_empty() {
            return Err(MqttError::NoHost);
        }
        if let Ok(ip) = self.host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }

        let addresses = self
            .stack
            .dns_query(self.host, DnsQueryType::A)
            .await
            .map_err(|_| MqttError::Dns)?;
        addresses.first().copied().ok_or(MqttError::Dns)
    }

    /// Mark the session dead so the publisher reconnects next pass.
    fn drop_session<E>(&mut self, error: E) -> E {
        self.connected = false;
        self.socket.abort();
        error
    }

    async fn keep_alive(&mut self) -> Result<(), MqttError> {
        let half = Duration::from_secs(u64::from(KEEP_ALIVE_SECS / 2));
        if Instant::now().saturating_duration_since(self.last_ping) < half {
            return Ok(());
        }

        let result = self.client().send_ping().await;
        match result {
            Ok(()) => {
                self.last_ping = Instant::now();
                Ok(())
            }
            Err(code) => Err(self.drop_session(MqttError::Protocol(code))),
        }
    }
}

impl BrokerClient for MqttLink<'_> {
    type Error = MqttError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, client_id: &str) -> Result<(), MqttError> {
        self.connected = false;
        self.socket.abort();
        let _ = self.socket.flush().await;

        self.client_id = heapless::String::from_truncated(client_id);
        if !self.stack.is_config_up() {
            return Err(MqttError::NetworkDown);
        }
        let address = self.resolve().await?;
        info!("Connecting to broker {}:{}", address, self.port);

        self.socket.set_timeout(Some(SOCKET_TIMEOUT));
        self.socket
            .connect((address, self.port))
            .await
            .map_err(|e| self.drop_session(MqttError::Tcp(e)))?;

        let result = self.client().connect_to_broker().await;
        result.map_err(|code| self.drop_session(MqttError::Protocol(code)))?;

        self.connected = true;
        self.last_ping = Instant::now();
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        let result = self.client().subscribe_to_topic(topic).await;
        result.map_err(|code| self.drop_session(MqttError::Protocol(code)))
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        let result = self
            .client()
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await;
        result.map_err(|code| self.drop_session(MqttError::Protocol(code)))
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, MqttError> {
        if !self.connected {
            return Ok(None);
        }
        if !self.socket.can_recv() {
            self.keep_alive().await?;
            return Ok(None);
        }

        let mut client = self.client();
        let message = match client.receive_message().await {
            Ok((topic, payload)) => {
                let kept = payload.len().min(INBOUND_PAYLOAD_CAPACITY);
                debug!("Received {} bytes on {}", payload.len(), topic);
                Ok(InboundMessage {
                    topic: heapless::String::from_truncated(topic),
                    payload: heapless::Vec::from_slice(&payload[..kept]).unwrap_or_default(),
                })
            }
            Err(code) => Err(code),
        };
        drop(client);

        message
            .map(Some)
            .map_err(|code| self.drop_session(MqttError::Protocol(code)))
    }
}

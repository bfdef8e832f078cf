//! Network publisher: periodic sensor publishes and the control subscription
//!
//! Every loop iteration the publisher makes sure the broker session is up
//! (reconnecting and re-subscribing without backoff), publishes when the
//! interval elapsed, and drains inbound messages looking for control values.

use core::fmt::Write;

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::app_state::AppState;
use crate::config::{BridgeSettings, Topic, Topics};
use crate::control::ControlValue;
use crate::sensors::ClimateSensor;

/// Largest inbound payload kept. Control values need far less.
pub const INBOUND_PAYLOAD_CAPACITY: usize = 32;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub payload: heapless::Vec<u8, INBOUND_PAYLOAD_CAPACITY>,
}

/// Minimal broker session the publisher drives.
///
/// Implementations own the transport. Any failure should leave
/// `is_connected` returning `false` so the next iteration reconnects.
pub trait BrokerClient {
    type Error: core::fmt::Debug;

    fn is_connected(&self) -> bool;

    /// Open a session with the given client id.
    fn connect(&mut self, client_id: &str) -> impl Future<Output = Result<(), Self::Error>>;

    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), Self::Error>>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Return the next pending inbound message without waiting for one.
    fn poll(&mut self) -> impl Future<Output = Result<Option<InboundMessage>, Self::Error>>;
}

/// Tracks when the next publish is due.
#[derive(Debug, Clone, Copy)]
pub struct PublishSchedule {
    interval: Duration,
    last_publish: Instant,
}

impl PublishSchedule {
    /// The schedule starts at boot, so the first publish comes one interval
    /// after instant zero.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_publish: Instant::MIN,
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Due once strictly more than one interval elapsed since the last publish.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_publish) > self.interval
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_publish = now;
    }

    /// Push the interval out of reach. Used once an update starts.
    pub fn suspend(&mut self) {
        self.interval = Duration::MAX;
    }

    pub fn is_suspended(&self) -> bool {
        self.interval == Duration::MAX
    }
}

/// What happened during one publisher pass. Mostly useful for logging and
/// tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub reconnected: bool,
    pub published: u8,
    pub control_updated: bool,
}

pub struct NetworkPublisher {
    topics: Topics,
    client_id: heapless::String<32>,
    schedule: PublishSchedule,
}

impl NetworkPublisher {
    pub fn new(settings: &BridgeSettings) -> Self {
        Self {
            topics: settings.topics.clone(),
            client_id: settings.client_id.clone(),
            schedule: PublishSchedule::new(settings.publish_interval),
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn schedule(&self) -> &PublishSchedule {
        &self.schedule
    }

    pub fn suspend(&mut self) {
        info!("Publishing suspended");
        self.schedule.suspend();
    }

    /// One pass: connection upkeep, interval publish, inbound drain.
    pub async fn service<B, C>(
        &mut self,
        broker: &mut B,
        climate: &mut C,
        state: &mut AppState,
        now: Instant,
    ) -> PublishReport
    where
        B: BrokerClient,
        C: ClimateSensor,
    {
        let mut report = PublishReport::default();

        if !broker.is_connected() {
            report.reconnected = self.reconnect(broker).await;
        }

        if self.schedule.is_due(now) {
            self.schedule.mark(now);
            report.published = self.publish_readings(broker, climate, state, now).await;
        }

        report.control_updated = self.drain_inbound(broker, state).await;

        report
    }

    async fn reconnect<B: BrokerClient>(&self, broker: &mut B) -> bool {
        if let Err(e) = broker.connect(&self.client_id).await {
            warn!("Broker connect failed: {:?}", e);
            return false;
        }

        match broker.subscribe(&self.topics.set).await {
            Ok(()) => {
                info!("Broker connected, subscribed to {}", self.topics.set);
                true
            }
            Err(e) => {
                warn!("Subscribe to {} failed: {:?}", self.topics.set, e);
                false
            }
        }
    }

    async fn publish_readings<B, C>(
        &self,
        broker: &mut B,
        climate: &mut C,
        state: &AppState,
        now: Instant,
    ) -> u8
    where
        B: BrokerClient,
        C: ClimateSensor,
    {
        let mut published = 0;

        match state.sensor.fresh(now, self.schedule.interval()) {
            Some(count) => {
                let mut payload = heapless::String::<8>::new();
                let _ = write!(payload, "{}", count);
                published += publish(broker, &self.topics.particles, &payload).await;
            }
            None => debug!("No fresh particulate reading, skipping publish"),
        }

        match climate.read().await {
            Ok(reading) => {
                let mut payload = heapless::String::<16>::new();
                let _ = write!(payload, "{:.2}", reading.temperature_celsius);
                published += publish(broker, &self.topics.temperature, &payload).await;

                payload.clear();
                let _ = write!(payload, "{:.2}", reading.humidity_percent);
                published += publish(broker, &self.topics.humidity, &payload).await;
            }
            Err(e) => warn!("Climate read failed: {}", e),
        }

        published
    }

    async fn drain_inbound<B: BrokerClient>(&self, broker: &mut B, state: &mut AppState) -> bool {
        let mut updated = false;

        loop {
            match broker.poll().await {
                Ok(Some(message)) => {
                    if message.topic == self.topics.set {
                        let value = ControlValue::parse(&message.payload);
                        info!("Control value set to {}", value);
                        state.control = value;
                        updated = true;
                    } else {
                        debug!("Ignoring message on {}", message.topic);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Broker receive failed: {:?}", e);
                    break;
                }
            }
        }

        updated
    }
}

async fn publish<B: BrokerClient>(broker: &mut B, topic: &Topic, payload: &str) -> u8 {
    match broker.publish(topic, payload.as_bytes()).await {
        Ok(()) => {
            debug!("Published {} = {}", topic, payload);
            1
        }
        Err(e) => {
            warn!("Publish to {} failed: {:?}", topic, e);
            0
        }
    }
}

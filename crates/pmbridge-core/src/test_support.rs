//! In-memory collaborators for unit tests

use core::cell::Cell;

use embassy_time::Instant;
use std::collections::VecDeque;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::clock::Clock;
use crate::publisher::{BrokerClient, InboundMessage};
use crate::sensors::{ClimateReading, ClimateSensor, SensorError};
use crate::update::{UpdateEvent, UpdateHook};

/// Serial port fed from a byte queue; everything written is captured.
#[derive(Default)]
pub struct MemorySerial {
    pub incoming: VecDeque<u8>,
    pub written: Vec<u8>,
    pub fail_writes: bool,
}

impl MemorySerial {
    pub fn with_input(bytes: &[u8]) -> Self {
        Self {
            incoming: bytes.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFault;

impl core::fmt::Display for SerialFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("serial fault")
    }
}

impl core::error::Error for SerialFault {}

impl embedded_io::Error for SerialFault {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

impl embedded_io::ErrorType for MemorySerial {
    type Error = SerialFault;
}

impl embedded_io::ReadReady for MemorySerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.incoming.is_empty())
    }
}

impl embedded_io_async::Read for MemorySerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.incoming.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io_async::Write for MemorySerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(SerialFault);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Broker that records traffic and serves queued inbound messages.
#[derive(Default)]
pub struct MemoryBroker {
    pub connected: bool,
    pub refuse_connect: bool,
    pub connects: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub inbox: VecDeque<InboundMessage>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push_back(InboundMessage {
            topic: heapless::String::try_from(topic).unwrap(),
            payload: heapless::Vec::from_slice(payload).unwrap(),
        });
    }

    pub fn published_pairs(&self) -> Vec<(&str, &str)> {
        self.published
            .iter()
            .map(|(topic, payload)| (topic.as_str(), payload.as_str()))
            .collect()
    }
}

impl BrokerClient for MemoryBroker {
    type Error = &'static str;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, _client_id: &str) -> Result<(), Self::Error> {
        self.connects += 1;
        if self.refuse_connect {
            return Err("refused");
        }
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        let payload = core::str::from_utf8(payload).map_err(|_| "payload not utf-8")?;
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, Self::Error> {
        Ok(self.inbox.pop_front())
    }
}

/// Climate sensor returning a fixed reading (or always failing).
pub struct FixedClimate {
    reading: Option<ClimateReading>,
    pub reads: usize,
}

impl FixedClimate {
    pub fn ok(temperature_celsius: f32, humidity_percent: f32) -> Self {
        Self {
            reading: Some(ClimateReading {
                temperature_celsius,
                humidity_percent,
            }),
            reads: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            reading: None,
            reads: 0,
        }
    }
}

impl ClimateSensor for FixedClimate {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.reads += 1;
        self.reading.ok_or(SensorError::ReadFailed {
            sensor: "fixed",
            operation: "read",
            details: "configured to fail",
        })
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn at(now: Instant) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: Instant) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Delay that returns immediately and remembers what was requested.
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls: usize,
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }
}

/// Update hook replaying a script, one entry per poll.
#[derive(Default)]
pub struct ScriptedUpdates {
    pub script: VecDeque<Option<UpdateEvent>>,
    pub polls: usize,
}

impl ScriptedUpdates {
    pub fn after_polls(polls: usize, event: UpdateEvent) -> Self {
        let mut script: VecDeque<_> = core::iter::repeat_n(None, polls).collect();
        script.push_back(Some(event));
        Self { script, polls: 0 }
    }
}

impl UpdateHook for ScriptedUpdates {
    fn poll(&mut self) -> Option<UpdateEvent> {
        self.polls += 1;
        self.script.pop_front().flatten()
    }
}

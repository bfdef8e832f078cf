//! Desktop simulator for the pmbridge particulate sensor relay.
//!
//! Drives the real bridge loop from `pmbridge-core` against synthetic
//! collaborators so the relay, publisher and update handling can be watched
//! without hardware:
//!
//! | Stand-in           | Behaviour                                              |
//! |--------------------|--------------------------------------------------------|
//! | PM1006 sensor      | emits one particulate frame per second                 |
//! | Fan controller     | decodes the relayed frames and logs what it received   |
//! | MQTT broker        | logs publishes, sends scripted control values          |
//! | Climate sensor     | slowly drifting temperature and humidity               |
//! | Firmware update    | starts at 40 s, finishes at 46 s and ends the run      |
//!
//! Run with `RUST_LOG=info cargo run -p pmbridge-simulator`.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use embassy_futures::block_on;
use log::{info, warn};

use pmbridge_core::bridge::{Bridge, BridgeIo};
use pmbridge_core::clock::Clock;
use pmbridge_core::config::{BridgeSettings, Config};
use pmbridge_core::control::ControlValue;
use pmbridge_core::frame::{FrameParser, particle_frame};
use pmbridge_core::publisher::{BrokerClient, InboundMessage};
use pmbridge_core::sensors::{ClimateReading, ClimateSensor, SensorError};
use pmbridge_core::update::{Flow, UpdateEvent, UpdateHook};

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Interval between synthetic sensor frames.
const SENSOR_FRAME_PERIOD: Duration = Duration::from_secs(1);

/// Publish interval used instead of the firmware default of 30 s.
const PUBLISH_INTERVAL_SECS: u32 = 5;

/// Pause between bridge iterations so the simulator does not spin.
const LOOP_PAUSE: Duration = Duration::from_millis(10);

/// Control payloads the broker delivers, by seconds since start.
const CONTROL_SCRIPT: &[(u64, &str)] = &[(12, "120"), (24, "0"), (30, "abc")];

const UPDATE_START_SECS: u64 = 40;
const UPDATE_FINISH_SECS: u64 = 46;

// ---------------------------------------------------------------------------
// Sensor link
// ---------------------------------------------------------------------------

/// Serial link with a fake PM1006 on one side and a fake fan controller on
/// the other.
struct SimulatedLink {
    started: Instant,
    next_frame: Instant,
    pending: VecDeque<u8>,
    /// Decodes the relayed stream the way the fan controller would
    controller: FrameParser,
}

impl SimulatedLink {
    fn new(started: Instant) -> Self {
        Self {
            started,
            next_frame: started,
            pending: VecDeque::new(),
            controller: FrameParser::new(),
        }
    }

    /// Queue a frame once per period. Counts wander between roughly 5 and 45.
    fn tick(&mut self) {
        let now = Instant::now();
        if now < self.next_frame {
            return;
        }
        self.next_frame += SENSOR_FRAME_PERIOD;

        let t = now.duration_since(self.started).as_secs_f64();
        let count = (25.0 + 15.0 * (t / 20.0).sin() + 5.0 * (t / 7.0).cos()) as u16;
        self.pending.extend(particle_frame(count));
    }
}

impl embedded_io::ErrorType for SimulatedLink {
    type Error = Infallible;
}

impl embedded_io::ReadReady for SimulatedLink {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.tick();
        Ok(!self.pending.is_empty())
    }
}

impl embedded_io_async::Read for SimulatedLink {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl embedded_io_async::Write for SimulatedLink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            if let Some(count) = self.controller.feed(byte, ControlValue::DISABLED).reading {
                info!("Fan controller received {}", count);
            }
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Broker that prints publishes and replays [`CONTROL_SCRIPT`].
struct ConsoleBroker {
    started: Instant,
    connected: bool,
    set_topic: String,
    script: VecDeque<(u64, &'static str)>,
}

impl ConsoleBroker {
    fn new(started: Instant) -> Self {
        Self {
            started,
            connected: false,
            set_topic: String::new(),
            script: CONTROL_SCRIPT.iter().copied().collect(),
        }
    }
}

impl BrokerClient for ConsoleBroker {
    type Error = Infallible;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, client_id: &str) -> Result<(), Infallible> {
        info!("[broker] {} connected", client_id);
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Infallible> {
        info!("[broker] subscribed to {}", topic);
        self.set_topic = topic.to_string();
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Infallible> {
        info!("[broker] {} = {}", topic, String::from_utf8_lossy(payload));
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, Infallible> {
        let elapsed = self.started.elapsed().as_secs();
        let Some(&(at, payload)) = self.script.front() else {
            return Ok(None);
        };
        if elapsed < at {
            return Ok(None);
        }
        self.script.pop_front();

        info!("[broker] delivering {:?} on {}", payload, self.set_topic);
        let mut message = InboundMessage {
            topic: heapless::String::new(),
            payload: heapless::Vec::new(),
        };
        let _ = message.topic.push_str(&self.set_topic);
        let _ = message.payload.extend_from_slice(payload.as_bytes());
        Ok(Some(message))
    }
}

// ---------------------------------------------------------------------------
// Climate, updates, time
// ---------------------------------------------------------------------------

struct MockClimate {
    started: Instant,
}

impl ClimateSensor for MockClimate {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let t = self.started.elapsed().as_secs_f64();
        Ok(ClimateReading {
            temperature_celsius: (23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos()) as f32,
            humidity_percent: (50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos()) as f32,
        })
    }
}

/// Reports an update start and finish at fixed times.
struct ScheduledUpdate {
    started: Instant,
    announced: bool,
}

impl UpdateHook for ScheduledUpdate {
    fn poll(&mut self) -> Option<UpdateEvent> {
        let elapsed = self.started.elapsed().as_secs();
        if elapsed >= UPDATE_FINISH_SECS {
            Some(UpdateEvent::Finished)
        } else if elapsed >= UPDATE_START_SECS && !self.announced {
            self.announced = true;
            Some(UpdateEvent::Started)
        } else {
            None
        }
    }
}

/// Blocking delay. The simulator runs the bridge on a single thread, so a
/// sleep is equivalent to an executor timer.
struct StdDelay;

impl embedded_hal_async::delay::DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

struct HostClock;

impl Clock for HostClock {
    fn now(&self) -> embassy_time::Instant {
        embassy_time::Instant::now()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting pmbridge simulator");

    let mut config = Config::default();
    config.device.name = "simulator";
    config.broker.client_id = "pmbridge-simulator";
    config.device.publish_interval_secs = PUBLISH_INTERVAL_SECS;

    let settings = match BridgeSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    info!(
        "Topics: {}, {}, {}, control on {}",
        settings.topics.particles,
        settings.topics.temperature,
        settings.topics.humidity,
        settings.topics.set
    );

    let started = Instant::now();
    let mut bridge = Bridge::new(
        &settings,
        BridgeIo {
            serial: SimulatedLink::new(started),
            broker: ConsoleBroker::new(started),
            climate: MockClimate { started },
            update: ScheduledUpdate {
                started,
                announced: false,
            },
            delay: StdDelay,
            clock: HostClock,
        },
    );

    loop {
        match block_on(bridge.run_once()) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Restart) => {
                info!("Update finished, the device would restart now");
                break;
            }
            Err(e) => warn!("{}", e),
        }
        std::thread::sleep(LOOP_PAUSE);
    }

    info!("Simulator exiting");
}

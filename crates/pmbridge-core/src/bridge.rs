//! Cooperative bridge loop
//!
//! One iteration services the update hook, relays every buffered serial byte
//! through the frame parser, then gives the network publisher one pass. The
//! suspension points are the per-byte pause, the update start pause, awaits
//! on the collaborators and the yield `run` makes after every iteration, so
//! sibling tasks on the same executor keep running while the link is idle.

use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use log::{debug, info, warn};

use crate::app_state::{AppError, AppRunState, AppState, FromTruncated};
use crate::clock::Clock;
use crate::config::BridgeSettings;
use crate::publisher::{BrokerClient, NetworkPublisher};
use crate::sensors::ClimateSensor;
use crate::update::{Flow, UPDATE_START_PAUSE_MS, UpdateEvent, UpdateHook};

/// Pause after each relayed byte. Bounds relay throughput and gives the
/// update mechanism a window under sustained traffic.
pub const BYTE_PAUSE_MS: u32 = 1;

/// Everything the bridge talks to.
pub struct BridgeIo<S, B, C, U, D, K> {
    /// Duplex link to the particulate sensor module
    pub serial: S,
    pub broker: B,
    pub climate: C,
    pub update: U,
    pub delay: D,
    pub clock: K,
}

pub struct Bridge<S, B, C, U, D, K> {
    state: AppState,
    publisher: NetworkPublisher,
    io: BridgeIo<S, B, C, U, D, K>,
}

impl<S, B, C, U, D, K> Bridge<S, B, C, U, D, K>
where
    S: Read + Write + ReadReady,
    B: BrokerClient,
    C: ClimateSensor,
    U: UpdateHook,
    D: DelayNs,
    K: Clock,
{
    pub fn new(settings: &BridgeSettings, io: BridgeIo<S, B, C, U, D, K>) -> Self {
        Self {
            state: AppState::new(),
            publisher: NetworkPublisher::new(settings),
            io,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn publisher(&self) -> &NetworkPublisher {
        &self.publisher
    }

    pub fn io(&self) -> &BridgeIo<S, B, C, U, D, K> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut BridgeIo<S, B, C, U, D, K> {
        &mut self.io
    }

    /// Loop until an update asks for a restart.
    ///
    /// Errors from one iteration are logged and the next iteration starts as
    /// usual; nothing here is fatal. Every iteration ends with a yield to the
    /// executor, whether or not it had work.
    pub async fn run(&mut self) {
        info!("Bridge running");
        loop {
            match self.run_once().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Restart) => {
                    info!("Update complete, restart required");
                    return;
                }
                Err(e) => warn!("{}", e),
            }
            yield_now().await;
        }
    }

    /// One iteration: update hook, serial drain, network pass.
    pub async fn run_once(&mut self) -> Result<Flow, AppError> {
        if self.service_update().await == Flow::Restart {
            return Ok(Flow::Restart);
        }

        if self.relay_pending().await? == Flow::Restart {
            return Ok(Flow::Restart);
        }

        let now = self.io.clock.now();
        let report = self
            .publisher
            .service(&mut self.io.broker, &mut self.io.climate, &mut self.state, now)
            .await;
        if report.published > 0 {
            debug!("Published {} messages", report.published);
        }

        Ok(Flow::Continue)
    }

    /// Relay every byte the serial link has buffered.
    ///
    /// Each byte goes through the frame parser and the (possibly rewritten)
    /// result is written straight back. A read of zero bytes ends the pass.
    ///
    /// The parser has already consumed a byte whose write fails, so the
    /// frame in flight reaches the other side one byte short. The parser
    /// stays in step with the sensor and later frames relay intact.
    pub async fn relay_pending(&mut self) -> Result<Flow, AppError> {
        let mut byte = [0_u8; 1];

        while self.io.serial.read_ready().map_err(serial_error)? {
            let n = self.io.serial.read(&mut byte).await.map_err(serial_error)?;
            if n == 0 {
                break;
            }

            let step = self.state.parser.feed(byte[0], self.state.control);
            if let Some(count) = step.reading {
                let now = self.io.clock.now();
                debug!("Particulate reading {} at {} ms", count, now.as_millis());
                self.state.sensor.record(count, now);
            }

            if let Err(e) = self.io.serial.write_all(&[step.outgoing]).await {
                warn!(
                    "Relay write failed in {:?} at data position {}, frame relayed short",
                    self.state.parser.state(),
                    self.state.parser.data_index()
                );
                return Err(serial_error(e));
            }

            if self.service_update().await == Flow::Restart {
                return Ok(Flow::Restart);
            }
            self.io.delay.delay_ms(BYTE_PAUSE_MS).await;
        }

        Ok(Flow::Continue)
    }

    async fn service_update(&mut self) -> Flow {
        match self.io.update.poll() {
            Some(UpdateEvent::Started) => {
                info!("Firmware update started");
                self.state.run_state = AppRunState::Updating;
                self.publisher.suspend();
                self.io.delay.delay_ms(UPDATE_START_PAUSE_MS).await;
                Flow::Continue
            }
            Some(UpdateEvent::Finished) => Flow::Restart,
            None => Flow::Continue,
        }
    }
}

fn serial_error<E: core::fmt::Debug>(e: E) -> AppError {
    AppError::Serial(heapless::String::from_truncated(format_args!("{:?}", e)))
}

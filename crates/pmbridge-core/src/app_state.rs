//! Application-wide state and error types for pmbridge

use core::fmt::Write;

use embassy_time::{Duration, Instant};
use thiserror_no_std::Error;

use crate::control::ControlValue;
use crate::frame::FrameParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    /// Relaying and publishing normally
    Running,
    /// A firmware transfer started; publishing is suppressed until restart
    Updating,
}

/// A particulate count together with the instant its frame completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleReading {
    pub count: u16,
    pub captured_at: Instant,
}

/// Latest particulate reading. Written by the frame relay, read by the
/// publisher.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorState {
    latest: Option<ParticleReading>,
}

impl SensorState {
    pub const fn new() -> Self {
        Self { latest: None }
    }

    pub fn record(&mut self, count: u16, captured_at: Instant) {
        self.latest = Some(ParticleReading { count, captured_at });
    }

    pub const fn latest(&self) -> Option<ParticleReading> {
        self.latest
    }

    /// The count, if it was captured less than `window` before `now`.
    pub fn fresh(&self, now: Instant, window: Duration) -> Option<u16> {
        self.latest
            .filter(|reading| now.saturating_duration_since(reading.captured_at) < window)
            .map(|reading| reading.count)
    }
}

/// Main application state container
///
/// Owned by the bridge loop and passed by reference to the relay and the
/// publisher. Single-threaded, so no locking.
#[derive(Debug, Clone)]
pub struct AppState {
    pub run_state: AppRunState,
    pub parser: FrameParser,
    pub sensor: SensorState,
    pub control: ControlValue,
}

impl AppState {
    pub const fn new() -> Self {
        Self {
            run_state: AppRunState::Running,
            parser: FrameParser::new(),
            sensor: SensorState::new(),
            control: ControlValue::DISABLED,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Serial link error: {0}")]
    Serial(heapless::String<64>),
    #[error("Invalid configuration: {0}")]
    Config(heapless::String<64>),
}

/// Build a bounded string, cutting the input short instead of failing.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<'a, const N: usize> FromTruncated<&'a str> for heapless::String<N> {
    fn from_truncated(value: &'a str) -> Self {
        let mut out = heapless::String::new();
        for c in value.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        out
    }
}

impl<const N: usize> FromTruncated<core::fmt::Arguments<'_>> for heapless::String<N> {
    fn from_truncated(value: core::fmt::Arguments<'_>) -> Self {
        let mut out = Truncating(heapless::String::new());
        let _ = out.write_fmt(value);
        out.0
    }
}

struct Truncating<const N: usize>(heapless::String<N>);

impl<const N: usize> Write for Truncating<N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_freshness_window() {
        let mut sensor = SensorState::new();
        let window = Duration::from_secs(30);
        assert_eq!(sensor.fresh(Instant::from_secs(5), window), None);

        sensor.record(42, Instant::from_secs(100));

        assert_eq!(sensor.fresh(Instant::from_secs(100), window), Some(42));
        assert_eq!(sensor.fresh(Instant::from_millis(129_999), window), Some(42));
        assert_eq!(sensor.fresh(Instant::from_secs(130), window), None);
        assert_eq!(sensor.fresh(Instant::from_secs(500), window), None);
    }

    #[test]
    fn test_record_overwrites() {
        let mut sensor = SensorState::new();
        sensor.record(1, Instant::from_secs(1));
        sensor.record(2, Instant::from_secs(2));
        assert_eq!(
            sensor.latest(),
            Some(ParticleReading {
                count: 2,
                captured_at: Instant::from_secs(2)
            })
        );
    }

    #[test]
    fn test_truncated_strings() {
        let short: heapless::String<4> = heapless::String::from_truncated("abcdefgh");
        assert_eq!(short.as_str(), "abcd");

        let formatted: heapless::String<8> =
            heapless::String::from_truncated(format_args!("code {}", 123456));
        assert_eq!(formatted.as_str(), "code 123");
    }
}

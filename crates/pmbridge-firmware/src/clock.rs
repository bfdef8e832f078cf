use embassy_time::Instant;
use pmbridge_core::clock::Clock;

/// Monotonic time from the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

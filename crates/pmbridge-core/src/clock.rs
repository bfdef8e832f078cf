//! Monotonic time source used to timestamp readings and pace publishing

use embassy_time::Instant;

pub trait Clock {
    fn now(&self) -> Instant;
}


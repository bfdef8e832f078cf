//! Firmware update hook
//!
//! The transfer itself (network listener, flash writes) lives outside the
//! core. The bridge only needs to hear when a transfer begins and when it is
//! done, and it polls for that often enough to stay responsive during
//! sustained serial traffic.

/// Pause granted to an update right after it starts, before the loop resumes.
pub const UPDATE_START_PAUSE_MS: u32 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    /// An image transfer began. Publishing stops for good.
    Started,
    /// The new image is in place. The device must restart.
    Finished,
}

/// Polled once per loop iteration and after every relayed byte.
pub trait UpdateHook {
    fn poll(&mut self) -> Option<UpdateEvent>;
}

/// Whether the loop keeps going after an update poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Restart,
}

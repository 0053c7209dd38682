//! Device presence: liveness derived purely from signal recency.

mod device;
mod timer;
mod tracker;

pub use device::{
    parse_timestamp, Device, DeviceSeed, LastSignal, LocationSample, PresenceState, PresenceView,
    SignalEvent,
};
pub use timer::{TimerHandle, TimerQueue};
pub use tracker::{PresenceQuery, PresenceTracker, LIVENESS_WINDOW_SECS};

/// Lookup used to validate device ids supplied by callers.
pub trait DeviceDirectory {
    fn contains_device(&self, device_id: &str) -> bool;
}

impl DeviceDirectory for std::collections::BTreeSet<String> {
    fn contains_device(&self, device_id: &str) -> bool {
        self.contains(device_id)
    }
}

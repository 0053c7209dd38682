//! Liveness from signal recency.
//!
//! A device is `Online` iff its last signal was received no more than one
//! liveness window ago. Each signal re-arms the device's expiry timer; the
//! caller drives expiry by invoking [`PresenceTracker::expire_due`] (the
//! console does so from a task sleeping until [`PresenceTracker::next_deadline`]).
//!
//! ## Usage
//!
//! ```ignore
//! let mut tracker = PresenceTracker::default();
//! tracker.initialize(store.load()?, Utc::now());
//! tracker.record_signal(signal, Utc::now());
//! // later:
//! tracker.expire_due(Utc::now());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::device::{Device, DeviceSeed, LastSignal, LocationSample, PresenceState, PresenceView, SignalEvent};
use super::timer::TimerQueue;
use super::DeviceDirectory;
use crate::events::Event;

/// Default liveness window: five minutes.
pub const LIVENESS_WINDOW_SECS: i64 = 5 * 60;

/// Result of [`PresenceTracker::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceQuery {
    pub presence_state: PresenceState,
    pub last_signal_at: Option<DateTime<Utc>>,
    pub location_sample: Option<LocationSample>,
}

#[derive(Debug)]
pub struct PresenceTracker {
    window: Duration,
    devices: BTreeMap<String, Device>,
    timers: TimerQueue<String>,
}

impl PresenceTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            devices: BTreeMap::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// End of the window opened by a signal at `from`, saturating at the
    /// latest representable instant.
    fn expiry_from(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Rebuild liveness from persisted timestamps at process start.
    ///
    /// Devices still inside their window come back `Online` with a timer for
    /// exactly the remaining time; everything else is `Offline` with no timer.
    /// A device whose window ends exactly at `now` is still inside it, the
    /// same as a live device at its deadline, and expires on the next sweep.
    pub fn initialize<I>(&mut self, seeds: I, now: DateTime<Utc>) -> Vec<Event>
    where
        I: IntoIterator<Item = DeviceSeed>,
    {
        let mut events = Vec::new();
        for seed in seeds {
            let id = seed.id.trim().to_string();
            if id.is_empty() {
                continue;
            }
            let last_signal = LastSignal::parse(seed.last_signal_at.as_deref());

            let deadline = last_signal.at().and_then(|last| {
                let elapsed = now - last;
                if elapsed > self.window {
                    None
                } else if elapsed < Duration::zero() {
                    // Clock skew: a signal "from the future" counts as just received.
                    Some(self.expiry_from(now))
                } else {
                    Some(self.expiry_from(last))
                }
            });

            let state = match deadline {
                Some(deadline) => {
                    self.timers.arm(id.clone(), deadline);
                    PresenceState::Online
                }
                None => {
                    self.timers.cancel(&id);
                    PresenceState::Offline
                }
            };
            debug!(device_id = %id, ?state, ?last_signal, "presence restored");

            let device = Device {
                id: id.clone(),
                name: seed.name,
                last_signal,
                presence_state: state,
                location: seed.location,
            };
            events.push(Event::PresenceChanged {
                device_id: id.clone(),
                state,
                at: now,
            });
            self.devices.insert(id, device);
        }
        info!(
            devices = self.devices.len(),
            online = self.online_count(),
            "presence tracker initialized"
        );
        events
    }

    /// Register a device without any signal (e.g. added by an operator).
    pub fn register(&mut self, id: &str, name: Option<String>) -> bool {
        let id = id.trim();
        if id.is_empty() {
            return false;
        }
        let device = self
            .devices
            .entry(id.to_string())
            .or_insert_with(|| Device::unseen(id.to_string()));
        if name.is_some() {
            device.name = name;
        }
        true
    }

    /// Apply a signal received at `now`.
    ///
    /// Liveness follows reception time; the claimed timestamp only labels
    /// the location sample. Signals without a device id are ignored.
    pub fn record_signal(&mut self, signal: SignalEvent, now: DateTime<Utc>) -> Vec<Event> {
        let id = signal.device_id.trim().to_string();
        if id.is_empty() {
            debug!("ignoring signal without device id");
            return Vec::new();
        }

        let mut events = Vec::new();
        let device = self
            .devices
            .entry(id.clone())
            .or_insert_with(|| Device::unseen(id.clone()));

        let was = device.presence_state;
        device.last_signal = LastSignal::At(now);
        device.presence_state = PresenceState::Online;

        if signal.carries_location() {
            let location = merge_location(device.location.take(), &signal, now);
            events.push(Event::LocationUpdated {
                device_id: id.clone(),
                location: location.clone(),
                at: now,
            });
            device.location = Some(location);
        }

        self.timers.arm(id.clone(), self.expiry_from(now));

        if was != PresenceState::Online {
            info!(device_id = %id, "device online");
            events.insert(
                0,
                Event::PresenceChanged {
                    device_id: id,
                    state: PresenceState::Online,
                    at: now,
                },
            );
        }
        events
    }

    /// Fire every expiry timer due at `now`.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        for (id, _handle) in self.timers.pop_expired(now) {
            let Some(device) = self.devices.get_mut(&id) else {
                continue;
            };
            if device.presence_state == PresenceState::Offline {
                continue;
            }
            device.presence_state = PresenceState::Offline;
            info!(device_id = %id, window_secs = self.window.num_seconds(), "device offline, no signal within window");
            events.push(Event::PresenceChanged {
                device_id: id,
                state: PresenceState::Offline,
                at: now,
            });
        }
        events
    }

    /// Drop a device and its timer.
    pub fn forget(&mut self, id: &str) -> bool {
        self.timers.cancel(&id.to_string());
        self.devices.remove(id).is_some()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn query(&self, id: &str) -> Option<PresenceQuery> {
        self.devices.get(id).map(|device| PresenceQuery {
            presence_state: device.presence_state,
            last_signal_at: device.last_signal.at(),
            location_sample: device.location.clone(),
        })
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn presence_view(&self, id: &str) -> Option<PresenceView> {
        self.devices.get(id).map(Device::view)
    }

    /// Copy of every device, ordered by id.
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub fn views(&self) -> Vec<PresenceView> {
        self.devices.values().map(Device::view).collect()
    }

    /// Persisted form of every device.
    pub fn seeds(&self) -> Vec<DeviceSeed> {
        self.devices.values().map(Device::to_seed).collect()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn online_count(&self) -> usize {
        self.devices
            .values()
            .filter(|d| d.presence_state == PresenceState::Online)
            .count()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(Duration::seconds(LIVENESS_WINDOW_SECS))
    }
}

impl DeviceDirectory for PresenceTracker {
    fn contains_device(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }
}

/// Fields present in the signal win; missing ones keep their prior value.
fn merge_location(
    prior: Option<LocationSample>,
    signal: &SignalEvent,
    received_at: DateTime<Utc>,
) -> LocationSample {
    let (lat, lng) = signal.coordinates();
    let timestamp = signal
        .timestamp
        .as_deref()
        .and_then(super::device::parse_timestamp)
        .unwrap_or(received_at);
    let address = signal.address.clone().filter(|a| !a.is_empty());

    match prior {
        Some(prior) => LocationSample {
            lat: lat.or(prior.lat),
            lng: lng.or(prior.lng),
            address: address.or(prior.address),
            timestamp,
        },
        None => LocationSample {
            lat,
            lng,
            address,
            timestamp,
        },
    }
}

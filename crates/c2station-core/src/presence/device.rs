//! Device records, signal events and the presence read surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceState {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            PresenceState::Online => "Online",
            PresenceState::Offline => "Offline",
        })
    }
}

/// What is known about a device's most recent signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LastSignal {
    Never,
    /// A timestamp was recorded but could not be parsed.
    Unparsable(String),
    At(DateTime<Utc>),
}

impl LastSignal {
    /// Parse a persisted timestamp, keeping garbage distinguishable from absence.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => LastSignal::Never,
            Some(s) => match parse_timestamp(s) {
                Some(ts) => LastSignal::At(ts),
                None => LastSignal::Unparsable(s.to_string()),
            },
        }
    }

    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            LastSignal::At(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Raw form for persistence; unparsable input is written back untouched.
    pub fn to_raw(&self) -> Option<String> {
        match self {
            LastSignal::Never => None,
            LastSignal::Unparsable(raw) => Some(raw.clone()),
            LastSignal::At(ts) => Some(ts.to_rfc3339()),
        }
    }
}

/// Accepts RFC 3339 as well as the zone-less `YYYY-MM-DDTHH:MM:SS[.fff]`
/// form (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Claimed sample time (falls back to reception time).
    pub timestamp: DateTime<Utc>,
}

/// A device as tracked by the presence tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_signal: LastSignal,
    pub presence_state: PresenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSample>,
}

impl Device {
    pub(crate) fn unseen(id: String) -> Self {
        Self {
            id,
            name: None,
            last_signal: LastSignal::Never,
            presence_state: PresenceState::Offline,
            location: None,
        }
    }

    pub fn view(&self) -> PresenceView {
        PresenceView {
            device_id: self.id.clone(),
            presence_state: self.presence_state,
            last_signal_at: self.last_signal.at(),
        }
    }

    pub fn to_seed(&self) -> DeviceSeed {
        DeviceSeed {
            id: self.id.clone(),
            name: self.name.clone(),
            last_signal_at: self.last_signal.to_raw(),
            location: self.location.clone(),
        }
    }
}

/// Read surface handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub device_id: String,
    pub presence_state: PresenceState,
    pub last_signal_at: Option<DateTime<Utc>>,
}

/// Incoming signal from the ingestion path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub device_id: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    /// Claimed sample time, ISO-8601. Kept for display only.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl SignalEvent {
    pub fn heartbeat(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn at_position(device_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            device_id: device_id.into(),
            lat: Some(lat),
            lng: Some(lng),
            ..Self::default()
        }
    }

    /// Non-finite coordinates are dropped rather than stored.
    pub(crate) fn coordinates(&self) -> (Option<f64>, Option<f64>) {
        (
            self.lat.filter(|v| v.is_finite()),
            self.lng.filter(|v| v.is_finite()),
        )
    }

    pub(crate) fn carries_location(&self) -> bool {
        let (lat, lng) = self.coordinates();
        lat.is_some() || lng.is_some() || self.address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Persisted form of a device, as found in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSeed {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub last_signal_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSample>,
}

impl DeviceSeed {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            last_signal_at: None,
            location: None,
        }
    }

    pub fn with_last_signal(mut self, raw: impl Into<String>) -> Self {
        self.last_signal_at = Some(raw.into());
        self
    }

    /// Build a seed from a device record returned by the console API.
    ///
    /// Servers disagree on field names, so the usual aliases are tried in
    /// order. Records without an id are skipped.
    pub fn from_remote(record: &Value) -> Option<Self> {
        let id = string_field(record, &["device_id", "deviceId", "id"])?;
        let name = string_field(
            record,
            &["admin_assigned_name", "display_name", "device_name", "name"],
        );
        let last_signal_at = string_field(
            record,
            &["lastSeen", "last_seen", "last_updated", "updated_at"],
        );
        let location = record.get("lastKnownLocation").and_then(|loc| {
            let timestamp = loc
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)?;
            Some(LocationSample {
                lat: loc.get("lat").and_then(Value::as_f64),
                lng: loc.get("lng").and_then(Value::as_f64),
                address: loc.get("address").and_then(Value::as_str).map(String::from),
                timestamp,
            })
        });

        Some(Self {
            id,
            name,
            last_signal_at,
            location,
        })
    }

    /// Fold a fresher record for the same device into this one.
    ///
    /// Names from `other` win when present. Signal and location keep
    /// whichever side is more recent; an unparsable local timestamp loses
    /// to any parsable one.
    pub fn merge(&mut self, other: DeviceSeed) {
        if other.name.is_some() {
            self.name = other.name;
        }

        let ours = LastSignal::parse(self.last_signal_at.as_deref()).at();
        let theirs = LastSignal::parse(other.last_signal_at.as_deref()).at();
        match (ours, theirs) {
            (Some(a), Some(b)) if b > a => self.last_signal_at = other.last_signal_at,
            (None, Some(_)) => self.last_signal_at = other.last_signal_at,
            _ => {}
        }

        if let Some(theirs) = other.location {
            let newer = self
                .location
                .as_ref()
                .map_or(true, |ours| theirs.timestamp > ours.timestamp);
            if newer {
                self.location = Some(theirs);
            }
        }
    }
}

fn string_field(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_signal_distinguishes_absent_and_garbage() {
        assert_eq!(LastSignal::parse(None), LastSignal::Never);
        assert_eq!(LastSignal::parse(Some("  ")), LastSignal::Never);
        assert_eq!(
            LastSignal::parse(Some("yesterday-ish")),
            LastSignal::Unparsable("yesterday-ish".into())
        );
        assert!(LastSignal::parse(Some("2026-10-16T09:00:00Z")).at().is_some());
        assert!(LastSignal::parse(Some("2026-10-16T09:00:00.123")).at().is_some());
    }

    #[test]
    fn signal_event_uses_camel_case_wire_names() {
        let ev: SignalEvent = serde_json::from_value(json!({
            "deviceId": "D1", "lat": 1.5, "lng": 2.5, "timestamp": "2026-10-16T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(ev.device_id, "D1");
        assert!(ev.carries_location());
        assert!(!SignalEvent::heartbeat("D1").carries_location());
    }

    #[test]
    fn non_finite_coordinates_are_dropped() {
        let ev = SignalEvent {
            device_id: "D1".into(),
            lat: Some(f64::NAN),
            ..SignalEvent::default()
        };
        assert_eq!(ev.coordinates(), (None, None));
        assert!(!ev.carries_location());
    }

    #[test]
    fn seed_from_remote_tries_aliases() {
        let seed = DeviceSeed::from_remote(&json!({
            "device_id": "abc",
            "device_name": "Pixel",
            "last_seen": "2026-10-16T08:59:00Z",
            "lastKnownLocation": {"lat": 1.0, "lng": 2.0, "timestamp": "2026-10-16T08:58:00Z"}
        }))
        .unwrap();
        assert_eq!(seed.id, "abc");
        assert_eq!(seed.name.as_deref(), Some("Pixel"));
        assert_eq!(seed.last_signal_at.as_deref(), Some("2026-10-16T08:59:00Z"));
        assert_eq!(seed.location.unwrap().lat, Some(1.0));

        assert!(DeviceSeed::from_remote(&json!({"name": "no id"})).is_none());
    }

    #[test]
    fn merge_keeps_most_recent_signal() {
        let mut local = DeviceSeed::new("D1").with_last_signal("2026-10-16T09:00:00Z");
        local.merge(DeviceSeed {
            name: Some("Gate".into()),
            ..DeviceSeed::new("D1").with_last_signal("2026-10-16T08:00:00Z")
        });
        assert_eq!(local.name.as_deref(), Some("Gate"));
        assert_eq!(local.last_signal_at.as_deref(), Some("2026-10-16T09:00:00Z"));

        let mut garbage = DeviceSeed::new("D2").with_last_signal("??");
        garbage.merge(DeviceSeed::new("D2").with_last_signal("2026-10-16T08:00:00Z"));
        assert_eq!(garbage.last_signal_at.as_deref(), Some("2026-10-16T08:00:00Z"));
        assert!(garbage.name.is_none());
    }

    #[test]
    fn presence_view_serializes_null_timestamp() {
        let device = Device::unseen("D9".into());
        let json = serde_json::to_value(device.view()).unwrap();
        assert_eq!(
            json,
            json!({"deviceId": "D9", "presenceState": "Offline", "lastSignalAt": null})
        );
    }
}

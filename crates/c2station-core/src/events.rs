use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::{LocationSample, PresenceState};
use crate::schedule::{OpType, RemoteAction};

/// Every state change in the core produces an Event.
/// The rendering layer subscribes to them; nothing in the core depends on
/// anyone listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PresenceChanged {
        device_id: String,
        state: PresenceState,
        at: DateTime<Utc>,
    },
    LocationUpdated {
        device_id: String,
        location: LocationSample,
        at: DateTime<Utc>,
    },
    OperationScheduled {
        operation_id: String,
        device_id: String,
        op_type: OpType,
        scheduled_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    OperationCancelled {
        operation_id: String,
        at: DateTime<Utc>,
    },
    /// Window opened; the start call has been issued.
    OperationStarted {
        operation_id: String,
        device_id: String,
        op_type: OpType,
        at: DateTime<Utc>,
    },
    /// Window elapsed. The stop call goes out now, or once a still-pending
    /// start call resolves; without a recording id it is recorded as a
    /// `RemoteFailed` instead.
    OperationCompleted {
        operation_id: String,
        device_id: String,
        op_type: OpType,
        at: DateTime<Utc>,
    },
    /// The remote side acknowledged a start or stop call.
    RemoteConfirmed {
        operation_id: String,
        action: RemoteAction,
        at: DateTime<Utc>,
    },
    /// A start or stop call failed. The operation's status is unaffected.
    RemoteFailed {
        operation_id: String,
        action: RemoteAction,
        error_kind: String,
        detail: String,
        at: DateTime<Utc>,
    },
    OperationsPruned {
        count: usize,
        at: DateTime<Utc>,
    },
    /// The gateway reported `AuthExpired`; a fresh login is required.
    SessionExpired {
        at: DateTime<Utc>,
    },
    /// An operator command sent to a running console was refused.
    CommandRejected {
        command: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::PresenceChanged { at, .. }
            | Event::LocationUpdated { at, .. }
            | Event::OperationScheduled { at, .. }
            | Event::OperationCancelled { at, .. }
            | Event::OperationStarted { at, .. }
            | Event::OperationCompleted { at, .. }
            | Event::RemoteConfirmed { at, .. }
            | Event::RemoteFailed { at, .. }
            | Event::OperationsPruned { at, .. }
            | Event::SessionExpired { at }
            | Event::CommandRejected { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let at = Utc::now();
        let json = serde_json::to_value(Event::OperationCancelled {
            operation_id: "SCHED-1".into(),
            at,
        })
        .unwrap();
        assert_eq!(json["type"], "OperationCancelled");
        assert_eq!(json["operation_id"], "SCHED-1");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back.at(), at);
    }
}

//! Scheduled operation records and their lifecycle.
//!
//! State machine:
//!
//! ```text
//!   PENDING ──(window opens)──> ACTIVE ──(window elapsed)──> COMPLETED
//!      │
//!      └──(cancel)──> CANCELLED
//! ```
//!
//! `status` follows the wall clock only. Whether the remote side actually
//! started or stopped anything is tracked separately in [`RemoteState`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::RecordingKind;

/// What a scheduled operation records.
pub type OpType = RecordingKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl OperationStatus {
    /// The only legal edges are Pending→Active, Active→Completed and
    /// Pending→Cancelled.
    pub fn can_transition_to(&self, to: &OperationStatus) -> bool {
        matches!(
            (self, to),
            (OperationStatus::Pending, OperationStatus::Active)
                | (OperationStatus::Active, OperationStatus::Completed)
                | (OperationStatus::Pending, OperationStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Active => "active",
            OperationStatus::Completed => "completed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when an illegal status edge is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTransitionError {
    pub from: OperationStatus,
    pub to: OperationStatus,
}

impl std::fmt::Display for OperationTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid status transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for OperationTransitionError {}

/// Remote call the engine asks its caller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteAction {
    Start,
    Stop,
}

impl std::fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            RemoteAction::Start => "start",
            RemoteAction::Stop => "stop",
        })
    }
}

/// Progress of one remote call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallState {
    #[default]
    NotIssued,
    InFlight,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFailure {
    pub action: RemoteAction,
    /// [`GatewayError::kind`](crate::GatewayError::kind), or `local` when
    /// the call was never made.
    pub kind: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Remote-side confirmation, kept apart from the wall-clock status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteState {
    #[serde(default)]
    pub start: CallState,
    #[serde(default)]
    pub stop: CallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RemoteFailure>,
}

impl RemoteState {
    pub fn start_confirmed(&self) -> bool {
        self.start == CallState::Confirmed
    }

    pub fn stop_confirmed(&self) -> bool {
        self.stop == CallState::Confirmed
    }

    pub fn in_flight(&self) -> bool {
        self.start == CallState::InFlight || self.stop == CallState::InFlight
    }
}

/// A time-boxed remote recording.
///
/// Serialized as
/// `{id, deviceId, type, scheduledDateTime, duration, note?, status, createdAt, remote}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledOperation {
    pub id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub op_type: OpType,
    #[serde(rename = "scheduledDateTime")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub remote: RemoteState,
}

impl ScheduledOperation {
    /// End of the recording window.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_at
    }

    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at()
    }

    pub(crate) fn transition_to(
        &mut self,
        to: OperationStatus,
    ) -> Result<(), OperationTransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(OperationTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub(crate) fn record_failure(
        &mut self,
        action: RemoteAction,
        kind: &str,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        match action {
            RemoteAction::Start => self.remote.start = CallState::Failed,
            RemoteAction::Stop => self.remote.stop = CallState::Failed,
        }
        self.remote.last_error = Some(RemoteFailure {
            action,
            kind: kind.to_string(),
            detail: detail.into(),
            at,
        });
    }
}

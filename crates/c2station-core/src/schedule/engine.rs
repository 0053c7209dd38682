//! Wall-clock driven lifecycle of scheduled recordings.
//!
//! The engine never performs I/O. [`ScheduleEngine::tick`] advances status
//! and hands back the remote calls that must be made; whoever executes them
//! reports back through [`ScheduleEngine::apply_start_outcome`] and
//! [`ScheduleEngine::apply_stop_outcome`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::operation::{
    CallState, OpType, OperationStatus, RemoteAction, ScheduledOperation,
};
use crate::error::{GatewayError, ScheduleError, ValidationError};
use crate::events::Event;
use crate::gateway::{artifact_ref_from, recording_id_from};
use crate::presence::DeviceDirectory;

/// Input to [`ScheduleEngine::schedule`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub device_id: String,
    pub op_type: OpType,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub note: Option<String>,
}

impl ScheduleRequest {
    pub fn new(
        device_id: impl Into<String>,
        op_type: OpType,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            op_type,
            scheduled_at,
            duration_minutes,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A remote call requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Start {
        operation_id: String,
        device_id: String,
        op_type: OpType,
    },
    Stop {
        operation_id: String,
        device_id: String,
        op_type: OpType,
        recording_id: String,
    },
}

impl RemoteCommand {
    pub fn operation_id(&self) -> &str {
        match self {
            RemoteCommand::Start { operation_id, .. } | RemoteCommand::Stop { operation_id, .. } => {
                operation_id
            }
        }
    }

    pub fn action(&self) -> RemoteAction {
        match self {
            RemoteCommand::Start { .. } => RemoteAction::Start,
            RemoteCommand::Stop { .. } => RemoteAction::Stop,
        }
    }
}

/// Commands to dispatch plus the events produced along the way.
#[derive(Debug, Default, PartialEq)]
pub struct EngineOutput {
    pub commands: Vec<RemoteCommand>,
    pub events: Vec<Event>,
}

impl EngineOutput {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }
}

/// Owns every scheduled operation. Callers serialize access (the console
/// keeps it behind one mutex), so a cancel can never interleave with a tick.
#[derive(Debug, Default)]
pub struct ScheduleEngine {
    operations: BTreeMap<String, ScheduledOperation>,
}

impl ScheduleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted operations.
    ///
    /// A call still marked in flight was interrupted by a shutdown; its
    /// outcome is unknown and it is recorded as failed.
    pub fn restore<I>(operations: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = ScheduledOperation>,
    {
        let mut engine = Self::new();
        for mut op in operations {
            for action in [RemoteAction::Start, RemoteAction::Stop] {
                let state = match action {
                    RemoteAction::Start => op.remote.start,
                    RemoteAction::Stop => op.remote.stop,
                };
                if state == CallState::InFlight {
                    op.record_failure(action, "local", "interrupted by restart", now);
                }
            }
            if engine.operations.contains_key(&op.id) {
                warn!(operation_id = %op.id, "duplicate operation id in registry, keeping first");
                continue;
            }
            engine.operations.insert(op.id.clone(), op);
        }
        debug!(operations = engine.operations.len(), "schedule engine restored");
        engine
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Create a `Pending` operation.
    ///
    /// A `scheduled_at` in the past is accepted; the next tick treats it as
    /// due.
    pub fn schedule(
        &mut self,
        request: ScheduleRequest,
        devices: &impl DeviceDirectory,
        now: DateTime<Utc>,
    ) -> Result<ScheduledOperation, ScheduleError> {
        if request.duration_minutes <= 0 {
            return Err(ValidationError::NonPositiveDuration(request.duration_minutes).into());
        }
        let duration_minutes = u32::try_from(request.duration_minutes).map_err(|_| {
            ValidationError::InvalidValue {
                field: "duration".into(),
                message: format!("{} minutes is too long", request.duration_minutes),
            }
        })?;
        let device_id = request.device_id.trim();
        if device_id.is_empty() || !devices.contains_device(device_id) {
            return Err(ValidationError::UnknownDevice(request.device_id.clone()).into());
        }

        let op = ScheduledOperation {
            id: format!("SCHED-{}", Uuid::new_v4().simple()),
            device_id: device_id.to_string(),
            op_type: request.op_type,
            scheduled_at: request.scheduled_at,
            duration_minutes,
            note: request.note.filter(|n| !n.trim().is_empty()),
            status: OperationStatus::Pending,
            created_at: now,
            remote: Default::default(),
        };
        info!(
            operation_id = %op.id,
            device_id = %op.device_id,
            op_type = %op.op_type,
            scheduled_at = %op.scheduled_at,
            duration_minutes,
            "operation scheduled"
        );
        self.operations.insert(op.id.clone(), op.clone());
        Ok(op)
    }

    /// Cancel a `Pending` operation. Anything else is left untouched.
    pub fn cancel(&mut self, id: &str) -> Result<ScheduledOperation, ScheduleError> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;
        op.transition_to(OperationStatus::Cancelled)
            .map_err(|e| ScheduleError::NotCancellable {
                id: id.to_string(),
                status: e.from,
            })?;
        info!(operation_id = %id, "operation cancelled");
        Ok(op.clone())
    }

    /// Advance every operation whose window boundary has passed.
    ///
    /// Each transition is taken only from its own source status, so calling
    /// this again with the same `now` yields nothing. An operation moves at
    /// most one step per tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> EngineOutput {
        let mut out = EngineOutput::default();

        for op in self.ordered_mut() {
            match op.status {
                OperationStatus::Pending if op.window_open(now) => {
                    if op.transition_to(OperationStatus::Active).is_err() {
                        continue;
                    }
                    info!(operation_id = %op.id, device_id = %op.device_id, "recording window opened");
                    op.remote.start = CallState::InFlight;
                    out.commands.push(RemoteCommand::Start {
                        operation_id: op.id.clone(),
                        device_id: op.device_id.clone(),
                        op_type: op.op_type,
                    });
                    out.events.push(Event::OperationStarted {
                        operation_id: op.id.clone(),
                        device_id: op.device_id.clone(),
                        op_type: op.op_type,
                        at: now,
                    });
                }
                OperationStatus::Active if op.window_elapsed(now) => {
                    if op.transition_to(OperationStatus::Completed).is_err() {
                        continue;
                    }
                    info!(operation_id = %op.id, device_id = %op.device_id, "recording window elapsed");
                    out.events.push(Event::OperationCompleted {
                        operation_id: op.id.clone(),
                        device_id: op.device_id.clone(),
                        op_type: op.op_type,
                        at: now,
                    });
                    issue_stop(op, now, &mut out);
                }
                _ => {}
            }
        }
        out
    }

    /// Apply the result of a start call.
    ///
    /// Ignored unless the start is still in flight. When the window already
    /// elapsed while the call was running, the stop call is issued now.
    pub fn apply_start_outcome(
        &mut self,
        id: &str,
        result: Result<Value, GatewayError>,
        now: DateTime<Utc>,
    ) -> EngineOutput {
        let mut out = EngineOutput::default();
        let Some(op) = self.operations.get_mut(id) else {
            debug!(operation_id = %id, "start outcome for unknown operation");
            return out;
        };
        if op.remote.start != CallState::InFlight {
            return out;
        }

        match result {
            Ok(data) => {
                op.remote.start = CallState::Confirmed;
                op.remote.recording_id = recording_id_from(&data);
                info!(
                    operation_id = %id,
                    recording_id = op.remote.recording_id.as_deref().unwrap_or("-"),
                    "remote recording started"
                );
                out.events.push(Event::RemoteConfirmed {
                    operation_id: id.to_string(),
                    action: RemoteAction::Start,
                    at: now,
                });
            }
            Err(err) => {
                warn!(operation_id = %id, error = %err, "remote start failed");
                op.record_failure(RemoteAction::Start, err.kind(), err.to_string(), now);
                out.events.push(remote_failed(id, RemoteAction::Start, err.kind(), err.to_string(), now));
            }
        }

        if op.status == OperationStatus::Completed && op.remote.stop == CallState::NotIssued {
            issue_stop(op, now, &mut out);
        }
        out
    }

    /// Apply the result of a stop call. Ignored unless the stop is in flight.
    pub fn apply_stop_outcome(
        &mut self,
        id: &str,
        result: Result<Value, GatewayError>,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let Some(op) = self.operations.get_mut(id) else {
            debug!(operation_id = %id, "stop outcome for unknown operation");
            return Vec::new();
        };
        if op.remote.stop != CallState::InFlight {
            return Vec::new();
        }

        match result {
            Ok(data) => {
                op.remote.stop = CallState::Confirmed;
                op.remote.artifact_ref = artifact_ref_from(&data);
                info!(
                    operation_id = %id,
                    artifact = op.remote.artifact_ref.as_deref().unwrap_or("-"),
                    "remote recording stopped"
                );
                vec![Event::RemoteConfirmed {
                    operation_id: id.to_string(),
                    action: RemoteAction::Stop,
                    at: now,
                }]
            }
            Err(err) => {
                warn!(operation_id = %id, error = %err, "remote stop failed");
                op.record_failure(RemoteAction::Stop, err.kind(), err.to_string(), now);
                vec![remote_failed(id, RemoteAction::Stop, err.kind(), err.to_string(), now)]
            }
        }
    }

    /// Drop finished operations whose window ended more than `retention`
    /// before `now`. Pending and active ones are always kept, as is anything
    /// with a remote call still in flight.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        // Nothing can have ended before the earliest representable instant.
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return 0;
        };
        let before = self.operations.len();
        self.operations.retain(|_, op| {
            !(op.status.is_terminal() && !op.remote.in_flight() && op.ends_at() < cutoff)
        });
        let pruned = before - self.operations.len();
        if pruned > 0 {
            info!(pruned, retention_days = retention.num_days(), "pruned finished operations");
        }
        pruned
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<&ScheduledOperation> {
        self.operations.get(id)
    }

    /// Every operation, ascending by `scheduled_at`.
    pub fn list(&self) -> Vec<ScheduledOperation> {
        let mut ops: Vec<_> = self.operations.values().cloned().collect();
        sort_for_display(&mut ops);
        ops
    }

    pub fn list_for_device(&self, device_id: &str) -> Vec<ScheduledOperation> {
        let mut ops: Vec<_> = self
            .operations
            .values()
            .filter(|op| op.device_id == device_id)
            .cloned()
            .collect();
        sort_for_display(&mut ops);
        ops
    }

    pub fn count_by_status(&self, status: OperationStatus) -> usize {
        self.operations.values().filter(|op| op.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn ordered_mut(&mut self) -> Vec<&mut ScheduledOperation> {
        let mut ops: Vec<_> = self.operations.values_mut().collect();
        ops.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        ops
    }
}

fn sort_for_display(ops: &mut [ScheduledOperation]) {
    ops.sort_by(|a, b| {
        a.scheduled_at
            .cmp(&b.scheduled_at)
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Issue the stop call for a completed operation, or record why it cannot be
/// issued. Leaves the stop untouched while the start is still in flight.
fn issue_stop(op: &mut ScheduledOperation, now: DateTime<Utc>, out: &mut EngineOutput) {
    if op.remote.start == CallState::InFlight {
        debug!(operation_id = %op.id, "stop deferred until start call resolves");
        return;
    }
    match op.remote.recording_id.clone() {
        Some(recording_id) => {
            op.remote.stop = CallState::InFlight;
            out.commands.push(RemoteCommand::Stop {
                operation_id: op.id.clone(),
                device_id: op.device_id.clone(),
                op_type: op.op_type,
                recording_id,
            });
        }
        None => {
            let detail = "no recording id from the start call";
            warn!(operation_id = %op.id, "cannot stop recording, {detail}");
            op.record_failure(RemoteAction::Stop, "local", detail, now);
            out.events.push(remote_failed(&op.id, RemoteAction::Stop, "local", detail.to_string(), now));
        }
    }
}

fn remote_failed(
    id: &str,
    action: RemoteAction,
    kind: &str,
    detail: String,
    at: DateTime<Utc>,
) -> Event {
    Event::RemoteFailed {
        operation_id: id.to_string(),
        action,
        error_kind: kind.to_string(),
        detail,
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RecordingKind;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    fn devices() -> BTreeSet<String> {
        ["D1", "D2"].iter().map(|s| s.to_string()).collect()
    }

    fn schedule_at(engine: &mut ScheduleEngine, device: &str, at: i64, minutes: i64) -> String {
        engine
            .schedule(
                ScheduleRequest::new(device, RecordingKind::Audio, t(at), minutes),
                &devices(),
                t(at - 10),
            )
            .unwrap()
            .id
    }

    fn status(engine: &ScheduleEngine, id: &str) -> OperationStatus {
        engine.get(id).unwrap().status
    }

    #[test]
    fn schedule_validates_input() {
        let mut engine = ScheduleEngine::new();
        let err = engine
            .schedule(ScheduleRequest::new("D1", RecordingKind::Audio, t(0), 0), &devices(), t(0))
            .unwrap_err();
        assert_eq!(err, ScheduleError::Validation(ValidationError::NonPositiveDuration(0)));

        let err = engine
            .schedule(ScheduleRequest::new("D1", RecordingKind::Audio, t(0), -3), &devices(), t(0))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(ValidationError::NonPositiveDuration(-3))));

        let err = engine
            .schedule(ScheduleRequest::new("nope", RecordingKind::Video, t(0), 5), &devices(), t(0))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(ValidationError::UnknownDevice(_))));
        assert!(engine.is_empty());
    }

    #[test]
    fn schedule_creates_pending_operation() {
        let mut engine = ScheduleEngine::new();
        let op = engine
            .schedule(
                ScheduleRequest::new(" D1 ", RecordingKind::Video, t(600), 15).with_note("gate"),
                &devices(),
                t(0),
            )
            .unwrap();
        assert!(op.id.starts_with("SCHED-"));
        assert_eq!(op.device_id, "D1");
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.created_at, t(0));
        assert_eq!(op.note.as_deref(), Some("gate"));
        assert_eq!(engine.get(&op.id), Some(&op));
    }

    #[test]
    fn scenario_start_then_stop_exactly_once() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 0, 5);

        assert!(engine.tick(t(-1)).is_empty());
        assert_eq!(status(&engine, &id), OperationStatus::Pending);

        let out = engine.tick(t(0));
        assert_eq!(status(&engine, &id), OperationStatus::Active);
        assert_eq!(out.commands.len(), 1);
        assert_eq!(out.commands[0].action(), RemoteAction::Start);
        assert!(engine.tick(t(0)).commands.is_empty());

        engine.apply_start_outcome(&id, Ok(json!({"recordingId": "rec-1"})), t(1));
        assert!(engine.get(&id).unwrap().remote.start_confirmed());

        // Window end itself still belongs to the window.
        assert!(engine.tick(t(300)).is_empty());

        let out = engine.tick(t(301));
        assert_eq!(status(&engine, &id), OperationStatus::Completed);
        assert_eq!(
            out.commands,
            vec![RemoteCommand::Stop {
                operation_id: id.clone(),
                device_id: "D1".into(),
                op_type: RecordingKind::Audio,
                recording_id: "rec-1".into(),
            }]
        );
        assert!(engine.tick(t(301)).is_empty());

        let events = engine.apply_stop_outcome(&id, Ok(json!({"fileUrl": "/files/rec-1.mp3"})), t(302));
        assert_eq!(events.len(), 1);
        let remote = &engine.get(&id).unwrap().remote;
        assert!(remote.stop_confirmed());
        assert_eq!(remote.artifact_ref.as_deref(), Some("/files/rec-1.mp3"));
    }

    #[test]
    fn gateway_failure_does_not_hold_back_status() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 0, 1);
        engine.tick(t(0));

        let out = engine.apply_start_outcome(&id, Err(GatewayError::Network("down".into())), t(1));
        assert!(matches!(
            out.events.as_slice(),
            [Event::RemoteFailed { action: RemoteAction::Start, .. }]
        ));
        assert_eq!(status(&engine, &id), OperationStatus::Active);

        let out = engine.tick(t(61));
        assert_eq!(status(&engine, &id), OperationStatus::Completed);
        // Nothing was started, so there is nothing to stop remotely.
        assert!(out.commands.is_empty());
        let remote = &engine.get(&id).unwrap().remote;
        assert_eq!(remote.start, CallState::Failed);
        assert_eq!(remote.stop, CallState::Failed);
        assert_eq!(remote.last_error.as_ref().unwrap().action, RemoteAction::Stop);
    }

    #[test]
    fn overdue_operation_moves_one_step_per_tick() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 0, 5);

        let out = engine.tick(t(3_600));
        assert_eq!(status(&engine, &id), OperationStatus::Active);
        assert_eq!(out.commands.len(), 1);

        engine.apply_start_outcome(&id, Ok(json!({"recording": {"id": "r9"}})), t(3_601));
        let out = engine.tick(t(3_630));
        assert_eq!(status(&engine, &id), OperationStatus::Completed);
        assert!(matches!(&out.commands[..], [RemoteCommand::Stop { recording_id, .. }] if recording_id == "r9"));
    }

    #[test]
    fn stop_waits_for_a_slow_start() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 0, 1);
        engine.tick(t(0));

        // Window elapses while the start call is still running.
        let out = engine.tick(t(61));
        assert_eq!(status(&engine, &id), OperationStatus::Completed);
        assert!(out.commands.is_empty());
        assert_eq!(engine.get(&id).unwrap().remote.stop, CallState::NotIssued);

        let out = engine.apply_start_outcome(&id, Ok(json!({"recordingId": "late"})), t(70));
        assert!(matches!(&out.commands[..], [RemoteCommand::Stop { recording_id, .. }] if recording_id == "late"));

        // A duplicate outcome is ignored.
        assert!(engine
            .apply_start_outcome(&id, Ok(json!({"recordingId": "late"})), t(71))
            .is_empty());
    }

    #[test]
    fn cancel_only_from_pending() {
        let mut engine = ScheduleEngine::new();
        let pending = schedule_at(&mut engine, "D1", 100, 5);
        let active = schedule_at(&mut engine, "D2", 0, 5);
        engine.tick(t(0));

        let cancelled = engine.cancel(&pending).unwrap();
        assert_eq!(cancelled.status, OperationStatus::Cancelled);

        let err = engine.cancel(&active).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::NotCancellable {
                id: active.clone(),
                status: OperationStatus::Active
            }
        );
        assert_eq!(status(&engine, &active), OperationStatus::Active);

        assert!(matches!(engine.cancel(&pending), Err(ScheduleError::NotCancellable { .. })));
        assert_eq!(engine.cancel("SCHED-missing"), Err(ScheduleError::NotFound("SCHED-missing".into())));

        // A cancelled operation never starts.
        assert!(engine.tick(t(200)).commands.iter().all(|c| c.operation_id() != pending));
        assert_eq!(status(&engine, &pending), OperationStatus::Cancelled);
    }

    #[test]
    fn statuses_only_move_forward() {
        let mut engine = ScheduleEngine::new();
        let ids: Vec<_> = (0..6).map(|i| schedule_at(&mut engine, "D1", i * 40, 1)).collect();
        engine.cancel(&ids[3]).unwrap();

        let rank = |s: OperationStatus| match s {
            OperationStatus::Pending => 0,
            OperationStatus::Active | OperationStatus::Cancelled => 1,
            OperationStatus::Completed => 2,
        };
        let mut last: Vec<_> = ids.iter().map(|id| status(&engine, id)).collect();
        for s in (0..400).step_by(13) {
            let out = engine.tick(t(s));
            for cmd in out.commands {
                if cmd.action() == RemoteAction::Start {
                    engine.apply_start_outcome(cmd.operation_id(), Ok(json!({"id": "r"})), t(s));
                }
            }
            for (i, id) in ids.iter().enumerate() {
                let now = status(&engine, id);
                assert!(rank(now) >= rank(last[i]), "{id} went {} -> {now}", last[i]);
                if last[i] != now {
                    assert!(last[i].can_transition_to(&now));
                }
                last[i] = now;
            }
        }
        assert_eq!(engine.count_by_status(OperationStatus::Completed), 5);
    }

    #[test]
    fn list_is_ordered_by_scheduled_time() {
        let mut engine = ScheduleEngine::new();
        let late = schedule_at(&mut engine, "D1", 900, 5);
        let early = schedule_at(&mut engine, "D2", 100, 5);
        let mid = schedule_at(&mut engine, "D1", 500, 5);

        let ids: Vec<_> = engine.list().into_iter().map(|op| op.id).collect();
        assert_eq!(ids, vec![early, mid.clone(), late.clone()]);

        let d1: Vec<_> = engine.list_for_device("D1").into_iter().map(|op| op.id).collect();
        assert_eq!(d1, vec![mid, late]);
    }

    #[test]
    fn restore_fails_interrupted_calls() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 0, 5);
        engine.tick(t(0));

        let restored = ScheduleEngine::restore(engine.list(), t(30));
        let op = restored.get(&id).unwrap();
        assert_eq!(op.status, OperationStatus::Active);
        assert_eq!(op.remote.start, CallState::Failed);
        assert_eq!(op.remote.last_error.as_ref().unwrap().kind, "local");
    }

    #[test]
    fn prune_drops_only_old_finished_operations() {
        let mut engine = ScheduleEngine::new();
        let done = schedule_at(&mut engine, "D1", 0, 1);
        let cancelled = schedule_at(&mut engine, "D1", 10_000, 1);
        let active = schedule_at(&mut engine, "D2", 0, 100_000);
        engine.cancel(&cancelled).unwrap();
        engine.tick(t(0));
        engine.apply_start_outcome(&done, Ok(json!({"id": "r1"})), t(1));
        engine.apply_start_outcome(&active, Ok(json!({"id": "r2"})), t(1));
        let out = engine.tick(t(61));
        engine.apply_stop_outcome(&done, Ok(json!({})), t(62));
        assert_eq!(out.commands.len(), 1);

        let retention = Duration::days(1);
        assert_eq!(engine.prune(t(3_600), retention), 0);

        let much_later = t(10_060) + retention + Duration::seconds(1);
        assert_eq!(engine.prune(much_later, retention), 2);
        assert!(engine.get(&done).is_none());
        assert!(engine.get(&cancelled).is_none());
        assert!(engine.get(&active).is_some());
    }

    #[test]
    fn prune_with_huge_retention_keeps_everything() {
        let mut engine = ScheduleEngine::new();
        let id = schedule_at(&mut engine, "D1", 10_000, 1);
        engine.cancel(&id).unwrap();

        assert_eq!(engine.prune(t(20_000), Duration::days(1_000_000_000)), 0);
        assert!(engine.get(&id).is_some());
    }
}

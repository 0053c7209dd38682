//! Process runtime: wires the gateway, presence tracker and schedule engine
//! together and drives them from background tasks.
//!
//! Two tasks run for the lifetime of a [`Console`]:
//! - the ticker, which calls [`ScheduleEngine::tick`] on a fixed period and
//!   dispatches the resulting remote calls on their own tasks;
//! - the presence watchdog, which sleeps until the tracker's next expiry and
//!   is woken early whenever a signal re-arms a timer.
//!
//! All state sits behind one mutex. Network calls never run under it; their
//! results are applied when they resolve.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, GatewayError, ScheduleError};
use crate::events::Event;
use crate::gateway::RequestGateway;
use crate::presence::{Device, PresenceTracker, PresenceView, SignalEvent};
use crate::schedule::{
    OpType, RemoteCommand, ScheduleEngine, ScheduleRequest, ScheduledOperation,
};
use crate::storage::{Config, DeviceStore, OperationStore};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Timing knobs for a [`Console`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleOptions {
    pub tick_interval: StdDuration,
    pub liveness_window: Duration,
    pub retention: Duration,
}

impl ConsoleOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            liveness_window: config.liveness_window(),
            retention: config.retention(),
        }
    }
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where the console keeps its registries.
#[derive(Debug, Clone)]
pub struct Stores {
    pub devices: DeviceStore,
    pub operations: OperationStore,
}

impl Stores {
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            devices: DeviceStore::in_dir(dir),
            operations: OperationStore::in_dir(dir),
        }
    }
}

/// Operator command accepted by a running console, tagged by `command`.
///
/// ```json
/// {"command":"schedule","deviceId":"D1","type":"Audio","scheduledDateTime":"2026-10-16T09:00:00Z","duration":5}
/// {"command":"cancel","id":"SCHED-..."}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ConsoleCommand {
    #[serde(rename_all = "camelCase")]
    Schedule {
        device_id: String,
        #[serde(rename = "type")]
        op_type: OpType,
        #[serde(rename = "scheduledDateTime")]
        scheduled_at: DateTime<Utc>,
        #[serde(rename = "duration")]
        duration_minutes: i64,
        #[serde(default)]
        note: Option<String>,
    },
    Cancel {
        id: String,
    },
}

impl ConsoleCommand {
    fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Schedule { .. } => "schedule",
            ConsoleCommand::Cancel { .. } => "cancel",
        }
    }
}

/// One line of console input: a device signal or an operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Signal(SignalEvent),
    Command(ConsoleCommand),
}

impl ConsoleInput {
    /// Objects carrying a `command` field are commands; anything else must
    /// be a signal.
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("command").is_some() {
            serde_json::from_value(value).map(ConsoleInput::Command)
        } else {
            serde_json::from_value(value).map(ConsoleInput::Signal)
        }
    }
}

struct State {
    tracker: PresenceTracker,
    engine: ScheduleEngine,
}

struct Shared {
    state: Mutex<State>,
    gateway: Arc<RequestGateway>,
    stores: Stores,
    events: broadcast::Sender<Event>,
    rearm: Notify,
    retention: Duration,
}

pub struct Console {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl Console {
    /// Load both registries, rebuild presence timers and start the
    /// background tasks. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if either registry exists but cannot be read.
    pub fn start(
        gateway: Arc<RequestGateway>,
        stores: Stores,
        options: ConsoleOptions,
    ) -> Result<Self, CoreError> {
        let now = Utc::now();
        let seeds = stores.devices.load()?;
        let operations = stores.operations.load()?;

        let mut tracker = PresenceTracker::new(options.liveness_window);
        tracker.initialize(seeds, now);
        let engine = ScheduleEngine::restore(operations, now);
        info!(
            devices = tracker.len(),
            online = tracker.online_count(),
            operations = engine.len(),
            tick_ms = options.tick_interval.as_millis() as u64,
            "console starting"
        );

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            state: Mutex::new(State { tracker, engine }),
            gateway,
            stores,
            events,
            rearm: Notify::new(),
            retention: options.retention,
        });

        let ticker = tokio::spawn(run_ticker(shared.clone(), options.tick_interval));
        let watchdog = tokio::spawn(run_watchdog(shared.clone()));

        Ok(Self {
            shared,
            ticker: Some(ticker),
            watchdog: Some(watchdog),
        })
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.shared.gateway
    }

    /// Stream of every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Feed one signal from the ingestion path.
    pub fn ingest(&self, signal: SignalEvent) {
        let accepted = !signal.device_id.trim().is_empty();
        let events = {
            let mut state = self.shared.lock();
            let events = state.tracker.record_signal(signal, Utc::now());
            if accepted {
                self.shared.persist_devices(&state);
            }
            events
        };
        self.shared.rearm.notify_one();
        self.shared.publish(events);
    }

    /// Add a device to the registry without a signal.
    pub fn register_device(&self, id: &str, name: Option<String>) -> bool {
        let mut state = self.shared.lock();
        let added = state.tracker.register(id, name);
        if added {
            self.shared.persist_devices(&state);
        }
        added
    }

    pub fn schedule(&self, request: ScheduleRequest) -> Result<ScheduledOperation, ScheduleError> {
        let now = Utc::now();
        let op = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let op = state.engine.schedule(request, &state.tracker, now)?;
            self.shared.persist_operations(state);
            op
        };
        self.shared.publish([Event::OperationScheduled {
            operation_id: op.id.clone(),
            device_id: op.device_id.clone(),
            op_type: op.op_type,
            scheduled_at: op.scheduled_at,
            at: now,
        }]);
        Ok(op)
    }

    pub fn cancel(&self, id: &str) -> Result<ScheduledOperation, ScheduleError> {
        let op = {
            let mut state = self.shared.lock();
            let op = state.engine.cancel(id)?;
            self.shared.persist_operations(&state);
            op
        };
        self.shared.publish([Event::OperationCancelled {
            operation_id: op.id.clone(),
            at: Utc::now(),
        }]);
        Ok(op)
    }

    /// Run one scheduler pass immediately, outside the ticker's cadence.
    pub fn tick_now(&self) {
        self.shared.tick(Utc::now());
    }

    /// Apply an operator command. A refused command is also published as
    /// `CommandRejected`. A schedule that is already due starts right away.
    pub fn handle(&self, command: ConsoleCommand) -> Result<ScheduledOperation, ScheduleError> {
        let name = command.name();
        let result = match command {
            ConsoleCommand::Schedule {
                device_id,
                op_type,
                scheduled_at,
                duration_minutes,
                note,
            } => {
                let mut request =
                    ScheduleRequest::new(device_id, op_type, scheduled_at, duration_minutes);
                request.note = note;
                let result = self.schedule(request);
                if matches!(&result, Ok(op) if op.window_open(Utc::now())) {
                    self.tick_now();
                }
                result
            }
            ConsoleCommand::Cancel { id } => self.cancel(&id),
        };
        if let Err(e) = &result {
            warn!(command = name, error = %e, "command rejected");
            self.shared.publish([Event::CommandRejected {
                command: name.to_string(),
                error: e.to_string(),
                at: Utc::now(),
            }]);
        }
        result
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn devices(&self) -> Vec<Device> {
        self.shared.lock().tracker.snapshot()
    }

    pub fn presence(&self) -> Vec<PresenceView> {
        self.shared.lock().tracker.views()
    }

    pub fn operations(&self) -> Vec<ScheduledOperation> {
        self.shared.lock().engine.list()
    }

    pub fn operation(&self, id: &str) -> Option<ScheduledOperation> {
        self.shared.lock().engine.get(id).cloned()
    }

    /// Stop the background tasks and flush both registries.
    ///
    /// Remote calls already in flight are left to finish on their own.
    pub fn shutdown(mut self) {
        self.abort_tasks();
        let state = self.shared.lock();
        self.shared.persist_devices(&state);
        self.shared.persist_operations(&state);
        info!("console stopped");
    }

    fn abort_tasks(&mut self) {
        for handle in [self.ticker.take(), self.watchdog.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            debug!(at = %event.at(), ?event, "publishing");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn persist_devices(&self, state: &State) {
        if let Err(e) = self.stores.devices.save(&state.tracker.seeds()) {
            error!(error = %e, "failed to persist device registry");
        }
    }

    fn persist_operations(&self, state: &State) {
        if let Err(e) = self.stores.operations.save(&state.engine.list()) {
            error!(error = %e, "failed to persist operation registry");
        }
    }

    fn tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let (output, pruned) = {
            let mut state = self.lock();
            let output = state.engine.tick(now);
            let pruned = state.engine.prune(now, self.retention);
            if !output.is_empty() || pruned > 0 {
                self.persist_operations(&state);
            }
            (output, pruned)
        };
        self.publish(output.events);
        if pruned > 0 {
            self.publish([Event::OperationsPruned { count: pruned, at: now }]);
        }
        spawn_dispatch(self.clone(), output.commands);
    }

    fn expire_presence(&self, now: DateTime<Utc>) {
        let events = {
            let mut state = self.lock();
            let events = state.tracker.expire_due(now);
            if !events.is_empty() {
                self.persist_devices(&state);
            }
            events
        };
        self.publish(events);
    }

    fn next_presence_deadline(&self) -> Option<DateTime<Utc>> {
        self.lock().tracker.next_deadline()
    }
}

async fn run_ticker(shared: Arc<Shared>, period: StdDuration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        shared.tick(Utc::now());
    }
}

async fn run_watchdog(shared: Arc<Shared>) {
    loop {
        let notified = shared.rearm.notified();
        match shared.next_presence_deadline() {
            Some(deadline) => {
                // Expiry is strictly after the deadline.
                let wait = (deadline - Utc::now())
                    .to_std()
                    .unwrap_or(StdDuration::ZERO)
                    + StdDuration::from_millis(1);
                tokio::select! {
                    _ = time::sleep(wait) => {}
                    _ = notified => continue,
                }
            }
            None => {
                notified.await;
                continue;
            }
        }
        shared.expire_presence(Utc::now());
    }
}

/// Run each command on its own task and feed the outcome back.
fn spawn_dispatch(shared: Arc<Shared>, commands: Vec<RemoteCommand>) {
    for command in commands {
        let shared = shared.clone();
        tokio::spawn(async move {
            let id = command.operation_id().to_string();
            let result = execute_command(&shared.gateway, &command).await;
            let session_expired = matches!(result, Err(GatewayError::AuthExpired));

            let (events, follow_up) = {
                let mut state = shared.lock();
                let now = Utc::now();
                let (events, follow_up) = match command {
                    RemoteCommand::Start { .. } => {
                        let out = state.engine.apply_start_outcome(&id, result, now);
                        (out.events, out.commands)
                    }
                    RemoteCommand::Stop { .. } => {
                        (state.engine.apply_stop_outcome(&id, result, now), Vec::new())
                    }
                };
                shared.persist_operations(&state);
                (events, follow_up)
            };

            shared.publish(events);
            if session_expired {
                warn!(operation_id = %id, "session expired during scheduled call");
                shared.publish([Event::SessionExpired { at: Utc::now() }]);
            }
            spawn_dispatch(shared, follow_up);
        });
    }
}

async fn execute_command(
    gateway: &RequestGateway,
    command: &RemoteCommand,
) -> Result<serde_json::Value, GatewayError> {
    debug!(operation_id = command.operation_id(), action = %command.action(), "dispatching remote call");
    let response = match command {
        RemoteCommand::Start {
            device_id, op_type, ..
        } => gateway.start_recording(device_id, *op_type).await?,
        RemoteCommand::Stop {
            device_id,
            op_type,
            recording_id,
            ..
        } => gateway.stop_recording(device_id, *op_type, recording_id).await?,
    };
    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayConfig, RecordingKind, Session};
    use crate::presence::{DeviceSeed, PresenceState};
    use crate::schedule::{CallState, OperationStatus, RemoteAction};
    use mockito::Matcher;

    fn fast_options() -> ConsoleOptions {
        ConsoleOptions {
            tick_interval: StdDuration::from_millis(20),
            liveness_window: Duration::milliseconds(200),
            retention: Duration::days(30),
        }
    }

    fn gateway(url: &str) -> Arc<RequestGateway> {
        let gateway = RequestGateway::new(GatewayConfig::new(url)).unwrap();
        gateway.set_session(Session::new("tok", Some("ref".into())));
        Arc::new(gateway)
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<Event>, mut pred: F) -> Event
    where
        F: FnMut(&Event) -> bool,
    {
        time::timeout(StdDuration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn overdue_operation_is_started_then_stopped() {
        let mut server = mockito::Server::new_async().await;
        let start = server
            .mock("POST", "/api/devices/D1/audio/record")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"recordingId":"rec-7"}"#)
            .expect(1)
            .create_async()
            .await;
        let stop = server
            .mock("POST", "/api/devices/D1/audio/rec-7/stop")
            .with_status(200)
            .with_body(r#"{"recording":{"fileUrl":"/files/rec-7.mp3"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::in_dir(dir.path());
        stores.devices.save(&[DeviceSeed::new("D1")]).unwrap();

        let console = Console::start(gateway(&server.url()), stores.clone(), fast_options()).unwrap();
        let mut rx = console.subscribe();
        let op = console
            .schedule(ScheduleRequest::new(
                "D1",
                RecordingKind::Audio,
                Utc::now() - Duration::minutes(10),
                1,
            ))
            .unwrap();

        wait_for(&mut rx, |e| {
            matches!(e, Event::RemoteConfirmed { action: RemoteAction::Stop, .. })
        })
        .await;

        let done = console.operation(&op.id).unwrap();
        assert_eq!(done.status, OperationStatus::Completed);
        assert_eq!(done.remote.recording_id.as_deref(), Some("rec-7"));
        assert_eq!(done.remote.artifact_ref.as_deref(), Some("/files/rec-7.mp3"));

        // Further ticks issue nothing more.
        time::sleep(StdDuration::from_millis(100)).await;
        start.assert_async().await;
        stop.assert_async().await;

        console.shutdown();
        let persisted = stores.operations.load().unwrap();
        assert_eq!(persisted[0].status, OperationStatus::Completed);
        assert!(persisted[0].remote.stop_confirmed());
    }

    #[tokio::test]
    async fn failed_start_is_recorded_without_blocking_status() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", Matcher::Regex(r"^/api/devices/D1/video/record$".into()))
            .with_status(503)
            .with_body(r#"{"message":"device busy"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let console =
            Console::start(gateway(&server.url()), Stores::in_dir(dir.path()), fast_options()).unwrap();
        console.register_device("D1", None);
        let mut rx = console.subscribe();
        let op = console
            .schedule(ScheduleRequest::new(
                "D1",
                RecordingKind::Video,
                Utc::now() - Duration::seconds(1),
                30,
            ))
            .unwrap();

        let failed = wait_for(&mut rx, |e| matches!(e, Event::RemoteFailed { .. })).await;
        assert!(matches!(
            failed,
            Event::RemoteFailed { action: RemoteAction::Start, ref error_kind, .. } if error_kind == "server_error"
        ));
        let op = console.operation(&op.id).unwrap();
        assert_eq!(op.status, OperationStatus::Active);
        assert_eq!(op.remote.start, CallState::Failed);
        assert!(console.cancel(&op.id).is_err());
    }

    #[tokio::test]
    async fn expired_session_is_announced() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", "/api/devices/D1/audio/record")
            .with_status(401)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/api/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&server.url());
        let console = Console::start(gw.clone(), Stores::in_dir(dir.path()), fast_options()).unwrap();
        console.register_device("D1", None);
        let mut rx = console.subscribe();
        console
            .schedule(ScheduleRequest::new("D1", RecordingKind::Audio, Utc::now(), 5))
            .unwrap();

        wait_for(&mut rx, |e| matches!(e, Event::SessionExpired { .. })).await;
        assert!(!gw.is_authenticated());
    }

    #[tokio::test]
    async fn watchdog_takes_silent_device_offline() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::in_dir(dir.path());
        let console =
            Console::start(gateway("http://127.0.0.1:9"), stores.clone(), fast_options()).unwrap();
        let mut rx = console.subscribe();

        console.ingest(SignalEvent::at_position("D1", 48.85, 2.35));
        wait_for(&mut rx, |e| {
            matches!(e, Event::PresenceChanged { state: PresenceState::Online, .. })
        })
        .await;
        assert_eq!(console.presence()[0].presence_state, PresenceState::Online);

        wait_for(&mut rx, |e| {
            matches!(e, Event::PresenceChanged { state: PresenceState::Offline, .. })
        })
        .await;
        let device = &console.devices()[0];
        assert_eq!(device.presence_state, PresenceState::Offline);
        assert!(device.last_signal.at().is_some());

        let seeds = stores.devices.load().unwrap();
        assert_eq!(seeds[0].id, "D1");
        assert!(seeds[0].last_signal_at.is_some());
    }

    #[tokio::test]
    async fn restart_restores_presence_from_registry() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::in_dir(dir.path());
        let recent = (Utc::now() - Duration::seconds(10)).to_rfc3339();
        let stale = (Utc::now() - Duration::hours(1)).to_rfc3339();
        stores
            .devices
            .save(&[
                DeviceSeed::new("recent").with_last_signal(recent),
                DeviceSeed::new("stale").with_last_signal(stale),
            ])
            .unwrap();

        let options = ConsoleOptions {
            liveness_window: Duration::minutes(5),
            ..fast_options()
        };
        let console = Console::start(gateway("http://127.0.0.1:9"), stores, options).unwrap();
        let states: Vec<_> = console
            .presence()
            .into_iter()
            .map(|v| (v.device_id, v.presence_state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("recent".to_string(), PresenceState::Online),
                ("stale".to_string(), PresenceState::Offline),
            ]
        );
    }

    #[tokio::test]
    async fn schedule_rejects_unknown_device() {
        let dir = tempfile::tempdir().unwrap();
        let console =
            Console::start(gateway("http://127.0.0.1:9"), Stores::in_dir(dir.path()), fast_options()).unwrap();
        let err = console
            .schedule(ScheduleRequest::new("ghost", RecordingKind::Audio, Utc::now(), 5))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));
        assert!(console.operations().is_empty());
    }

    #[test]
    fn input_lines_split_into_signals_and_commands() {
        let signal = ConsoleInput::parse_line(r#"{"deviceId":"D1","lat":52.1}"#).unwrap();
        assert!(matches!(signal, ConsoleInput::Signal(ref s) if s.device_id == "D1"));

        let schedule = ConsoleInput::parse_line(
            r#"{"command":"schedule","deviceId":"D1","type":"Video","scheduledDateTime":"2026-10-16T09:00:00Z","duration":15,"note":"gate"}"#,
        )
        .unwrap();
        match schedule {
            ConsoleInput::Command(ConsoleCommand::Schedule {
                device_id,
                op_type,
                duration_minutes,
                note,
                ..
            }) => {
                assert_eq!(device_id, "D1");
                assert_eq!(op_type, RecordingKind::Video);
                assert_eq!(duration_minutes, 15);
                assert_eq!(note.as_deref(), Some("gate"));
            }
            other => panic!("expected schedule command, got {other:?}"),
        }

        let cancel = ConsoleInput::parse_line(r#"{"command":"cancel","id":"SCHED-1"}"#).unwrap();
        assert_eq!(
            cancel,
            ConsoleInput::Command(ConsoleCommand::Cancel { id: "SCHED-1".into() })
        );

        assert!(ConsoleInput::parse_line(r#"{"command":"reboot"}"#).is_err());
        assert!(ConsoleInput::parse_line("not json").is_err());
    }

    #[tokio::test]
    async fn commands_schedule_and_cancel_through_the_running_console() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::in_dir(dir.path());
        stores.devices.save(&[DeviceSeed::new("D1")]).unwrap();
        let console =
            Console::start(gateway("http://127.0.0.1:9"), stores.clone(), fast_options()).unwrap();

        let op = console
            .handle(ConsoleCommand::Schedule {
                device_id: "D1".into(),
                op_type: RecordingKind::Audio,
                scheduled_at: Utc::now() + Duration::hours(1),
                duration_minutes: 5,
                note: None,
            })
            .unwrap();
        assert_eq!(stores.operations.load().unwrap().len(), 1);

        let cancelled = console.handle(ConsoleCommand::Cancel { id: op.id.clone() }).unwrap();
        assert_eq!(cancelled.status, OperationStatus::Cancelled);
        let saved = stores.operations.load().unwrap();
        assert_eq!(saved[0].status, OperationStatus::Cancelled);
        console.shutdown();
    }

    #[tokio::test]
    async fn refused_command_is_announced() {
        let dir = tempfile::tempdir().unwrap();
        let console =
            Console::start(gateway("http://127.0.0.1:9"), Stores::in_dir(dir.path()), fast_options()).unwrap();
        let mut rx = console.subscribe();

        let err = console
            .handle(ConsoleCommand::Cancel { id: "SCHED-missing".into() })
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NotFound(_)));

        let event = wait_for(&mut rx, |e| matches!(e, Event::CommandRejected { .. })).await;
        match event {
            Event::CommandRejected { command, error, .. } => {
                assert_eq!(command, "cancel");
                assert!(error.contains("SCHED-missing"), "{error}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

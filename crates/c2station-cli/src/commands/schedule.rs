use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use c2station_core::schedule::CallState;
use c2station_core::{
    data_dir, Config, ConsoleLock, DeviceStore, OpType, OperationStore, ScheduleEngine,
    ScheduleRequest, ScheduledOperation,
};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Schedule a recording
    Add {
        device: String,
        /// audio or video
        #[arg(value_parser = parse_op_type)]
        kind: OpType,
        /// Start time, RFC 3339 (e.g. 2026-10-16T09:00:00Z)
        #[arg(value_parser = parse_start)]
        at: DateTime<Utc>,
        /// Duration in minutes
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// List scheduled recordings, earliest first
    List {
        #[arg(long)]
        device: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel a pending recording
    Cancel { id: String },
    /// Drop finished recordings older than the retention period
    Prune,
}

fn parse_op_type(s: &str) -> Result<OpType, String> {
    s.parse()
}

fn parse_start(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("'{s}' is not an RFC 3339 timestamp: {e}"))
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    // A running console owns operations.json and would overwrite edits made
    // here; it takes the same changes as stdin commands instead.
    if !matches!(action, ScheduleAction::List { .. }) {
        ConsoleLock::ensure_free(&data_dir()?)?;
    }
    let config = Config::load()?;
    let store = OperationStore::open_default()?;
    let now = Utc::now();
    let mut engine = ScheduleEngine::restore(store.load()?, now);

    match action {
        ScheduleAction::Add {
            device,
            kind,
            at,
            minutes,
            note,
        } => {
            let known: BTreeSet<String> = DeviceStore::open_default()?
                .load()?
                .into_iter()
                .map(|seed| seed.id)
                .collect();
            let mut request = ScheduleRequest::new(device, kind, at, minutes);
            request.note = note;
            let op = engine.schedule(request, &known, now)?;
            store.save(&engine.list())?;
            println!("{}", op.id);
        }
        ScheduleAction::List { device, json } => {
            let ops = match device.as_deref() {
                Some(id) => engine.list_for_device(id),
                None => engine.list(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else if ops.is_empty() {
                println!("no scheduled recordings");
            } else {
                for op in &ops {
                    println!("{}", format_row(op));
                }
            }
        }
        ScheduleAction::Cancel { id } => {
            let op = engine.cancel(&id)?;
            store.save(&engine.list())?;
            println!("cancelled {}", op.id);
        }
        ScheduleAction::Prune => {
            let pruned = engine.prune(now, config.retention());
            store.save(&engine.list())?;
            println!(
                "pruned {pruned} operations older than {} days",
                config.schedule.retention_days
            );
        }
    }
    Ok(())
}

fn format_row(op: &ScheduledOperation) -> String {
    let remote = match (op.remote.start, op.remote.stop) {
        (_, CallState::Confirmed) => "stopped",
        (CallState::Confirmed, _) => "recording",
        (CallState::Failed, _) | (_, CallState::Failed) => "remote error",
        (CallState::InFlight, _) | (_, CallState::InFlight) => "waiting",
        _ => "",
    };
    format!(
        "{:<40} {:<16} {:<5} {} {:>4}m  {:<9} {}{}",
        op.id,
        op.device_id,
        op.op_type,
        op.scheduled_at.format("%Y-%m-%d %H:%M"),
        op.duration_minutes,
        op.status,
        remote,
        op.note
            .as_deref()
            .map(|n| format!("  ({n})"))
            .unwrap_or_default()
    )
}

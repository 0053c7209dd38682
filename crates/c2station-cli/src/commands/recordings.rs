use std::path::PathBuf;

use clap::Subcommand;
use c2station_core::RecordingKind;
use serde_json::Value;

use super::ApiArgs;

#[derive(Subcommand)]
pub enum RecordingsAction {
    /// List a device's recordings on the console API
    List {
        device: String,
        /// audio or video; both when omitted
        #[arg(long, value_parser = parse_kind)]
        kind: Option<RecordingKind>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Save a finished recording to disk
    Download {
        #[arg(value_parser = parse_kind)]
        kind: RecordingKind,
        recording_id: String,
        /// Target file; defaults to the recording id in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Delete a recording on the console API
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: RecordingKind,
        recording_id: String,
        #[command(flatten)]
        api: ApiArgs,
    },
}

fn parse_kind(s: &str) -> Result<RecordingKind, String> {
    s.parse()
}

pub fn run(action: RecordingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = c2station_core::Config::load()?;
    let rt = super::runtime()?;

    match action {
        RecordingsAction::List {
            device,
            kind,
            json,
            api,
        } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![RecordingKind::Audio, RecordingKind::Video],
            };
            let listed = rt.block_on(async {
                let gateway = super::connect(&config, &api).await?;
                let mut listed = Vec::new();
                for kind in kinds {
                    for record in gateway.list_recordings(&device, kind).await? {
                        listed.push((kind, record));
                    }
                }
                let _ = gateway.logout().await;
                Ok::<_, Box<dyn std::error::Error>>(listed)
            })?;

            if json {
                let records: Vec<&Value> = listed.iter().map(|(_, r)| r).collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if listed.is_empty() {
                println!("no recordings for {device}");
            } else {
                for (kind, record) in &listed {
                    println!("{}", format_row(*kind, record));
                }
            }
        }
        RecordingsAction::Download {
            kind,
            recording_id,
            output,
            api,
        } => {
            let bytes = rt.block_on(async {
                let gateway = super::connect(&config, &api).await?;
                let bytes = gateway.download_recording(kind, &recording_id).await;
                let _ = gateway.logout().await;
                Ok::<_, Box<dyn std::error::Error>>(bytes?)
            })?;
            let path = output.unwrap_or_else(|| PathBuf::from(&recording_id));
            std::fs::write(&path, &bytes)?;
            println!("saved {} bytes to {}", bytes.len(), path.display());
        }
        RecordingsAction::Delete {
            kind,
            recording_id,
            api,
        } => {
            rt.block_on(async {
                let gateway = super::connect(&config, &api).await?;
                let deleted = gateway.delete_recording(kind, &recording_id).await;
                let _ = gateway.logout().await;
                deleted?;
                Ok::<_, Box<dyn std::error::Error>>(())
            })?;
            println!("deleted {kind} recording {recording_id}");
        }
    }
    Ok(())
}

/// Servers disagree on field names; show whichever id and time are present.
fn format_row(kind: RecordingKind, record: &Value) -> String {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| record.get(*k))
            .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| "-".into())
    };
    format!(
        "{:<5} {:<36} {:<25} {}",
        kind,
        field(&["recordingId", "id", "_id"]),
        field(&["createdAt", "startedAt", "timestamp"]),
        field(&["fileUrl", "url"]),
    )
}

use chrono::Utc;
use clap::Subcommand;
use c2station_core::{data_dir, Config, ConsoleLock, DeviceSeed, DeviceStore, PresenceTracker};

use super::ApiArgs;

#[derive(Subcommand)]
pub enum DevicesAction {
    /// List devices with their presence
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a device to the local registry
    Add {
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Presence of one device, as JSON
    Show { id: String },
    /// Drop a device from the local registry
    Remove { id: String },
    /// Fetch the device list from the console API and merge it locally
    Sync {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Last known position of a device, or its recent track with --history
    Location {
        id: String,
        /// Number of recent samples to fetch instead of the last known one
        #[arg(long, value_name = "N")]
        history: Option<u32>,
        #[command(flatten)]
        api: ApiArgs,
    },
}

pub fn run(action: DevicesAction) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(
        action,
        DevicesAction::Add { .. } | DevicesAction::Remove { .. } | DevicesAction::Sync { .. }
    ) {
        ConsoleLock::ensure_free(&data_dir()?)?;
    }
    let config = Config::load()?;
    let store = DeviceStore::open_default()?;

    match action {
        DevicesAction::List { json } => {
            let mut tracker = PresenceTracker::new(config.liveness_window());
            tracker.initialize(store.load()?, Utc::now());

            if json {
                println!("{}", serde_json::to_string_pretty(&tracker.views())?);
            } else if tracker.is_empty() {
                println!("no devices");
            } else {
                for device in tracker.snapshot() {
                    let last = device
                        .last_signal
                        .at()
                        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".into());
                    println!(
                        "{:<24} {:<8} last signal {}  {}",
                        device.id,
                        device.presence_state,
                        last,
                        device.name.as_deref().unwrap_or("")
                    );
                }
            }
        }
        DevicesAction::Add { id, name } => {
            let id = id.trim().to_string();
            if id.is_empty() {
                return Err("device id must not be empty".into());
            }
            let mut seeds = store.load()?;
            match seeds.iter_mut().find(|s| s.id == id) {
                Some(existing) => {
                    if name.is_some() {
                        existing.name = name;
                    }
                }
                None => seeds.push(DeviceSeed { name, ..DeviceSeed::new(&id) }),
            }
            store.save(&seeds)?;
            println!("device {id} registered");
        }
        DevicesAction::Show { id } => {
            let mut tracker = PresenceTracker::new(config.liveness_window());
            tracker.initialize(store.load()?, Utc::now());
            let view = tracker
                .presence_view(id.trim())
                .ok_or_else(|| format!("unknown device '{id}'"))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        DevicesAction::Remove { id } => {
            let mut tracker = PresenceTracker::new(config.liveness_window());
            tracker.initialize(store.load()?, Utc::now());
            if !tracker.forget(id.trim()) {
                return Err(format!("unknown device '{id}'").into());
            }
            store.save(&tracker.seeds())?;
            println!("device {id} removed");
        }
        DevicesAction::Location { id, history, api } => {
            let rt = super::runtime()?;
            let located = rt.block_on(async {
                let gateway = super::connect(&config, &api).await?;
                let located = match history {
                    Some(limit) => gateway
                        .location_history(&id, limit)
                        .await
                        .map(serde_json::Value::Array),
                    None => gateway.last_known_location(&id).await.map(|r| r.data),
                };
                let _ = gateway.logout().await;
                Ok::<_, Box<dyn std::error::Error>>(located?)
            })?;
            println!("{}", serde_json::to_string_pretty(&located)?);
        }
        DevicesAction::Sync { api } => {
            let rt = super::runtime()?;
            let remote = rt.block_on(async {
                let gateway = super::connect(&config, &api).await?;
                let records = gateway.list_devices().await?;
                let _ = gateway.logout().await;
                Ok::<_, Box<dyn std::error::Error>>(records)
            })?;

            let mut seeds = store.load()?;
            let (mut added, mut updated) = (0, 0);
            for seed in remote.iter().filter_map(DeviceSeed::from_remote) {
                match seeds.iter_mut().find(|s| s.id == seed.id) {
                    Some(existing) => {
                        existing.merge(seed);
                        updated += 1;
                    }
                    None => {
                        seeds.push(seed);
                        added += 1;
                    }
                }
            }
            store.save(&seeds)?;
            println!("synced {} devices ({added} new, {updated} updated)", added + updated);
        }
    }
    Ok(())
}

mod config;
mod lock;
pub mod registry;

pub use config::{
    ApiConfig, AuthConfig, Config, PresenceConfig, ScheduleConfig, MAX_LIVENESS_WINDOW_SECS,
    MAX_RETENTION_DAYS, MAX_TICK_INTERVAL_SECS,
};
pub use lock::{ConsoleLock, LOCK_FILE};
pub use registry::{DeviceStore, JsonStore, OperationStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the station data directory, creating it if needed.
///
/// `C2STATION_HOME` wins when set. Otherwise `~/.config/c2station[-dev]/`,
/// with the `-dev` suffix when `C2STATION_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("C2STATION_HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("C2STATION_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("c2station-dev")
            } else {
                base_dir.join("c2station")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

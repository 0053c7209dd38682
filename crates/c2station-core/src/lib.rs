//! # C2 Station Core Library
//!
//! This library provides the time-driven engines behind the C2 Station fleet
//! console. The operator CLI (and any other front end) is a thin layer over
//! the same core library.
//!
//! ## Architecture
//!
//! - **Request Gateway**: Bearer-token authenticated remote calls with one
//!   refresh and one retry per 401, and a typed error outcome
//! - **Presence Tracker**: Online/Offline from signal recency, with expiry
//!   timers that survive restarts
//! - **Schedule Engine**: Wall-clock lifecycle of time-boxed recordings,
//!   evaluated on a periodic tick
//! - **Console**: tokio runtime that drives the engines and broadcasts events
//! - **Storage**: TOML configuration and JSON device/operation registries
//!
//! ## Key Components
//!
//! - [`RequestGateway`]: Authenticated remote calls
//! - [`PresenceTracker`]: Device liveness
//! - [`ScheduleEngine`]: Scheduled operation lifecycle
//! - [`Console`]: Background ticker and presence watchdog
//! - [`Config`]: Station configuration management

pub mod console;
pub mod error;
pub mod events;
pub mod gateway;
pub mod presence;
pub mod schedule;
pub mod storage;

pub use console::{Console, ConsoleCommand, ConsoleInput, ConsoleOptions, Stores};
pub use error::{
    ConfigError, CoreError, GatewayError, ScheduleError, StoreError, ValidationError,
};
pub use events::Event;
pub use gateway::{ApiRequest, ApiResponse, GatewayConfig, RecordingKind, RequestGateway, Session};
pub use presence::{
    Device, DeviceSeed, LastSignal, PresenceState, PresenceTracker, PresenceView, SignalEvent,
};
pub use schedule::{
    OpType, OperationStatus, RemoteCommand, ScheduleEngine, ScheduleRequest, ScheduledOperation,
};
pub use storage::{data_dir, Config, ConsoleLock, DeviceStore, OperationStore};

//! Scheduled recordings: lifecycle records and the tick-driven engine.

mod engine;
mod operation;

pub use engine::{EngineOutput, RemoteCommand, ScheduleEngine, ScheduleRequest};
pub use operation::{
    CallState, OpType, OperationStatus, OperationTransitionError, RemoteAction, RemoteFailure,
    RemoteState, ScheduledOperation,
};

//! Request gateway: every remote call goes through here.
//!
//! The gateway owns the [`Session`] (bearer + refresh token), attaches the
//! access token to authenticated calls, and recovers from a 401 with at most
//! one refresh followed by at most one retry. Every call returns a
//! [`GatewayResult`]; nothing escapes as a panic or raw transport error.

mod client;
mod endpoints;
mod session;

pub use client::{ApiRequest, ApiResponse, GatewayConfig, RequestGateway, MAX_REFRESH_ATTEMPTS};
pub use endpoints::{RecordingKind, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
pub(crate) use endpoints::{artifact_ref_from, recording_id_from};
pub use session::{Session, SessionStatus};

use crate::error::GatewayError;

/// Result of one logical remote call.
pub type GatewayResult<T> = Result<T, GatewayError>;

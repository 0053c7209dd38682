//! Typed wrappers over the console API routes the core uses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::client::{parse_token_pair, ApiRequest, ApiResponse, RequestGateway};
use super::session::Session;
use super::GatewayResult;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
const DEVICES_PATH: &str = "/api/devices";

/// Kind of recording a device can be asked to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordingKind {
    Audio,
    Video,
}

impl RecordingKind {
    /// Path segment used by the recording routes.
    pub fn path_segment(&self) -> &'static str {
        match self {
            RecordingKind::Audio => "audio",
            RecordingKind::Video => "video",
        }
    }
}

impl std::fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            RecordingKind::Audio => "Audio",
            RecordingKind::Video => "Video",
        })
    }
}

impl std::str::FromStr for RecordingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(RecordingKind::Audio),
            "video" => Ok(RecordingKind::Video),
            other => Err(format!("unknown recording type '{other}' (expected audio or video)")),
        }
    }
}

impl RequestGateway {
    /// Authenticate and install the returned token pair.
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<ApiResponse> {
        let request = ApiRequest::post(LOGIN_PATH)
            .public()
            .with_body(json!({ "username": username, "password": password }));
        let response = self.execute(&request).await?;

        let pair = parse_token_pair(&response.data)?;
        self.set_session(Session::new(pair.token, pair.refresh_token));
        info!(%username, "logged in");
        Ok(response)
    }

    /// End the session server-side. The local session is cleared either way.
    pub async fn logout(&self) -> GatewayResult<ApiResponse> {
        let result = self.execute(&ApiRequest::post(LOGOUT_PATH)).await;
        if let Err(e) = &result {
            warn!(error = %e, "logout call failed, clearing session anyway");
        }
        self.clear_session();
        result
    }

    pub async fn start_recording(
        &self,
        device_id: &str,
        kind: RecordingKind,
    ) -> GatewayResult<ApiResponse> {
        let path = route(&["devices", device_id, kind.path_segment(), "record"]);
        self.execute(&ApiRequest::post(path)).await
    }

    pub async fn stop_recording(
        &self,
        device_id: &str,
        kind: RecordingKind,
        recording_id: &str,
    ) -> GatewayResult<ApiResponse> {
        let path = route(&["devices", device_id, kind.path_segment(), recording_id, "stop"]);
        self.execute(&ApiRequest::post(path)).await
    }

    /// Recordings a device has produced, as raw JSON records.
    pub async fn list_recordings(
        &self,
        device_id: &str,
        kind: RecordingKind,
    ) -> GatewayResult<Vec<Value>> {
        let path = route(&["devices", device_id, kind.path_segment()]);
        let response = self.execute(&ApiRequest::get(path)).await?;
        Ok(unwrap_list(response.data, &["recordings", "data"]))
    }

    /// Raw bytes of a finished recording.
    pub async fn download_recording(
        &self,
        kind: RecordingKind,
        recording_id: &str,
    ) -> GatewayResult<Vec<u8>> {
        let path = route(&["recordings", kind.path_segment(), recording_id, "download"]);
        self.fetch_bytes(&ApiRequest::get(path)).await
    }

    pub async fn delete_recording(
        &self,
        kind: RecordingKind,
        recording_id: &str,
    ) -> GatewayResult<ApiResponse> {
        let path = route(&["recordings", kind.path_segment(), recording_id]);
        self.execute(&ApiRequest::delete(path)).await
    }

    /// Fetch the device registry as raw JSON records.
    ///
    /// Accepts a bare array as well as `{devices: [...]}` or `{data: [...]}`.
    pub async fn list_devices(&self) -> GatewayResult<Vec<Value>> {
        let response = self.execute(&ApiRequest::get(DEVICES_PATH)).await?;
        Ok(unwrap_list(response.data, &["devices", "data"]))
    }

    pub async fn last_known_location(&self, device_id: &str) -> GatewayResult<ApiResponse> {
        let path = route(&["devices", device_id, "location", "last-known"]);
        self.execute(&ApiRequest::get(path)).await
    }

    /// Most recent location samples, newest first as the server orders them.
    pub async fn location_history(&self, device_id: &str, limit: u32) -> GatewayResult<Vec<Value>> {
        let path = format!(
            "{}?limit={limit}",
            route(&["devices", device_id, "location", "history"])
        );
        let response = self.execute(&ApiRequest::get(path)).await?;
        Ok(unwrap_list(response.data, &["locations", "history", "data"]))
    }
}

/// `/api/...` path with each segment percent-encoded, so ids can't escape
/// their segment.
fn route(segments: &[&str]) -> String {
    segments.iter().fold(String::from("/api"), |mut path, segment| {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
        path
    })
}

fn unwrap_list(data: Value, envelopes: &[&str]) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut map) => envelopes
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                Some(Value::Object(inner)) => Some(unwrap_list(Value::Object(inner), envelopes)),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Pick the recording id out of a start-recording response.
pub(crate) fn recording_id_from(data: &Value) -> Option<String> {
    first_string(data, &["recordingId", "recording_id", "id"])
        .or_else(|| data.get("recording").and_then(recording_id_from))
        .or_else(|| data.get("data").and_then(recording_id_from))
}

/// Pick the artifact reference (file name / URL) out of a stop response.
pub(crate) fn artifact_ref_from(data: &Value) -> Option<String> {
    first_string(data, &["fileUrl", "file_url", "url", "filename", "file_name"])
        .or_else(|| data.get("recording").and_then(artifact_ref_from))
        .or_else(|| data.get("data").and_then(artifact_ref_from))
}

fn first_string(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match data.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

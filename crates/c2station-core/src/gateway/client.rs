//! HTTP execution with bearer auth and bounded refresh-and-retry.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::endpoints::REFRESH_PATH;
use super::session::{Session, SessionStatus};
use super::GatewayResult;
use crate::error::{ConfigError, GatewayError};

/// A 401 is answered with at most this many refresh-then-retry rounds.
pub const MAX_REFRESH_ATTEMPTS: u8 = 1;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`RequestGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Share one refresh between concurrent callers that hit 401 together.
    pub single_flight_refresh: bool,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_TIMEOUT,
            single_flight_refresh: true,
        }
    }
}

/// One logical remote call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub auth_required: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            auth_required: true,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mark the call as not needing a bearer token.
    pub fn public(mut self) -> Self {
        self.auth_required = false;
        self
    }
}

/// Parsed payload of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    fn ok(status: u16, data: Value) -> Self {
        Self {
            success: true,
            status,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPair {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Executes remote calls on behalf of the whole process.
///
/// Cloning is not supported; share it behind an `Arc`.
pub struct RequestGateway {
    http: Client,
    base_url: String,
    single_flight_refresh: bool,
    session: RwLock<Session>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl RequestGateway {
    /// Build a gateway for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        url::Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "api.base_url".into(),
            message: e.to_string(),
        })?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "api.request_timeout_secs".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            single_flight_refresh: config.single_flight_refresh,
            session: RwLock::new(Session::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Session ──────────────────────────────────────────────────────

    pub fn session_status(&self) -> SessionStatus {
        self.read_session().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_session().access_token().is_some()
    }

    /// Install a token pair obtained out of band (or by [`Self::login`]).
    pub fn set_session(&self, session: Session) {
        *self.write_session() = session;
    }

    pub fn clear_session(&self) {
        self.write_session().clear();
    }

    fn access_token(&self) -> Option<String> {
        self.read_session().access_token().map(String::from)
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Perform one logical call.
    ///
    /// A 401 on an authenticated call triggers one refresh and one retry;
    /// anything still unauthorized after that is `AuthExpired` and the
    /// session is cleared.
    pub async fn execute(&self, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        let response = self.send_with_recovery(request).await?;
        classify(response).await
    }

    /// Same auth and retry rules as [`Self::execute`], but a 2xx body is
    /// returned as raw bytes instead of being parsed as JSON.
    pub async fn fetch_bytes(&self, request: &ApiRequest) -> GatewayResult<Vec<u8>> {
        let response = self.send_with_recovery(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.map_err(GatewayError::from)?;
            return Err(error_for(status, &text));
        }
        let body = response.bytes().await.map_err(GatewayError::from)?;
        Ok(body.to_vec())
    }

    async fn send_with_recovery(&self, request: &ApiRequest) -> GatewayResult<reqwest::Response> {
        let request_id = short_request_id();
        let mut refreshes: u8 = 0;

        loop {
            let token = if request.auth_required {
                match self.access_token() {
                    Some(token) => Some(token),
                    None => {
                        debug!(%request_id, endpoint = %request.endpoint, "no session, failing fast");
                        return Err(GatewayError::AuthExpired);
                    }
                }
            } else {
                None
            };

            let response = self.send(request, token.as_deref(), &request_id).await?;

            if response.status() == StatusCode::UNAUTHORIZED && request.auth_required {
                if refreshes >= MAX_REFRESH_ATTEMPTS {
                    warn!(%request_id, endpoint = %request.endpoint, "still unauthorized after refresh");
                    self.clear_session();
                    return Err(GatewayError::AuthExpired);
                }
                refreshes += 1;

                warn!(%request_id, endpoint = %request.endpoint, "401 received, refreshing session");
                if let Err(e) = self.recover_session(token.as_deref()).await {
                    warn!(%request_id, error = %e, "session refresh failed, clearing session");
                    self.clear_session();
                    return Err(GatewayError::AuthExpired);
                }
                continue;
            }

            return Ok(response);
        }
    }

    async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        request_id: &str,
    ) -> GatewayResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        debug!(
            %request_id,
            method = %request.method,
            %url,
            has_token = token.is_some(),
            "sending request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header("ngrok-skip-browser-warning", "true");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(%request_id, %url, error = %e, "transport failure");
            GatewayError::from(e)
        })?;
        debug!(%request_id, status = response.status().as_u16(), "response received");
        Ok(response)
    }

    /// Get a usable access token after `stale` was rejected.
    async fn recover_session(&self, stale: Option<&str>) -> GatewayResult<()> {
        if !self.single_flight_refresh {
            return self.refresh().await;
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller refreshed while we waited for the lock.
        if let Some(current) = self.access_token() {
            if Some(current.as_str()) != stale {
                debug!("session already refreshed by a concurrent call");
                return Ok(());
            }
        }
        self.refresh().await
    }

    /// Exchange the refresh token for a new pair. Never itself refreshed.
    async fn refresh(&self) -> GatewayResult<()> {
        let refresh_token = self
            .read_session()
            .refresh_token()
            .map(String::from)
            .ok_or(GatewayError::AuthExpired)?;

        let request = ApiRequest::post(REFRESH_PATH)
            .public()
            .with_body(json!({ "refreshToken": refresh_token }));
        let request_id = short_request_id();
        let response = self.send(&request, None, &request_id).await?;
        let payload = classify(response).await?;

        let pair = parse_token_pair(&payload.data)?;
        self.write_session().replace(pair.token, pair.refresh_token);
        info!("session refreshed");
        Ok(())
    }
}

/// Pull `{token, refreshToken?}` out of an auth payload.
///
/// Some deployments wrap it in a `data` envelope.
pub(crate) fn parse_token_pair(data: &Value) -> GatewayResult<TokenPair> {
    let candidate = if data.get("token").is_some() {
        data
    } else {
        data.get("data").unwrap_or(data)
    };
    serde_json::from_value::<TokenPair>(candidate.clone()).map_err(|_| {
        GatewayError::ServerError {
            status: 200,
            detail: "auth response did not contain a token".into(),
        }
    })
}

async fn classify(response: reqwest::Response) -> GatewayResult<ApiResponse> {
    let status = response.status();
    let text = response.text().await.map_err(GatewayError::from)?;

    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(ApiResponse::ok(status.as_u16(), Value::Null));
        }
        return serde_json::from_str(&text)
            .map(|data| ApiResponse::ok(status.as_u16(), data))
            .map_err(|e| GatewayError::ServerError {
                status: status.as_u16(),
                detail: format!("malformed response body: {e}"),
            });
    }

    Err(error_for(status, &text))
}

/// Classify a non-2xx response.
fn error_for(status: StatusCode, body: &str) -> GatewayError {
    let detail = error_detail(status, body);
    if status.is_client_error() {
        GatewayError::BadRequest {
            status: status.as_u16(),
            detail,
        }
    } else {
        GatewayError::ServerError {
            status: status.as_u16(),
            detail,
        }
    }
}

/// Prefer the server's own message over the raw body.
fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            if let Some(msg) = json.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("no detail").to_string()
    } else {
        trimmed.to_string()
    }
}

fn short_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

//! Bearer/refresh token pair held for the lifetime of the process.

use serde::{Deserialize, Serialize};

/// Credentials of the logged-in operator.
///
/// Only [`super::RequestGateway`] holds a `Session`; other components see
/// a [`SessionStatus`] at most.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Install a freshly issued token pair.
    ///
    /// A refresh response may omit the refresh token, in which case the
    /// previous one stays valid.
    pub(crate) fn replace(&mut self, access_token: String, refresh_token: Option<String>) {
        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            authenticated: self.access_token.is_some(),
            can_refresh: self.refresh_token.is_some(),
        }
    }
}

/// Token-free view of the session, safe to hand to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub authenticated: bool,
    pub can_refresh: bool,
}

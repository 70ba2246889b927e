// services/github/models.rs
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string GitHub appends when it redirects back to the callback.
#[derive(Debug, Deserialize)]
pub struct GitHubCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Token (and optional metadata) issued after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AccessGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }

    /// Grants without an expiration never expire.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Per-redirect parameters for the authorize URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Parameters {
    pub redirect_url: String,
    pub scope: String,
    pub state: Option<String>,
}

/// Raw token endpoint body. GitHub answers bad codes with a 200 and an
/// `error` field instead of a 4xx, so both shapes share one struct.
#[derive(Debug, Deserialize, Default)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// services/github/errors.rs
use reqwest::StatusCode;
use thiserror::Error;

/// Failure while trading an authorization code for an access grant.
#[derive(Debug, Error)]
pub enum AuthExchangeError {
    #[error("GitHub token exchange failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub token endpoint rejected the request with status {status}")]
    Rejected { status: StatusCode },
    #[error("GitHub denied the authorization code: {error}")]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("invalid GitHub token response: {0}")]
    InvalidResponse(String),
}

impl AuthExchangeError {
    /// The code is spent or bad; only a fresh authorize round trip helps.
    pub fn needs_reauthentication(&self) -> bool {
        match self {
            AuthExchangeError::Provider { .. } => true,
            AuthExchangeError::Rejected { status } => status.is_client_error(),
            AuthExchangeError::Http(_) | AuthExchangeError::InvalidResponse(_) => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            AuthExchangeError::Http(_) => true,
            AuthExchangeError::Rejected { status } => status.is_server_error(),
            AuthExchangeError::Provider { .. } | AuthExchangeError::InvalidResponse(_) => false,
        }
    }
}

/// Failure of an authenticated (or anonymous) REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API rejected the credentials")]
    Unauthorized,
    #[error("GitHub API rate limit exhausted")]
    RateLimited,
    #[error("GitHub API returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid GitHub API response: {0}")]
    InvalidJson(String),
    #[error("invalid GitHub API url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn needs_reauthentication(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) | ApiError::RateLimited => true,
            ApiError::Status { status, .. } => status.is_server_error(),
            ApiError::Unauthorized | ApiError::InvalidJson(_) | ApiError::InvalidUrl(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_denial_requires_reauthentication() {
        let err = AuthExchangeError::Provider {
            error: "bad_verification_code".into(),
            description: None,
        };
        assert!(err.needs_reauthentication());
        assert!(!err.is_transient());
    }

    #[test]
    fn token_endpoint_outage_is_transient() {
        let err = AuthExchangeError::Rejected {
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(err.is_transient());
        assert!(!err.needs_reauthentication());
    }

    #[test]
    fn unauthorized_api_call_requires_reauthentication() {
        assert!(ApiError::Unauthorized.needs_reauthentication());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(ApiError::RateLimited.is_transient());
    }

    #[test]
    fn api_status_display_includes_message() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Not Found".into(),
        };
        assert_eq!(err.to_string(), "GitHub API returned 404 Not Found: Not Found");
    }
}

// services/github/provider.rs

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Url,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use super::{
    errors::AuthExchangeError,
    models::{AccessGrant, OAuth2Parameters, TokenResponse},
    service::OAuth2ServiceProvider,
    template::GitHubTemplate,
};
use crate::config::{ConfigError, GitHubOAuthConfig};

#[derive(Clone)]
pub struct GitHubServiceProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    authorize_url: Url,
    token_url: Url,
    api_base_url: String,
}

impl std::fmt::Debug for GitHubServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubServiceProvider")
            .field("client_id", &self.client_id)
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl GitHubServiceProvider {
    pub fn new(config: &GitHubOAuthConfig, client: Client) -> Result<Self, ConfigError> {
        let authorize_url =
            Url::parse(&config.authorize_url).map_err(|_| ConfigError::Invalid {
                key: "GITHUB_OAUTH_AUTHORIZE_URL",
                value: config.authorize_url.clone(),
            })?;
        let token_url = Url::parse(&config.token_url).map_err(|_| ConfigError::Invalid {
            key: "GITHUB_OAUTH_TOKEN_URL",
            value: config.token_url.clone(),
        })?;
        Url::parse(&config.api_base_url).map_err(|_| ConfigError::Invalid {
            key: "GITHUB_API_BASE_URL",
            value: config.api_base_url.clone(),
        })?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorize_url,
            token_url,
            api_base_url: config.api_base_url.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl OAuth2ServiceProvider for GitHubServiceProvider {
    fn build_authorize_url(&self, parameters: &OAuth2Parameters) -> String {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &parameters.redirect_url)
                .append_pair("scope", &parameters.scope);
            if let Some(state) = &parameters.state {
                query.append_pair("state", state);
            }
        }
        url.into()
    }

    async fn exchange_for_access_grant(
        &self,
        code: &str,
        redirect_url: &str,
    ) -> Result<AccessGrant, AuthExchangeError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json") // GitHub defaults to a form-encoded body otherwise
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "GitHub token endpoint rejected code exchange");
            return Err(AuthExchangeError::Rejected { status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response.text().await?;
        let token = parse_token_response(&content_type, &body)?;

        if let Some(error) = token.error {
            warn!(error = %error, "GitHub denied authorization code");
            return Err(AuthExchangeError::Provider {
                error,
                description: token.error_description,
            });
        }

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthExchangeError::InvalidResponse("missing access_token".into()))?;

        let expires_at = match token.expires_in {
            Some(secs) => Some(expiry_after(secs)?),
            None => None,
        };

        info!("Exchanged GitHub authorization code for access grant");
        Ok(AccessGrant {
            access_token,
            refresh_token: token.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            scope: token.scope.filter(|s| !s.is_empty()),
        })
    }

    fn get_client(&self, access_token: Option<&str>) -> GitHubTemplate {
        match access_token {
            Some(token) => {
                GitHubTemplate::authorized(self.client.clone(), self.api_base_url.clone(), token)
            }
            None => GitHubTemplate::anonymous(self.client.clone(), self.api_base_url.clone()),
        }
    }
}

/// `expires_in` comes from the remote; negative or unrepresentable values are
/// rejected rather than trusted.
fn expiry_after(secs: i64) -> Result<OffsetDateTime, AuthExchangeError> {
    if secs < 0 {
        return Err(AuthExchangeError::InvalidResponse(format!("bad expires_in: {secs}")));
    }
    OffsetDateTime::now_utc()
        .checked_add(Duration::seconds(secs))
        .ok_or_else(|| AuthExchangeError::InvalidResponse(format!("bad expires_in: {secs}")))
}

fn parse_token_response(content_type: &str, body: &str) -> Result<TokenResponse, AuthExchangeError> {
    if content_type.contains("application/x-www-form-urlencoded") {
        let fields: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        let expires_in = match fields.get("expires_in") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                AuthExchangeError::InvalidResponse(format!("bad expires_in: {raw}"))
            })?),
            None => None,
        };
        return Ok(TokenResponse {
            access_token: fields.get("access_token").cloned(),
            refresh_token: fields.get("refresh_token").cloned(),
            expires_in,
            scope: fields.get("scope").cloned(),
            error: fields.get("error").cloned(),
            error_description: fields.get("error_description").cloned(),
        });
    }

    serde_json::from_str(body).map_err(|e| AuthExchangeError::InvalidResponse(e.to_string()))
}

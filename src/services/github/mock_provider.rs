use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{
    errors::AuthExchangeError,
    models::{AccessGrant, OAuth2Parameters},
    service::OAuth2ServiceProvider,
    template::GitHubTemplate,
};

/// Stub provider for handler tests: hands out a fixed grant (or a rejection)
/// and records the codes it was asked to exchange.
#[derive(Default)]
pub struct MockGitHubProvider {
    pub grant: Option<AccessGrant>,
    pub api_base_url: String,
    pub exchanged_codes: Mutex<Vec<String>>,
}

impl MockGitHubProvider {
    pub fn granting(access_token: &str) -> Self {
        Self {
            grant: Some(AccessGrant::new(access_token)),
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes
            .lock()
            .map(|codes| codes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OAuth2ServiceProvider for MockGitHubProvider {
    fn build_authorize_url(&self, parameters: &OAuth2Parameters) -> String {
        let mut url = format!(
            "https://github.com/login/oauth/authorize?client_id=mock&redirect_uri={}&scope={}",
            urlencoding::encode(&parameters.redirect_url),
            urlencoding::encode(&parameters.scope),
        );
        if let Some(state) = &parameters.state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    async fn exchange_for_access_grant(
        &self,
        code: &str,
        _redirect_url: &str,
    ) -> Result<AccessGrant, AuthExchangeError> {
        if let Ok(mut codes) = self.exchanged_codes.lock() {
            codes.push(code.to_string());
        }
        self.grant.clone().ok_or(AuthExchangeError::Rejected {
            status: StatusCode::BAD_REQUEST,
        })
    }

    fn get_client(&self, access_token: Option<&str>) -> GitHubTemplate {
        match access_token {
            Some(token) => {
                GitHubTemplate::authorized(Client::new(), self.api_base_url.clone(), token)
            }
            None => GitHubTemplate::anonymous(Client::new(), self.api_base_url.clone()),
        }
    }
}

// services/github/service.rs

use super::{
    errors::AuthExchangeError,
    models::{AccessGrant, OAuth2Parameters},
    template::GitHubTemplate,
};
use async_trait::async_trait;

#[async_trait]
pub trait OAuth2ServiceProvider: Send + Sync {
    fn build_authorize_url(&self, parameters: &OAuth2Parameters) -> String;

    async fn exchange_for_access_grant(
        &self,
        code: &str,
        redirect_url: &str,
    ) -> Result<AccessGrant, AuthExchangeError>;

    /// `None` yields a binding for unprotected resources only.
    fn get_client(&self, access_token: Option<&str>) -> GitHubTemplate;
}

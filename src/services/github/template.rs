// services/github/template.rs
use std::{fmt, sync::Arc};

use reqwest::{
    header::{ACCEPT, USER_AGENT},
    Client, Method, RequestBuilder, Response, StatusCode, Url,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::errors::ApiError;

pub const GITHUB_USER_AGENT: &str = "github-connect";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_REPOS_PATH: &str = "/user/repos";

/// Applied to every outgoing request, in registration order.
pub type RequestInterceptor = Arc<dyn Fn(RequestBuilder) -> RequestBuilder + Send + Sync>;

pub fn github_headers_interceptor() -> RequestInterceptor {
    Arc::new(|request: RequestBuilder| {
        request
            .header(USER_AGENT, GITHUB_USER_AGENT)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    })
}

pub fn bearer_interceptor(access_token: impl Into<String>) -> RequestInterceptor {
    let access_token = access_token.into();
    Arc::new(move |request: RequestBuilder| request.bearer_auth(&access_token))
}

/// GitHub REST binding. Holds a shared HTTP client plus the interceptor chain
/// that decorates each request; an authorized template carries the bearer
/// interceptor, an anonymous one does not.
#[derive(Clone)]
pub struct GitHubTemplate {
    client: Client,
    api_base_url: String,
    interceptors: Vec<RequestInterceptor>,
    authorized: bool,
}

impl fmt::Debug for GitHubTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubTemplate")
            .field("api_base_url", &self.api_base_url)
            .field("interceptors", &self.interceptors.len())
            .field("authorized", &self.authorized)
            .finish()
    }
}

impl GitHubTemplate {
    pub fn anonymous(client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
            interceptors: vec![github_headers_interceptor()],
            authorized: false,
        }
    }

    pub fn authorized(
        client: Client,
        api_base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let mut template = Self::anonymous(client, api_base_url);
        template.interceptors.push(bearer_interceptor(access_token));
        template.authorized = true;
        template
    }

    pub fn with_interceptor(mut self, interceptor: RequestInterceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Absolute URLs pass through; anything else is a path under the API base.
    pub fn resolve(&self, url: &str) -> Result<Url, ApiError> {
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.api_base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        };
        Url::parse(&absolute).map_err(|e| ApiError::InvalidUrl(format!("{absolute}: {e}")))
    }

    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.resolve(url)?;
        let request = self.client.request(method, url);
        Ok(self
            .interceptors
            .iter()
            .fold(request, |request, interceptor| interceptor(request)))
    }

    /// GETs `url` and hands back the body as an untyped JSON value.
    pub async fn get(&self, url: &str) -> Result<Value, ApiError> {
        let request = self.request(Method::GET, url)?;
        debug!(url, authorized = self.authorized, "GitHub API request");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let err = error_for_response(response).await;
            warn!(url, %status, error = %err, "GitHub API request failed");
            return Err(err);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidJson(e.to_string()))
    }

    pub async fn list_user_repositories(&self) -> Result<Value, ApiError> {
        self.get(USER_REPOS_PATH).await
    }
}

async fn error_for_response(response: Response) -> ApiError {
    let status = response.status();
    let rate_limit_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        StatusCode::FORBIDDEN if rate_limit_exhausted => ApiError::RateLimited,
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|json| json["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            ApiError::Status { status, message }
        }
    }
}

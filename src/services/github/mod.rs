pub mod errors;
#[cfg(test)]
pub mod mock_provider;
pub mod models;
pub mod provider;
pub mod service;
pub mod template;

pub use errors::{ApiError, AuthExchangeError};
pub use models::{AccessGrant, OAuth2Parameters};
pub use provider::GitHubServiceProvider;
pub use service::OAuth2ServiceProvider;
pub use template::GitHubTemplate;

//! Shared HTTP client construction.

use std::time::Duration;

use contentimport_shared::{HttpConfig, ImportError, Result};
use reqwest::Client;

/// Build the client used for fetches, chunk submissions and image downloads.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ImportError::Network(format!("failed to build HTTP client: {e}")))
}

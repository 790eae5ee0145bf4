//! HTTP plumbing shared by the venue clients.

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client every venue client uses.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Fail on a non-2xx status, otherwise decode the JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    response: Response,
    venue: &str,
    what: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} API error {}: {}", venue, status, body);
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} {} response", venue, what))
}

/// Trim a trailing slash so paths can be appended with `format!`.
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

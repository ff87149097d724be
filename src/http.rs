use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("openapi-check/", env!("CARGO_PKG_VERSION"));
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// GET a URL and return the response body; non-2xx statuses are errors.
pub fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {url}"))?;
    response
        .text()
        .with_context(|| format!("Failed to read response body from {url}"))
}

/// One health probe. Returns the status code, bounded by `timeout`.
pub fn probe(client: &Client, url: &str, timeout: Duration) -> reqwest::Result<StatusCode> {
    let response = client.get(url).timeout(timeout).send()?;
    Ok(response.status())
}

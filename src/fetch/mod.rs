//! HTTP transport seam for the TfL client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Request, Response};
use serde::de::DeserializeOwned;

/// Seam between the TfL client and the actual HTTP transport, so tests can
/// run against a canned transport instead of the network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Plain reqwest-backed transport used against the live TfL API.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}

/// Performs a GET against `url` with the given query parameters and decodes
/// the JSON response body.
pub async fn fetch_json<T: DeserializeOwned, C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    let url = reqwest::Url::parse_with_params(url, query)
        .with_context(|| format!("invalid request URL: {url}"))?;
    let req = Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.json().await?)
}

//! Network abstraction for testability.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::request::{Request, Response};

/// Performs live network requests.
///
/// An `Err` means the request was rejected before a response arrived
/// (connection failure, timeout, body read error). Any HTTP status,
/// including 4xx and 5xx, is a successful fetch.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches the given request from the network.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Builds a configured HTTP client for asset requests.
fn build_http_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let builder = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30));
    match timeout {
        Some(timeout) => builder.timeout(timeout).build(),
        None => builder.build(),
    }
}

/// Default network implementation using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Creates a network backed by a client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    /// Creates a network around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            crate::Error::InvalidUrl {
                url: request.to_string(),
                reason: e.to_string(),
            }
        })?;

        let response = self.client.request(method, &request.url).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        log::debug!("{request} -> {status} ({} bytes)", body.len());
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

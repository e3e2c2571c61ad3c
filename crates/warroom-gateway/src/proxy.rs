//! Client side of the stats proxy endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warroom_types::{snapshot::ChannelSnapshot, GatewayError, GatewayErrorKind};

use crate::{helix::transport_error, StatsGateway};

/// Failure body of the proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GatewayErrorKind>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            error: err.message().to_string(),
            kind: Some(err.kind()),
        }
    }
}

/// Fetches snapshots through the server's proxy endpoint instead of the platform.
#[derive(Debug, Clone)]
pub struct ProxyStatsClient {
    http: Client,
    url: String,
}

impl ProxyStatsClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                GatewayError::Configuration(format!("failed to build http client: {err}"))
            })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl StatsGateway for ProxyStatsClient {
    async fn fetch_snapshot(&self) -> Result<ChannelSnapshot, GatewayError> {
        debug!("Requesting snapshot from {}", self.url);
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|err| transport_error("stats proxy", err))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<ChannelSnapshot>().await.map_err(|err| {
                GatewayError::UpstreamUnavailable(format!("malformed proxy payload: {err}"))
            });
        }

        let body = response.json::<ErrorBody>().await.ok();
        match &body {
            Some(body) => warn!("Stats proxy returned {}: {}", status, body.error),
            None => warn!(
                "Stats proxy at {} returned {} without an error body; is proxy_url correct?",
                self.url, status
            ),
        }
        Err(error_from_response(status, body))
    }
}

fn error_from_response(status: StatusCode, body: Option<ErrorBody>) -> GatewayError {
    let Some(body) = body else {
        return GatewayError::UpstreamUnavailable(format!("stats proxy returned status {status}"));
    };
    match body.kind {
        Some(kind) => GatewayError::from_kind(kind, body.error),
        None if status == StatusCode::NOT_FOUND => GatewayError::ChannelNotFound(body.error),
        None => GatewayError::UpstreamUnavailable(body.error),
    }
}

//! Streaming platform API calls used by the gateway.
//!
//! [`HelixApi`] is the seam: one method per upstream call. [`HelixClient`]
//! implements it over HTTP with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA},
    Client, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};
use warroom_types::{
    config::{Credentials, GatewayConfig},
    GatewayError,
};

/// Bearer token returned by the credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Header values shared by every authenticated call.
#[derive(Debug, Clone)]
pub struct HelixAuth {
    pub client_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixStream {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
}

#[derive(Debug, Deserialize)]
struct HelixData<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    total: Option<u64>,
}

#[async_trait]
pub trait HelixApi: Send + Sync {
    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, GatewayError>;
    async fn lookup_user(&self, auth: &HelixAuth, login: &str)
        -> Result<Vec<HelixUser>, GatewayError>;
    async fn stream_status(
        &self,
        auth: &HelixAuth,
        user_id: &str,
    ) -> Result<Vec<HelixStream>, GatewayError>;
    /// `Ok(None)` when the platform omits the total.
    async fn follower_total(
        &self,
        auth: &HelixAuth,
        broadcaster_id: &str,
    ) -> Result<Option<u64>, GatewayError>;
}

/// HTTP implementation of [`HelixApi`].
#[derive(Debug, Clone)]
pub struct HelixClient {
    http: Client,
    token_url: String,
    api_base: String,
}

impl HelixClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .user_agent(concat!("warroom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                GatewayError::Configuration(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_authenticated<T: DeserializeOwned>(
        &self,
        auth: &HelixAuth,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{}", self.api_base, path);
        debug!("Calling platform API {}", url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("Client-ID", &auth.client_id)
            .bearer_auth(&auth.access_token)
            .send()
            .await
            .map_err(|err| transport_error(path, err))?;
        decode(response, path).await
    }
}

#[async_trait]
impl HelixApi for HelixClient {
    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, GatewayError> {
        let response = self
            .http
            .post(&self.token_url)
            .query(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|err| {
                warn!("Credential exchange request failed: {}", err);
                GatewayError::Auth(format!("credential exchange failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Credential exchange rejected with {}", status);
            return Err(GatewayError::Auth(format!(
                "credential exchange returned status {status}"
            )));
        }

        let token: AccessToken = response.json().await.map_err(|err| {
            GatewayError::Auth(format!("credential exchange returned no token: {err}"))
        })?;
        if token.access_token.is_empty() {
            return Err(GatewayError::Auth(
                "credential exchange returned an empty token".into(),
            ));
        }
        Ok(token)
    }

    async fn lookup_user(
        &self,
        auth: &HelixAuth,
        login: &str,
    ) -> Result<Vec<HelixUser>, GatewayError> {
        let users: HelixData<HelixUser> = self
            .get_authenticated(auth, "users", &[("login", login)])
            .await?;
        Ok(users.data)
    }

    async fn stream_status(
        &self,
        auth: &HelixAuth,
        user_id: &str,
    ) -> Result<Vec<HelixStream>, GatewayError> {
        let streams: HelixData<HelixStream> = self
            .get_authenticated(auth, "streams", &[("user_id", user_id)])
            .await?;
        Ok(streams.data)
    }

    async fn follower_total(
        &self,
        auth: &HelixAuth,
        broadcaster_id: &str,
    ) -> Result<Option<u64>, GatewayError> {
        let followers: FollowersResponse = self
            .get_authenticated(
                auth,
                "channels/followers",
                &[("broadcaster_id", broadcaster_id)],
            )
            .await?;
        Ok(followers.total)
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, GatewayError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!("Platform rejected the token for {}: {}", what, status);
        return Err(GatewayError::Auth(format!("{what} returned status {status}")));
    }
    if !status.is_success() {
        warn!("Platform returned {} for {}", status, what);
        return Err(GatewayError::UpstreamUnavailable(format!(
            "{what} returned status {status}"
        )));
    }
    response.json::<T>().await.map_err(|err| {
        warn!("Failed to parse {} response: {}", what, err);
        GatewayError::UpstreamUnavailable(format!("failed to parse {what} response: {err}"))
    })
}

pub(crate) fn transport_error(what: &str, err: reqwest::Error) -> GatewayError {
    warn!("{} request failed: {}", what, err);
    if err.is_timeout() {
        GatewayError::UpstreamUnavailable(format!("{what} timed out"))
    } else if err.is_connect() {
        GatewayError::UpstreamUnavailable(format!("{what} connection failed: {err}"))
    } else {
        GatewayError::UpstreamUnavailable(format!("{what} request failed: {err}"))
    }
}

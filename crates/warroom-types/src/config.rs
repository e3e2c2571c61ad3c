use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, WarRoomError};

pub const CLIENT_ID_ENV: &str = "TWITCH_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "TWITCH_CLIENT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub channel: String,
    pub token_url: String,
    pub api_base: String,
    pub timeout_ms: u64,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            channel: "nayabnb".into(),
            token_url: "https://id.twitch.tv/oauth2/token".into(),
            api_base: "https://api.twitch.tv/helix".into(),
            timeout_ms: 10_000,
            client_id: None,
            client_secret: None,
        }
    }
}

/// Client identity used for the credential exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl GatewayConfig {
    /// Both halves of the client identity, if set and non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        let client_id = non_empty(self.client_id.as_deref())?;
        let client_secret = non_empty(self.client_secret.as_deref())?;
        Some(Credentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Names of the credential variables that are still unset.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if non_empty(self.client_id.as_deref()).is_none() {
            missing.push(CLIENT_ID_ENV);
        }
        if non_empty(self.client_secret.as_deref()).is_none() {
            missing.push(CLIENT_SECRET_ENV);
        }
        missing
    }

    /// Override credentials with values from `lookup` (normally the process environment).
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|v| !v.trim().is_empty()) {
            self.client_secret = Some(secret);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    /// Consecutive channel-not-found polls before a standing warning is raised.
    pub not_found_warning_after: u32,
    pub proxy_url: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            not_found_warning_after: 3,
            proxy_url: "http://127.0.0.1:3000/api/twitch".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    /// Append logs here instead of stderr; the terminal dashboard needs this.
    pub log_file: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarRoomConfig {
    pub gateway: GatewayConfig,
    pub poller: PollerConfig,
    pub server: ServerConfig,
    pub ops: OpsConfig,
}

impl WarRoomConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            WarRoomError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            WarRoomError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.channel.trim().is_empty() {
            return Err(WarRoomError::Configuration(
                "gateway.channel must not be empty".into(),
            ));
        }
        if self.gateway.timeout_ms == 0 {
            return Err(WarRoomError::Configuration(
                "gateway.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.poller.interval_ms == 0 {
            return Err(WarRoomError::Configuration(
                "poller.interval_ms must be greater than zero".into(),
            ));
        }
        if self.poller.not_found_warning_after == 0 {
            return Err(WarRoomError::Configuration(
                "poller.not_found_warning_after must be greater than zero".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(WarRoomError::Configuration(
                "server.port must be a valid port (>0)".into(),
            ));
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = WarRoomError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum WarRoomError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("server error: {0}")]
    Server(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure taxonomy of a single live stats fetch.
///
/// The gateway never panics past its boundary; every failure is one of these
/// variants so callers can treat them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Credentials are missing. Not retryable; needs an operator.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Credential exchange was rejected or returned no token.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The platform reported no identity for the configured channel.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    /// Network error, timeout, non-2xx status or malformed payload.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Serializable discriminant of [`GatewayError`], used on the wire and in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    Configuration,
    Auth,
    ChannelNotFound,
    UpstreamUnavailable,
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::Configuration(_) => GatewayErrorKind::Configuration,
            GatewayError::Auth(_) => GatewayErrorKind::Auth,
            GatewayError::ChannelNotFound(_) => GatewayErrorKind::ChannelNotFound,
            GatewayError::UpstreamUnavailable(_) => GatewayErrorKind::UpstreamUnavailable,
        }
    }

    /// Whether a later poll has any chance of succeeding without operator action.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GatewayError::Configuration(_))
    }

    /// Rebuild an error from its wire representation.
    pub fn from_kind(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            GatewayErrorKind::Configuration => GatewayError::Configuration(message),
            GatewayErrorKind::Auth => GatewayError::Auth(message),
            GatewayErrorKind::ChannelNotFound => GatewayError::ChannelNotFound(message),
            GatewayErrorKind::UpstreamUnavailable => GatewayError::UpstreamUnavailable(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Configuration(m)
            | GatewayError::Auth(m)
            | GatewayError::ChannelNotFound(m)
            | GatewayError::UpstreamUnavailable(m) => m,
        }
    }
}

impl GatewayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayErrorKind::Configuration => "configuration",
            GatewayErrorKind::Auth => "auth",
            GatewayErrorKind::ChannelNotFound => "channel_not_found",
            GatewayErrorKind::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{snapshot::ChannelSnapshot, GatewayError, GatewayErrorKind};

/// Immutable envelope for everything the poller reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: PollPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PollPayload {
    Started { interval_ms: u64 },
    SnapshotUpdated(ChannelSnapshot),
    FetchFailed(FetchFailure),
    /// A result arrived after the poller was stopped and was dropped.
    Discarded,
    StandingWarning { message: String },
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: GatewayErrorKind,
    pub message: String,
    pub consecutive_failures: u32,
}

impl PollEvent {
    pub fn new(payload: PollPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn failure(err: &GatewayError, consecutive_failures: u32) -> Self {
        Self::new(PollPayload::FetchFailed(FetchFailure {
            kind: err.kind(),
            message: err.message().to_string(),
            consecutive_failures,
        }))
    }
}

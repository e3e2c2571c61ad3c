use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream title reported while the channel is offline.
pub const NOT_LIVE_TITLE: &str = "Not currently live";

/// Whether the follower total came from the platform or was degraded to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerCount {
    #[default]
    Reported,
    Unavailable,
}

/// Latest known live state of the target channel.
///
/// Built fresh on every successful fetch and replaced wholesale; superseded
/// snapshots are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    pub channel: String,
    #[serde(default)]
    pub channel_id: String,
    pub is_live: bool,
    pub current_viewers: u64,
    pub stream_title: String,
    #[serde(default)]
    pub total_followers: u64,
    #[serde(rename = "followersStatus", default)]
    pub followers: FollowerCount,
    #[serde(rename = "lastUpdated")]
    pub fetched_at: DateTime<Utc>,
}

impl ChannelSnapshot {
    pub fn offline(channel: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            channel_id: channel_id.into(),
            is_live: false,
            current_viewers: 0,
            stream_title: NOT_LIVE_TITLE.into(),
            total_followers: 0,
            followers: FollowerCount::Reported,
            fetched_at: Utc::now(),
        }
    }

    /// Equality ignoring `fetched_at`.
    pub fn same_state(&self, other: &ChannelSnapshot) -> bool {
        ChannelSnapshot {
            fetched_at: other.fetched_at,
            ..self.clone()
        } == *other
    }
}

/// The three display states of the live viewer metric.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SnapshotState {
    /// Nothing fetched successfully yet.
    #[default]
    NoData,
    Offline(ChannelSnapshot),
    Live(ChannelSnapshot),
}

impl SnapshotState {
    pub fn from_latest(latest: Option<&ChannelSnapshot>) -> Self {
        match latest {
            None => SnapshotState::NoData,
            Some(snapshot) if snapshot.is_live => SnapshotState::Live(snapshot.clone()),
            Some(snapshot) => SnapshotState::Offline(snapshot.clone()),
        }
    }

    pub fn snapshot(&self) -> Option<&ChannelSnapshot> {
        match self {
            SnapshotState::NoData => None,
            SnapshotState::Offline(s) | SnapshotState::Live(s) => Some(s),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SnapshotState::Live(_))
    }
}

impl From<Option<ChannelSnapshot>> for SnapshotState {
    fn from(latest: Option<ChannelSnapshot>) -> Self {
        SnapshotState::from_latest(latest.as_ref())
    }
}

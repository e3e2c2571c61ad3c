//! Live channel stats gateway.
//!
//! Resolves the configured channel against the streaming platform and folds
//! stream status and follower count into a [`ChannelSnapshot`].

mod helix;
mod proxy;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use warroom_types::{
    config::{Credentials, GatewayConfig},
    snapshot::{ChannelSnapshot, FollowerCount, NOT_LIVE_TITLE},
    GatewayError,
};

pub use helix::{AccessToken, HelixApi, HelixAuth, HelixClient, HelixStream, HelixUser};
pub use proxy::{ErrorBody, ProxyStatsClient};

#[async_trait]
pub trait StatsGateway: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<ChannelSnapshot, GatewayError>;
}

#[async_trait]
impl<T: StatsGateway + ?Sized> StatsGateway for Box<T> {
    async fn fetch_snapshot(&self) -> Result<ChannelSnapshot, GatewayError> {
        (**self).fetch_snapshot().await
    }
}

#[async_trait]
impl<T: StatsGateway + ?Sized> StatsGateway for Arc<T> {
    async fn fetch_snapshot(&self) -> Result<ChannelSnapshot, GatewayError> {
        (**self).fetch_snapshot().await
    }
}

/// Orchestrates token exchange, identity lookup and the two live reads.
pub struct ExternalStatsGateway<A: HelixApi> {
    api: A,
    channel: String,
    credentials: Option<Credentials>,
}

impl ExternalStatsGateway<HelixClient> {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let api = HelixClient::new(config)?;
        Ok(Self::new(api, config.channel.clone(), config.credentials()))
    }
}

impl<A: HelixApi> ExternalStatsGateway<A> {
    pub fn new(api: A, channel: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            api,
            channel: channel.into(),
            credentials,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: HelixApi> StatsGateway for ExternalStatsGateway<A> {
    async fn fetch_snapshot(&self) -> Result<ChannelSnapshot, GatewayError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            GatewayError::Configuration("platform client id and secret are not configured".into())
        })?;

        let token = self.api.exchange_token(credentials).await?;
        if token.access_token.is_empty() {
            return Err(GatewayError::Auth(
                "credential exchange returned no token".into(),
            ));
        }
        let auth = HelixAuth {
            client_id: credentials.client_id.clone(),
            access_token: token.access_token,
        };

        let users = self.api.lookup_user(&auth, &self.channel).await?;
        let user = users.into_iter().next().ok_or_else(|| {
            GatewayError::ChannelNotFound(format!("no platform user named '{}'", self.channel))
        })?;

        let (streams, followers) = tokio::join!(
            self.api.stream_status(&auth, &user.id),
            self.api.follower_total(&auth, &user.id),
        );
        let streams = streams?;
        let followers = match followers {
            Ok(total) => FollowerLookup::Total(total),
            Err(err) => {
                warn!(
                    "Follower count unavailable for {}; reporting zero: {}",
                    self.channel, err
                );
                FollowerLookup::Failed
            }
        };

        let snapshot = normalize(&self.channel, &user, &streams, followers);
        info!(
            "Fetched snapshot for {} (live: {}, viewers: {}, followers: {})",
            snapshot.channel, snapshot.is_live, snapshot.current_viewers, snapshot.total_followers
        );
        Ok(snapshot)
    }
}

/// Outcome of the follower read after failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowerLookup {
    Total(Option<u64>),
    Failed,
}

fn normalize(
    channel: &str,
    user: &HelixUser,
    streams: &[HelixStream],
    followers: FollowerLookup,
) -> ChannelSnapshot {
    let live_stream = streams.first();
    let (total_followers, follower_status) = match followers {
        FollowerLookup::Total(total) => (total.unwrap_or(0), FollowerCount::Reported),
        FollowerLookup::Failed => (0, FollowerCount::Unavailable),
    };
    ChannelSnapshot {
        channel: channel.to_string(),
        channel_id: user.id.clone(),
        is_live: live_stream.is_some(),
        current_viewers: live_stream.map(|s| s.viewer_count).unwrap_or(0),
        stream_title: live_stream
            .map(|s| s.title.clone())
            .unwrap_or_else(|| NOT_LIVE_TITLE.to_string()),
        total_followers,
        followers: follower_status,
        fetched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CallCounts {
        token: AtomicUsize,
        users: AtomicUsize,
        streams: AtomicUsize,
        followers: AtomicUsize,
    }

    impl CallCounts {
        fn total(&self) -> usize {
            self.token.load(Ordering::SeqCst)
                + self.users.load(Ordering::SeqCst)
                + self.streams.load(Ordering::SeqCst)
                + self.followers.load(Ordering::SeqCst)
        }
    }

    struct FakeHelix {
        calls: CallCounts,
        token: Result<String, GatewayError>,
        users: Vec<HelixUser>,
        streams: Result<Vec<HelixStream>, GatewayError>,
        followers: Result<Option<u64>, GatewayError>,
    }

    impl FakeHelix {
        fn live() -> Self {
            Self {
                calls: CallCounts::default(),
                token: Ok("token-123".into()),
                users: vec![HelixUser {
                    id: "141981764".into(),
                    login: "nayabnb".into(),
                    display_name: "Nayabnb".into(),
                }],
                streams: Ok(vec![HelixStream {
                    user_id: "141981764".into(),
                    user_login: "nayabnb".into(),
                    title: "Ranked grind".into(),
                    viewer_count: 120,
                }]),
                followers: Ok(Some(2048)),
            }
        }

        fn offline() -> Self {
            Self {
                streams: Ok(Vec::new()),
                ..Self::live()
            }
        }
    }

    #[async_trait]
    impl HelixApi for FakeHelix {
        async fn exchange_token(&self, _: &Credentials) -> Result<AccessToken, GatewayError> {
            self.calls.token.fetch_add(1, Ordering::SeqCst);
            self.token.clone().map(|access_token| AccessToken {
                access_token,
                expires_in: Some(3600),
            })
        }

        async fn lookup_user(
            &self,
            auth: &HelixAuth,
            _: &str,
        ) -> Result<Vec<HelixUser>, GatewayError> {
            self.calls.users.fetch_add(1, Ordering::SeqCst);
            assert_eq!(auth.client_id, "client");
            assert_eq!(auth.access_token, "token-123");
            Ok(self.users.clone())
        }

        async fn stream_status(
            &self,
            _: &HelixAuth,
            _: &str,
        ) -> Result<Vec<HelixStream>, GatewayError> {
            self.calls.streams.fetch_add(1, Ordering::SeqCst);
            self.streams.clone()
        }

        async fn follower_total(
            &self,
            _: &HelixAuth,
            _: &str,
        ) -> Result<Option<u64>, GatewayError> {
            self.calls.followers.fetch_add(1, Ordering::SeqCst);
            self.followers.clone()
        }
    }

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            client_id: "client".into(),
            client_secret: "secret".into(),
        })
    }

    fn gateway(api: FakeHelix) -> ExternalStatsGateway<FakeHelix> {
        ExternalStatsGateway::new(api, "nayabnb", credentials())
    }

    #[tokio::test]
    async fn missing_credentials_make_no_calls() {
        let gateway = ExternalStatsGateway::new(FakeHelix::live(), "nayabnb", None);
        let err = gateway.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        assert!(!err.is_retryable());
        assert_eq!(gateway.api().calls.total(), 0);
    }

    #[tokio::test]
    async fn live_stream_is_normalized() {
        let gateway = gateway(FakeHelix::live());
        let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
        assert!(snapshot.is_live);
        assert_eq!(snapshot.channel, "nayabnb");
        assert_eq!(snapshot.channel_id, "141981764");
        assert_eq!(snapshot.current_viewers, 120);
        assert_eq!(snapshot.stream_title, "Ranked grind");
        assert_eq!(snapshot.total_followers, 2048);
        assert_eq!(snapshot.followers, FollowerCount::Reported);
        assert_eq!(gateway.api().calls.total(), 4);
    }

    #[tokio::test]
    async fn offline_channel_uses_sentinel_title() {
        let gateway = gateway(FakeHelix::offline());
        let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
        assert!(!snapshot.is_live);
        assert_eq!(snapshot.current_viewers, 0);
        assert_eq!(snapshot.stream_title, NOT_LIVE_TITLE);
        assert_eq!(snapshot.total_followers, 2048);
    }

    #[tokio::test]
    async fn unknown_channel_stops_before_live_reads() {
        let gateway = gateway(FakeHelix {
            users: Vec::new(),
            ..FakeHelix::live()
        });
        let err = gateway.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, GatewayError::ChannelNotFound(_)));
        let calls = &gateway.api().calls;
        assert_eq!(calls.token.load(Ordering::SeqCst), 1);
        assert_eq!(calls.users.load(Ordering::SeqCst), 1);
        assert_eq!(calls.streams.load(Ordering::SeqCst), 0);
        assert_eq!(calls.followers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_exchange_is_auth_error() {
        let gateway = gateway(FakeHelix {
            token: Err(GatewayError::Auth("status 403".into())),
            ..FakeHelix::live()
        });
        let err = gateway.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
        assert_eq!(gateway.api().calls.users.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_token_is_auth_error() {
        let gateway = gateway(FakeHelix {
            token: Ok(String::new()),
            ..FakeHelix::live()
        });
        let err = gateway.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
        assert_eq!(gateway.api().calls.users.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn follower_failure_degrades_to_zero() {
        let gateway = gateway(FakeHelix {
            followers: Err(GatewayError::UpstreamUnavailable("timed out".into())),
            ..FakeHelix::live()
        });
        let snapshot = gateway.fetch_snapshot().await.expect("degraded snapshot");
        assert!(snapshot.is_live);
        assert_eq!(snapshot.current_viewers, 120);
        assert_eq!(snapshot.total_followers, 0);
        assert_eq!(snapshot.followers, FollowerCount::Unavailable);
    }

    #[tokio::test]
    async fn absent_follower_total_is_reported_zero() {
        let gateway = gateway(FakeHelix {
            followers: Ok(None),
            ..FakeHelix::live()
        });
        let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.total_followers, 0);
        assert_eq!(snapshot.followers, FollowerCount::Reported);
    }

    #[tokio::test]
    async fn stream_failure_fails_the_fetch() {
        let gateway = gateway(FakeHelix {
            streams: Err(GatewayError::UpstreamUnavailable("status 503".into())),
            ..FakeHelix::live()
        });
        let err = gateway.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn repeated_fetches_differ_only_in_fetch_time() {
        let gateway = gateway(FakeHelix::live());
        let first = gateway.fetch_snapshot().await.expect("first");
        let second = gateway.fetch_snapshot().await.expect("second");
        assert!(first.same_state(&second));
        assert!(second.fetched_at >= first.fetched_at);
    }
}

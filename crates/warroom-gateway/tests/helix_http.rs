//! Exercises `HelixClient` over real HTTP against a local fake of the platform API.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use warroom_gateway::{ExternalStatsGateway, StatsGateway};
use warroom_types::{config::GatewayConfig, snapshot::FollowerCount, GatewayError};

#[derive(Default)]
struct Upstream {
    requests: AtomicUsize,
    uncached_requests: AtomicUsize,
    offline: AtomicBool,
    followers_broken: AtomicBool,
    slow_streams: AtomicBool,
}

type Shared = State<Arc<Upstream>>;

fn authorized(headers: &HeaderMap) -> bool {
    let client_id = headers.get("client-id").and_then(|v| v.to_str().ok());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    client_id == Some("client") && bearer == Some("Bearer tok-1")
}

fn record(upstream: &Upstream, headers: &HeaderMap) {
    upstream.requests.fetch_add(1, Ordering::SeqCst);
    let no_cache = headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("no-cache"))
        .unwrap_or(false);
    if no_cache {
        upstream.uncached_requests.fetch_add(1, Ordering::SeqCst);
    }
}

async fn token(
    State(upstream): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&upstream, &headers);
    let valid = query.get("client_id").map(String::as_str) == Some("client")
        && query.get("client_secret").map(String::as_str) == Some("secret")
        && query.get("grant_type").map(String::as_str) == Some("client_credentials");
    if !valid {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "status": 403, "message": "invalid client secret" })),
        )
            .into_response();
    }
    Json(json!({ "access_token": "tok-1", "expires_in": 5000, "token_type": "bearer" }))
        .into_response()
}

async fn users(
    State(upstream): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&upstream, &headers);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let data = match query.get("login").map(String::as_str) {
        Some("nayabnb") => json!([{ "id": "42", "login": "nayabnb", "display_name": "Nayabnb" }]),
        _ => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

async fn streams(
    State(upstream): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record(&upstream, &headers);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if upstream.slow_streams.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(query.get("user_id").map(String::as_str), Some("42"));
    if upstream.offline.load(Ordering::SeqCst) {
        return Json(json!({ "data": [], "pagination": {} })).into_response();
    }
    Json(json!({
        "data": [{
            "id": "9001",
            "user_id": "42",
            "user_login": "nayabnb",
            "title": "Late night ranked",
            "viewer_count": 321,
            "type": "live"
        }],
        "pagination": {}
    }))
    .into_response()
}

async fn followers(State(upstream): Shared, headers: HeaderMap) -> Response {
    record(&upstream, &headers);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if upstream.followers_broken.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({ "total": 5120, "data": [], "pagination": {} })).into_response()
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/helix/users", get(users))
        .route("/helix/streams", get(streams))
        .route("/helix/channels/followers", get(followers))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake upstream");
    });
    format!("http://{addr}")
}

fn config(base: &str, channel: &str, secret: &str) -> GatewayConfig {
    GatewayConfig {
        channel: channel.into(),
        token_url: format!("{base}/oauth2/token"),
        api_base: format!("{base}/helix"),
        timeout_ms: 500,
        client_id: Some("client".into()),
        client_secret: Some(secret.into()),
    }
}

#[tokio::test]
async fn fetches_live_snapshot_over_http() {
    let upstream = Arc::new(Upstream::default());
    let base = spawn_upstream(upstream.clone()).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nayabnb", "secret"))
        .expect("gateway");

    let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
    assert!(snapshot.is_live);
    assert_eq!(snapshot.channel_id, "42");
    assert_eq!(snapshot.current_viewers, 321);
    assert_eq!(snapshot.stream_title, "Late night ranked");
    assert_eq!(snapshot.total_followers, 5120);
    assert_eq!(upstream.requests.load(Ordering::SeqCst), 4);
    assert_eq!(upstream.uncached_requests.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn offline_channel_over_http() {
    let upstream = Arc::new(Upstream::default());
    upstream.offline.store(true, Ordering::SeqCst);
    let base = spawn_upstream(upstream).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nayabnb", "secret"))
        .expect("gateway");

    let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
    assert!(!snapshot.is_live);
    assert_eq!(snapshot.current_viewers, 0);
    assert_eq!(snapshot.stream_title, "Not currently live");
}

#[tokio::test]
async fn unknown_channel_is_not_found() {
    let upstream = Arc::new(Upstream::default());
    let base = spawn_upstream(upstream.clone()).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nobody_here", "secret"))
        .expect("gateway");

    let err = gateway.fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, GatewayError::ChannelNotFound(_)));
    assert_eq!(upstream.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn wrong_secret_is_auth_error() {
    let upstream = Arc::new(Upstream::default());
    let base = spawn_upstream(upstream.clone()).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nayabnb", "wrong"))
        .expect("gateway");

    let err = gateway.fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, GatewayError::Auth(_)));
    assert_eq!(upstream.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn broken_follower_endpoint_degrades() {
    let upstream = Arc::new(Upstream::default());
    upstream.followers_broken.store(true, Ordering::SeqCst);
    let base = spawn_upstream(upstream).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nayabnb", "secret"))
        .expect("gateway");

    let snapshot = gateway.fetch_snapshot().await.expect("snapshot");
    assert!(snapshot.is_live);
    assert_eq!(snapshot.total_followers, 0);
    assert_eq!(snapshot.followers, FollowerCount::Unavailable);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let upstream = Arc::new(Upstream::default());
    upstream.slow_streams.store(true, Ordering::SeqCst);
    let base = spawn_upstream(upstream).await;
    let gateway = ExternalStatsGateway::from_config(&config(&base, "nayabnb", "secret"))
        .expect("gateway");

    let err = gateway.fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
}

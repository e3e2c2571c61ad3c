//! HTTP surface: the stats proxy endpoint and the static dashboard data.
//!
//! Browser-side pollers call `GET /api/twitch` so platform credentials never
//! leave the server.

use std::{future::Future, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use warroom_gateway::{ErrorBody, ExternalStatsGateway, StatsGateway};
use warroom_types::{
    config::{ServerConfig, WarRoomConfig},
    dashboard::DashboardData,
    GatewayError, Result, WarRoomError,
};

pub const STATS_PATH: &str = "/api/twitch";
pub const DASHBOARD_PATH: &str = "/api/dashboard";

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<dyn StatsGateway>,
    dashboard: Arc<DashboardData>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn StatsGateway>, dashboard: DashboardData) -> Self {
        Self {
            gateway,
            dashboard: Arc::new(dashboard),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(STATS_PATH, get(stats_handler))
        .route(DASHBOARD_PATH, get(dashboard_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.gateway.fetch_snapshot().await {
        Ok(snapshot) => (NO_STORE, Json(snapshot)).into_response(),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                error!("Stats fetch failed: {}", err);
            } else {
                warn!("Stats fetch failed: {}", err);
            }
            (status, NO_STORE, Json(ErrorBody::from(&err))).into_response()
        }
    }
}

async fn dashboard_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.as_ref().clone())
}

fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::Configuration(_)
        | GatewayError::Auth(_)
        | GatewayError::UpstreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub struct StatsServer {
    config: ServerConfig,
    state: AppState,
}

impl StatsServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Wire the platform gateway from configuration.
    ///
    /// Missing credentials are reported here and surface per request as a
    /// configuration error; they do not stop the server.
    pub fn from_config(config: &WarRoomConfig) -> Result<Self> {
        let missing = config.gateway.missing_credentials();
        if !missing.is_empty() {
            error!(
                "Platform credentials {:?} are not set; {} will answer with a configuration error",
                missing, STATS_PATH
            );
        }
        let gateway = ExternalStatsGateway::from_config(&config.gateway)?;
        Ok(Self::new(
            config.server.clone(),
            AppState::new(Arc::new(gateway), DashboardData::default()),
        ))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    pub async fn serve(self) -> Result<()> {
        self.serve_until(shutdown_signal()).await
    }

    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| WarRoomError::Server(format!("failed to bind {addr}: {err}")))?;
        info!("Stats proxy ready at http://{}{}", addr, STATS_PATH);
        serve_on(listener, self.state, shutdown).await
    }
}

/// Serve the router on an already bound listener.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| WarRoomError::Server(format!("http server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

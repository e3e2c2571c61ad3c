//! Operational helpers: logging setup and in-memory poll counters.

use std::{
    fs::OpenOptions,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use warroom_types::{config::OpsConfig, GatewayErrorKind, Result, WarRoomError};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| WarRoomError::Ops(format!("failed to create log filter: {err}")))?;

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| WarRoomError::Ops(format!("failed to open log file {path}: {err}")))?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| WarRoomError::Ops(format!("tracing init error: {err}")))?;
            info!("Logging to {}", path);
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|err| WarRoomError::Ops(format!("tracing init error: {err}")))?;
        }
    }
    Ok(())
}

/// Counters describing how the poll loop has been doing since start-up.
#[derive(Clone, Default)]
pub struct PollMetrics {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    successes: AtomicU64,
    discarded: AtomicU64,
    configuration: AtomicU64,
    auth: AtomicU64,
    not_found: AtomicU64,
    upstream: AtomicU64,
}

/// Point-in-time copy of [`PollMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollCounters {
    pub successes: u64,
    pub failures: u64,
    pub discarded: u64,
    pub configuration_errors: u64,
    pub auth_errors: u64,
    pub not_found_errors: u64,
    pub upstream_errors: u64,
}

impl PollMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.inner.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.inner.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: GatewayErrorKind) {
        let counter = match kind {
            GatewayErrorKind::Configuration => &self.inner.configuration,
            GatewayErrorKind::Auth => &self.inner.auth,
            GatewayErrorKind::ChannelNotFound => &self.inner.not_found,
            GatewayErrorKind::UpstreamUnavailable => &self.inner.upstream,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PollCounters {
        let c = &self.inner;
        let configuration_errors = c.configuration.load(Ordering::Relaxed);
        let auth_errors = c.auth.load(Ordering::Relaxed);
        let not_found_errors = c.not_found.load(Ordering::Relaxed);
        let upstream_errors = c.upstream.load(Ordering::Relaxed);
        PollCounters {
            successes: c.successes.load(Ordering::Relaxed),
            failures: configuration_errors + auth_errors + not_found_errors + upstream_errors,
            discarded: c.discarded.load(Ordering::Relaxed),
            configuration_errors,
            auth_errors,
            not_found_errors,
            upstream_errors,
        }
    }
}

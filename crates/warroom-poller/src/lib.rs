//! Keeps the latest [`ChannelSnapshot`] fresh on a fixed cadence.
//!
//! Fetches are serialised: the loop awaits each one before the next tick and
//! manual [`LiveSnapshotPoller::poll_once`] calls queue behind the same lock.
//! A failed fetch never clears the last good snapshot.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{stream::BoxStream, StreamExt};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warroom_gateway::StatsGateway;
use warroom_ops::{PollCounters, PollMetrics};
use warroom_types::{
    config::PollerConfig,
    events::{PollEvent, PollPayload},
    snapshot::{ChannelSnapshot, SnapshotState},
    GatewayError,
};

const EVENT_CAPACITY: usize = 64;

/// Result of a single fetch as seen by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Updated(ChannelSnapshot),
    Failed(GatewayError),
    /// The poller was stopped before the fetch started or while it was in flight.
    Discarded,
}

pub struct LiveSnapshotPoller<G: StatsGateway + 'static> {
    shared: Arc<Shared<G>>,
    task: Mutex<Option<PollTask>>,
    default_interval: Duration,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared<G> {
    gateway: G,
    latest: watch::Sender<Option<ChannelSnapshot>>,
    events: broadcast::Sender<PollEvent>,
    health: Mutex<Health>,
    metrics: PollMetrics,
    fetch_lock: tokio::sync::Mutex<()>,
    not_found_warning_after: u32,
}

#[derive(Debug, Default)]
struct Health {
    consecutive_failures: u32,
    consecutive_not_found: u32,
    standing_warning: Option<String>,
}

impl Health {
    /// Returns the warning text when this failure raises a new standing warning.
    fn record_failure(&mut self, err: &GatewayError, not_found_after: u32) -> Option<String> {
        self.consecutive_failures += 1;
        let raised = match err {
            GatewayError::ChannelNotFound(msg) => {
                self.consecutive_not_found += 1;
                (self.consecutive_not_found >= not_found_after).then(|| {
                    format!(
                        "channel not found for {} consecutive polls: {msg}",
                        self.consecutive_not_found
                    )
                })
            }
            GatewayError::Configuration(_) => {
                self.consecutive_not_found = 0;
                Some(err.to_string())
            }
            _ => {
                self.consecutive_not_found = 0;
                None
            }
        };
        match raised {
            Some(message) if self.standing_warning.is_none() => {
                self.standing_warning = Some(message.clone());
                Some(message)
            }
            _ => None,
        }
    }

    fn record_success(&mut self) {
        *self = Health::default();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<G: StatsGateway + 'static> Shared<G> {
    fn publish(&self, payload: PollPayload) {
        let _ = self.events.send(PollEvent::new(payload));
    }

    async fn fetch(&self, cancel: Option<&CancellationToken>) -> PollOutcome {
        let _serialised = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Poller stopped before its queued fetch started; skipping");
                    return PollOutcome::Discarded;
                }
                guard = self.fetch_lock.lock() => guard,
            },
            None => self.fetch_lock.lock().await,
        };
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return PollOutcome::Discarded;
        }
        let result = self.gateway.fetch_snapshot().await;

        // Stop cancels under this lock, so the check and the publish below are atomic.
        let mut health = lock(&self.health);
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            drop(health);
            debug!("Discarding fetch result that finished after stop");
            self.metrics.record_discarded();
            self.publish(PollPayload::Discarded);
            return PollOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                health.record_success();
                self.latest.send_replace(Some(snapshot.clone()));
                drop(health);
                self.metrics.record_success();
                info!(
                    "Snapshot replaced (live: {}, viewers: {})",
                    snapshot.is_live, snapshot.current_viewers
                );
                self.publish(PollPayload::SnapshotUpdated(snapshot.clone()));
                PollOutcome::Updated(snapshot)
            }
            Err(err) => {
                let raised = health.record_failure(&err, self.not_found_warning_after);
                let consecutive = health.consecutive_failures;
                drop(health);
                self.metrics.record_failure(err.kind());
                if err.is_retryable() {
                    warn!("Fetch failed ({} in a row); keeping last snapshot: {}", consecutive, err);
                } else {
                    error!("Fetch failed and needs operator attention: {}", err);
                }
                let _ = self.events.send(PollEvent::failure(&err, consecutive));
                if let Some(message) = raised {
                    warn!("Standing warning raised: {}", message);
                    self.publish(PollPayload::StandingWarning { message });
                }
                PollOutcome::Failed(err)
            }
        }
    }

    fn cancel(&self, token: &CancellationToken) {
        let _publishing = lock(&self.health);
        token.cancel();
    }
}

impl<G: StatsGateway + 'static> LiveSnapshotPoller<G> {
    pub fn new(gateway: G, config: &PollerConfig) -> Self {
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                gateway,
                latest,
                events,
                health: Mutex::new(Health::default()),
                metrics: PollMetrics::new(),
                fetch_lock: tokio::sync::Mutex::new(()),
                not_found_warning_after: config.not_found_warning_after.max(1),
            }),
            task: Mutex::new(None),
            default_interval: Duration::from_millis(config.interval_ms),
        }
    }

    /// Interval taken from the configuration.
    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    /// Fetch now, then every `every`. Restarts the loop if it is already running.
    pub fn start(&self, every: Duration) {
        let mut slot = lock(&self.task);
        if let Some(previous) = slot.take() {
            debug!("Restarting poll loop");
            self.shared.cancel(&previous.cancel);
        }

        let every = every.max(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                shared.fetch(Some(&token)).await;
            }
            debug!("Poll loop exited");
        });

        let interval_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX);
        info!("Poller started with interval {} ms", interval_ms);
        self.shared.publish(PollPayload::Started { interval_ms });
        *slot = Some(PollTask { cancel, handle });
    }

    /// Cancel the schedule. A fetch already in flight finishes but its result is
    /// dropped; a loop fetch still queued behind the fetch lock never starts.
    pub fn stop(&self) {
        let Some(task) = lock(&self.task).take() else {
            return;
        };
        self.shared.cancel(&task.cancel);
        info!("Poller stopped");
        self.shared.publish(PollPayload::Stopped);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Run one fetch outside the schedule, queued behind any fetch in flight.
    pub async fn poll_once(&self) -> PollOutcome {
        self.shared.fetch(None).await
    }

    pub fn current(&self) -> Option<ChannelSnapshot> {
        self.shared.latest.borrow().clone()
    }

    pub fn state(&self) -> SnapshotState {
        SnapshotState::from_latest(self.shared.latest.borrow().as_ref())
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<ChannelSnapshot>> {
        self.shared.latest.subscribe()
    }

    pub fn events(&self) -> BoxStream<'static, PollEvent> {
        BroadcastStream::new(self.shared.events.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }

    pub fn standing_warning(&self) -> Option<String> {
        lock(&self.shared.health).standing_warning.clone()
    }

    pub fn metrics(&self) -> PollCounters {
        self.shared.metrics.snapshot()
    }
}

impl<G: StatsGateway + 'static> Drop for LiveSnapshotPoller<G> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            self.shared.cancel(&task.cancel);
        }
    }
}

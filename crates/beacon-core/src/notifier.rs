//! Background task that periodically notifies every connected client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::broadcast::BroadcastEngine;
use crate::error::{BeaconError, BeaconResult};

/// Default time between notifications.
pub const DEFAULT_NOTIFICATION_INTERVAL: Duration = Duration::from_secs(10);

/// Span name the notifier task runs under.
pub const NOTIFIER_TASK_NAME: &str = "periodic_notifications";

/// Notifier life cycle: `Idle -> Running -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Idle,
    Running,
    Cancelled,
}

/// Periodic producer bound to one [`BroadcastEngine`].
pub struct PeriodicNotifier {
    engine: BroadcastEngine,
    interval: Duration,
    counter: Arc<AtomicU64>,
    state: NotifierState,
}

impl PeriodicNotifier {
    pub fn new(engine: BroadcastEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            counter: Arc::new(AtomicU64::new(0)),
            state: NotifierState::Idle,
        }
    }

    pub fn state(&self) -> NotifierState {
        self.state
    }

    /// Notifications sent so far.
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Spawn the notifier loop on the current runtime.
    ///
    /// A notifier runs at most once; a second call fails with
    /// [`BeaconError::AlreadyStarted`]. A zero interval is a
    /// [`BeaconError::Config`] error.
    pub fn start(&mut self) -> BeaconResult<NotifierHandle> {
        if self.state != NotifierState::Idle {
            return Err(BeaconError::AlreadyStarted);
        }
        if self.interval.is_zero() {
            return Err(BeaconError::config("notification interval must be positive"));
        }
        self.state = NotifierState::Running;

        let token = CancellationToken::new();
        let span = info_span!("task", name = NOTIFIER_TASK_NAME);
        let join = tokio::spawn(
            run(
                self.engine.clone(),
                self.interval,
                self.counter.clone(),
                token.clone(),
            )
            .instrument(span),
        );

        info!(interval_secs = self.interval.as_secs_f64(), "Periodic notifications started");
        Ok(NotifierHandle {
            token,
            join,
            counter: self.counter.clone(),
        })
    }

    /// Record that the spawned task was stopped.
    pub fn mark_cancelled(&mut self) {
        self.state = NotifierState::Cancelled;
    }
}

/// Handle to a running notifier task.
pub struct NotifierHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
    counter: Arc<AtomicU64>,
}

impl NotifierHandle {
    /// Notifications sent so far.
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Signal the task to stop and wait for it to exit.
    ///
    /// A broadcast already in flight completes first. Cancellation is the
    /// normal way for this task to end, so only a panic is reported.
    pub async fn cancel(self) {
        self.token.cancel();
        match self.join.await {
            Ok(()) => info!(task = NOTIFIER_TASK_NAME, "Background task cancelled"),
            Err(e) if e.is_cancelled() => {
                info!(task = NOTIFIER_TASK_NAME, "Background task cancelled")
            }
            Err(e) => error!(task = NOTIFIER_TASK_NAME, error = %e, "Background task failed"),
        }
    }
}

async fn run(
    engine: BroadcastEngine,
    period: Duration,
    counter: Arc<AtomicU64>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Nobody to notify: skip without advancing the counter.
        if engine.registry().is_empty() {
            continue;
        }

        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let message = notification_message(n);
        engine.broadcast(&message).await;
        info!(message = %message, "Notification sent");
    }

    info!("Periodic notifications stopped");
}

/// Text of the `n`-th notification, stamped with the local time.
pub fn notification_message(n: u64) -> String {
    format!(
        "Notification #{} at {}",
        n,
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f")
    )
}

pub mod cycle;

pub use cycle::BadgeCycle;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, Instrument};

use crate::aggregate::Aggregation;
use crate::badge::BadgeState;
use crate::config::MIN_REFRESH_PERIOD_SECS;
use crate::platform::Platform;

/// Result of one cycle as seen by presenters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub badge: BadgeState,
    pub aggregation: Aggregation,
}

/// One fetch-and-derive pass. Must not fail; errors are folded into the snapshot.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run(&self) -> Snapshot;
}

/// Owns the periodic timer. At most one timer task is alive, and cycles
/// inside it run one after another.
pub struct Scheduler {
    cycle: Arc<dyn Cycle>,
    platform: Arc<dyn Platform>,
    period: Duration,
    /// Bumped on every start/stop; a cycle only publishes if its generation is current
    generation: Arc<Mutex<u64>>,
    trigger: Arc<Notify>,
    timer: Option<JoinHandle<()>>,
    snapshots: watch::Sender<Option<Snapshot>>,
}

impl Scheduler {
    /// `period` is raised to the one-minute floor if shorter.
    pub fn new(cycle: Arc<dyn Cycle>, platform: Arc<dyn Platform>, period: Duration) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            cycle,
            platform,
            period: period.max(Duration::from_secs(MIN_REFRESH_PERIOD_SECS)),
            generation: Arc::new(Mutex::new(0)),
            trigger: Arc::new(Notify::new()),
            timer: None,
            snapshots,
        }
    }

    /// Latest published snapshot, updated after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel any running timer, run a cycle now, then every `period`.
    pub async fn start(&mut self) {
        let generation = {
            let mut current = self.generation.lock().await;
            *current += 1;
            if let Some(timer) = self.timer.take() {
                timer.abort();
            }
            *current
        };

        // Fresh notifier so a refresh requested against the old timer does not
        // double-fire the new one.
        self.trigger = Arc::new(Notify::new());

        let task = TimerTask {
            cycle: Arc::clone(&self.cycle),
            platform: Arc::clone(&self.platform),
            period: self.period,
            generation,
            current: Arc::clone(&self.generation),
            trigger: Arc::clone(&self.trigger),
            snapshots: self.snapshots.clone(),
        };

        info!(generation, period_secs = self.period.as_secs(), "refresh timer armed");
        self.timer = Some(tokio::spawn(
            task.run().instrument(info_span!("refresh_timer", generation)),
        ));
    }

    /// Saved credentials should apply without waiting for the next tick.
    pub async fn on_config_changed(&mut self) {
        debug!("config changed, restarting refresh timer");
        self.start().await;
    }

    /// Run a cycle as soon as the current one (if any) is done. Requests made
    /// while a cycle is in flight collapse into a single extra run.
    pub fn refresh_now(&self) {
        self.trigger.notify_one();
    }

    pub async fn stop(&mut self) {
        let mut current = self.generation.lock().await;
        *current += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("refresh timer stopped");
        }
    }
}

struct TimerTask {
    cycle: Arc<dyn Cycle>,
    platform: Arc<dyn Platform>,
    period: Duration,
    generation: u64,
    current: Arc<Mutex<u64>>,
    trigger: Arc<Notify>,
    snapshots: watch::Sender<Option<Snapshot>>,
}

impl TimerTask {
    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let snapshot = self.cycle.run().await;
            if !self.publish(snapshot).await {
                debug!("superseded, exiting");
                return;
            }

            tokio::select! {
                _ = ticker.tick() => debug!("timer fired"),
                _ = self.trigger.notified() => debug!("refresh requested"),
            }
        }
    }

    async fn publish(&self, snapshot: Snapshot) -> bool {
        let current = self.current.lock().await;
        if *current != self.generation {
            return false;
        }
        self.platform.set_badge(&snapshot.badge).await;
        self.snapshots.send_replace(Some(snapshot));
        true
    }
}

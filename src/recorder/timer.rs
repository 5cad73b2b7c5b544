//! Recording duration counter
//!
//! Counts whole seconds on a spawned tokio task. Stopping aborts the task;
//! starting again begins a fresh period, so a partial second in progress
//! when paused is not carried over.

use super::state::StudioEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct DurationTimer {
    seconds: Arc<AtomicU64>,
    period: Duration,
    task: Option<JoinHandle<()>>,
    events: Option<broadcast::Sender<StudioEvent>>,
}

impl DurationTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(0)),
            period,
            task: None,
            events: None,
        }
    }

    /// Publish a [`StudioEvent::Tick`] on every increment
    pub fn with_events(mut self, events: broadcast::Sender<StudioEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn seconds(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }

    pub fn reset(&mut self) {
        self.seconds.store(0, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Start counting. No-op if already running. Must be called inside a
    /// tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let seconds = self.seconds.clone();
        let events = self.events.clone();
        let period = self.period;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = seconds.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(tx) = &events {
                    let _ = tx.send(StudioEvent::Tick { seconds: now });
                }
            }
        }));
    }

    /// Stop counting, keeping the current value
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for DurationTimer {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl Drop for DurationTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Unified drain scheduling.
//!
//! One loop owns every reason to drain the offline queue: the periodic
//! 30 s safety-net tick, the offline -> online transition observed on the
//! monitor's watch channel, and explicit triggers. Funneling them through a
//! single `select!` means two drain attempts can never race each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_schema::NetworkQuality;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Safety-net drain period.
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct DrainScheduler {
    trigger: Arc<Notify>,
    interval: Duration,
}

impl DrainScheduler {
    pub fn new() -> Self {
        Self::with_interval(DRAIN_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            trigger: Arc::new(Notify::new()),
            interval,
        }
    }

    /// Request a drain outside the schedule (e.g. a manual flush).
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Run the scheduler loop until the monitor side of `quality_rx` is
    /// dropped. `drain` is invoked at most once per wakeup and only while
    /// online.
    pub fn spawn<F, Fut>(
        &self,
        mut quality_rx: watch::Receiver<NetworkQuality>,
        mut drain: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let trigger = Arc::clone(&self.trigger);
        let period = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut was_online = quality_rx.borrow().online;

            loop {
                let fire = tokio::select! {
                    _ = interval.tick() => true,
                    _ = trigger.notified() => true,
                    changed = quality_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = quality_rx.borrow().online;
                        let came_online = online && !was_online;
                        was_online = online;
                        came_online
                    }
                };

                if fire && quality_rx.borrow().online {
                    drain().await;
                }
            }
            tracing::debug!("drain scheduler stopped");
        })
    }
}

impl Default for DrainScheduler {
    fn default() -> Self {
        Self::new()
    }
}

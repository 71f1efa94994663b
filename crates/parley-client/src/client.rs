//! Top-level client object.
//!
//! Constructed once at application start and passed by reference to
//! callers; there is no module-level singleton state. Owns the stores, the
//! monitor, the dispatcher, and the per-vendor adapters, and wires the
//! drain scheduler to the offline queue.

use std::path::Path;
use std::sync::Arc;

use parley_net::{DrainScheduler, NetworkMonitor};
use parley_store::{DrainReport, OfflineQueue, ReplayOutcome, ResponseCache, UsageLog};
use tokio::task::JoinHandle;

use crate::adapters::claude_proxy::{ClaudeProxyAdapter, ProxyConfig, CLAUDE_PROXY_PATH};
use crate::adapters::speech::{SpeechAdapter, SpeechConfig};
use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct CoachClient {
    pub cache: Arc<ResponseCache>,
    pub queue: Arc<OfflineQueue>,
    pub monitor: Arc<NetworkMonitor>,
    pub usage: Arc<UsageLog>,
    pub dispatcher: Arc<Dispatcher>,
    pub chat: Arc<ClaudeProxyAdapter>,
    pub speech: Arc<SpeechAdapter>,
    scheduler: DrainScheduler,
}

impl CoachClient {
    /// Build the client and restore persisted state from `data_dir`.
    pub fn new(
        data_dir: &Path,
        proxy: ProxyConfig,
        speech: SpeechConfig,
        monitor: NetworkMonitor,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(data_dir));
        cache.load();
        let queue = Arc::new(OfflineQueue::new(data_dir));
        queue.load();
        let usage = Arc::new(UsageLog::new(data_dir));
        usage.load();
        let monitor = Arc::new(monitor);

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&cache),
            Arc::clone(&queue),
            Arc::clone(&monitor),
        ));

        Self {
            cache,
            queue,
            monitor,
            usage,
            dispatcher,
            chat: Arc::new(ClaudeProxyAdapter::new(proxy)),
            speech: Arc::new(SpeechAdapter::new(speech, data_dir)),
            scheduler: DrainScheduler::new(),
        }
    }

    /// Replay everything currently parked on the offline queue.
    pub async fn drain_offline(&self) -> DrainReport {
        let dispatcher = Arc::clone(&self.dispatcher);
        let chat = Arc::clone(&self.chat);
        let speech = Arc::clone(&self.speech);
        self.queue
            .drain(move |request| {
                let dispatcher = Arc::clone(&dispatcher);
                let chat = Arc::clone(&chat);
                let speech = Arc::clone(&speech);
                async move {
                    if request.endpoint.ends_with(CLAUDE_PROXY_PATH) {
                        dispatcher.replay(chat.as_ref(), &request).await
                    } else if request.endpoint.contains("/v1/text-to-speech/") {
                        dispatcher.replay(speech.as_ref(), &request).await
                    } else {
                        tracing::warn!(endpoint = %request.endpoint, "no adapter for queued endpoint");
                        ReplayOutcome::Fatal
                    }
                }
            })
            .await
    }

    /// Start the unified drain loop (30 s safety net + online transitions
    /// + explicit triggers). The returned handle stops it when aborted.
    pub fn start_drain_scheduler(&self) -> JoinHandle<()> {
        let client = self.clone();
        self.scheduler
            .spawn(self.monitor.subscribe(), move || {
                let client = client.clone();
                async move {
                    let report = client.drain_offline().await;
                    if report.delivered + report.requeued + report.dropped > 0 {
                        tracing::info!(
                            delivered = report.delivered,
                            requeued = report.requeued,
                            dropped = report.dropped,
                            "offline queue drained"
                        );
                    }
                }
            })
    }

    pub fn trigger_drain(&self) {
        self.scheduler.trigger();
    }

    /// Flush every persisted mirror. Called on shutdown; failures inside
    /// are logged, never raised.
    pub async fn persist(&self) {
        self.cache.persist().await;
        self.queue.persist().await;
        self.usage.persist().await;
    }
}

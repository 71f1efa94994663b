//! Generic resilient request dispatch.
//!
//! One dispatcher serves every endpoint adapter: cache check first, park
//! on the offline queue when disconnected, otherwise POST with an adaptive
//! timeout and retry retryable failures with capped exponential backoff.
//! Each retry recomputes cache and connectivity state from scratch, so a
//! response cached by a concurrent call or a connectivity drop mid-loop is
//! picked up on the next attempt.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parley_net::NetworkMonitor;
use parley_schema::{ClientError, DispatchOptions, QueuedRequest};
use parley_store::{payload_key, OfflineQueue, ReplayOutcome, ResponseCache};
use uuid::Uuid;

const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Delay before retry number `attempt` (0-based): 1000, 2000, 4000, ...
/// capped at 10 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS
        .saturating_mul(1u64 << attempt.min(31))
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(ms)
}

pub struct Dispatcher {
    http: reqwest::Client,
    cache: Arc<ResponseCache>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<NetworkMonitor>,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Removes the request id from the in-flight set when the dispatch ends,
/// however it ends.
struct FlightGuard<'a> {
    dispatcher: &'a Dispatcher,
    id: Uuid,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .dispatcher
            .in_flight
            .lock()
            .expect("in-flight lock poisoned");
        in_flight.remove(&self.id);
    }
}

impl Dispatcher {
    pub fn new(
        cache: Arc<ResponseCache>,
        queue: Arc<OfflineQueue>,
        monitor: Arc<NetworkMonitor>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache,
            queue,
            monitor,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn track(&self, id: Uuid) -> Result<FlightGuard<'_>, ClientError> {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if !in_flight.insert(id) {
            return Err(ClientError::InFlight { id });
        }
        Ok(FlightGuard {
            dispatcher: self,
            id,
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().expect("in-flight lock poisoned").len()
    }

    /// Dispatch `payload` through `adapter` with the full resilience
    /// policy. Offline callers get `ClientError::Queued` immediately; they
    /// are never blocked waiting for connectivity.
    pub async fn dispatch(
        &self,
        adapter: &dyn crate::EndpointAdapter,
        request_id: Uuid,
        payload: serde_json::Value,
        options: DispatchOptions,
    ) -> Result<serde_json::Value, ClientError> {
        if !adapter.is_configured() {
            return Err(ClientError::NotConfigured(adapter.name().to_string()));
        }
        let _guard = self.track(request_id)?;

        let endpoint = adapter.endpoint();
        let key = payload_key(&endpoint, &payload);
        let started = Instant::now();

        let mut attempt: u32 = 0;
        loop {
            if options.use_cache {
                if let Some(hit) = self.cache.get(&key) {
                    tracing::debug!(endpoint = adapter.name(), %request_id, "cache hit");
                    return Ok(hit);
                }
            }

            if !self.monitor.is_online() {
                self.queue
                    .enqueue(QueuedRequest::new(
                        request_id,
                        endpoint.clone(),
                        payload.clone(),
                        options.clone(),
                    ))
                    .await;
                return Err(ClientError::Queued { id: request_id });
            }

            match self.send_once(adapter, &endpoint, &payload, &options).await {
                Ok(value) => {
                    if options.use_cache {
                        self.cache.put(&key, value.clone(), adapter.cache_ttl());
                    }
                    tracing::info!(
                        endpoint = adapter.name(),
                        %request_id,
                        attempt,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < options.retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        endpoint = adapter.name(),
                        %request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        endpoint = adapter.name(),
                        %request_id,
                        attempt,
                        "request failed: {err}"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// One send attempt with the adaptive timeout, used by the retry loop
    /// and by offline-queue replay.
    async fn send_once(
        &self,
        adapter: &dyn crate::EndpointAdapter,
        endpoint: &str,
        payload: &serde_json::Value,
        options: &DispatchOptions,
    ) -> Result<serde_json::Value, ClientError> {
        let multiplier = self.monitor.current().timeout_multiplier();
        let timeout_ms = (options.timeout_ms as f64 * multiplier) as u64;

        let attempt = async {
            let resp = adapter
                .apply_auth(self.http.post(endpoint))
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() {
                        ClientError::Transport(format!("connect failed: {e}"))
                    } else {
                        ClientError::Transport(e.to_string())
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ClientError::from_status(status.as_u16(), body));
            }
            adapter.parse_response(resp).await
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), attempt).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                after_ms: timeout_ms,
            }),
        }
    }

    /// Single replay attempt for a queued request, classified for the
    /// queue's re-enqueue decision. No internal retries; the queue's
    /// attempt ceiling is the retry policy here.
    pub async fn replay(
        &self,
        adapter: &dyn crate::EndpointAdapter,
        request: &QueuedRequest,
    ) -> ReplayOutcome {
        if !self.monitor.is_online() {
            return ReplayOutcome::Retryable;
        }
        match self
            .send_once(adapter, &request.endpoint, &request.payload, &request.options)
            .await
        {
            Ok(value) => {
                if request.options.use_cache {
                    let key = payload_key(&request.endpoint, &request.payload);
                    self.cache.put(key, value, adapter.cache_ttl());
                }
                ReplayOutcome::Delivered
            }
            Err(err) if err.is_retryable() => ReplayOutcome::Retryable,
            Err(err) => {
                tracing::warn!(id = %request.id, "queued request failed fatally: {err}");
                ReplayOutcome::Fatal
            }
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub(crate) fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }
}

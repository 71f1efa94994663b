use std::sync::Arc;
use std::time::Duration;

use parley_client::{ClaudeProxyAdapter, CoachClient, Dispatcher, ProxyConfig, SpeechConfig};
use parley_net::{CellularGeneration, ConnectivityEvent, NetworkMonitor};
use parley_schema::{ClientError, DispatchOptions};
use parley_store::{OfflineQueue, ResponseCache};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_response(text: &str) -> serde_json::Value {
    json!({"content": [{"type": "text", "text": text}]})
}

fn adapter_for(server: &MockServer) -> ClaudeProxyAdapter {
    ClaudeProxyAdapter::new(ProxyConfig::new(server.uri(), "anon-key", "api-key"))
}

struct Harness {
    _dir: tempfile::TempDir,
    cache: Arc<ResponseCache>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<NetworkMonitor>,
    dispatcher: Dispatcher,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ResponseCache::new(dir.path()));
    let queue = Arc::new(OfflineQueue::new(dir.path()));
    let monitor = Arc::new(NetworkMonitor::new());
    let dispatcher = Dispatcher::new(
        Arc::clone(&cache),
        Arc::clone(&queue),
        Arc::clone(&monitor),
    );
    Harness {
        _dir: dir,
        cache,
        queue,
        monitor,
        dispatcher,
    }
}

#[tokio::test]
async fn second_identical_dispatch_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("apikey", "api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(proxy_response("cached answer")))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness();
    let adapter = adapter_for(&server);
    let payload = json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]});

    let first = h
        .dispatcher
        .dispatch(&adapter, Uuid::new_v4(), payload.clone(), DispatchOptions::default())
        .await
        .unwrap();
    let second = h
        .dispatcher
        .dispatch(&adapter, Uuid::new_v4(), payload, DispatchOptions::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, proxy_response("cached answer"));
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn offline_dispatch_queues_and_never_touches_network() {
    let server = MockServer::start().await;
    // No mock mounted: any request would 404; we also assert zero were
    // received at all.
    let h = harness();
    h.monitor.report(ConnectivityEvent::offline());

    let adapter = adapter_for(&server);
    let id = Uuid::new_v4();
    let err = h
        .dispatcher
        .dispatch(&adapter, id, json!({"q": 1}), DispatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Queued { id: queued } if queued == id));
    assert_eq!(h.queue.len(), 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthorized_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness();
    let err = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn other_client_errors_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness();
    let err = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Client { status: 400, .. }));
}

#[tokio::test]
async fn rate_limit_is_retried_with_backoff_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(proxy_response("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness();
    let started = std::time::Instant::now();
    let result = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions {
                retries: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result, proxy_response("recovered"));
    // First backoff step is 1000 ms.
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn exhausted_retries_surface_the_original_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness();
    let err = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions {
                retries: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Server(503)));
}

#[tokio::test]
async fn slow_response_times_out_as_retryable_class() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(proxy_response("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let h = harness();
    let err = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions {
                timeout_ms: 100,
                retries: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout { after_ms: 100 }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_link_doubles_the_timeout_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(proxy_response("made it"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let h = harness();
    // On a slow cellular link the 200 ms budget stretches to 400 ms,
    // enough for the 300 ms response.
    h.monitor
        .report(ConnectivityEvent::cellular(CellularGeneration::G2));

    let result = h
        .dispatcher
        .dispatch(
            &adapter_for(&server),
            Uuid::new_v4(),
            json!({"q": 1}),
            DispatchOptions {
                timeout_ms: 200,
                retries: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result, proxy_response("made it"));
}

#[tokio::test]
async fn duplicate_request_id_fails_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(proxy_response("slow"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let h = harness();
    let adapter = adapter_for(&server);
    let id = Uuid::new_v4();

    let options = DispatchOptions {
        use_cache: false,
        ..Default::default()
    };
    let (a, b) = tokio::join!(
        h.dispatcher.dispatch(&adapter, id, json!({"n": 1}), options.clone()),
        h.dispatcher.dispatch(&adapter, id, json!({"n": 2}), options),
    );

    let failures = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(ClientError::InFlight { .. })))
        .count();
    assert_eq!(failures, 1);
    assert_eq!(h.dispatcher.in_flight_count(), 0);
}

#[tokio::test]
async fn unconfigured_adapter_fails_without_network() {
    let h = harness();
    let adapter = ClaudeProxyAdapter::new(ProxyConfig::default());
    let err = h
        .dispatcher
        .dispatch(&adapter, Uuid::new_v4(), json!({}), DispatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConfigured(_)));
}

#[tokio::test]
async fn queued_request_is_delivered_on_drain_after_reconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/claude-proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(proxy_response("replayed")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = CoachClient::new(
        dir.path(),
        ProxyConfig::new(server.uri(), "anon-key", "api-key"),
        SpeechConfig::default(),
        NetworkMonitor::new(),
    );

    client.monitor.report(ConnectivityEvent::offline());
    let err = client
        .dispatcher
        .dispatch(
            client.chat.as_ref(),
            Uuid::new_v4(),
            json!({"q": "park me"}),
            DispatchOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Queued { .. }));
    assert_eq!(client.queue.len(), 1);

    client.monitor.report(ConnectivityEvent::wifi());
    let report = client.drain_offline().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(client.queue.len(), 0);
}

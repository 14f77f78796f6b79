//! End-to-end delivery tests against local HTTP servers.

mod common;

use std::time::{Duration, Instant};

use bytes::Bytes;
use common::{policy, status_sequence, target, SECRET};
use namazu_types::RetryPolicy;
use namazu_webhook::{signature, Deliver, RetryingSender, SenderConfig, WebhookSender};
use tokio_util::sync::CancellationToken;

const PAYLOAD: &[u8] = br#"{"code":551,"_id":"abc"}"#;

fn retrying(timeout: Duration) -> RetryingSender {
    let sender = WebhookSender::new(SenderConfig::default().with_timeout(timeout)).unwrap();
    RetryingSender::new(sender)
}

#[tokio::test]
async fn test_signed_post_carries_required_headers() {
    let mut server = mockito::Server::new_async().await;
    let expected_sig = signature::sign(SECRET.as_bytes(), PAYLOAD);
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_header("user-agent", "namazu/1.0")
        .match_header("x-signature-256", expected_sig.as_str())
        .match_body(mockito::Matcher::Exact(String::from_utf8(PAYLOAD.to_vec()).unwrap()))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let sender = WebhookSender::new(SenderConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    let result = sender
        .send(
            &cancel,
            &format!("{}/hook", server.url()),
            SECRET.as_bytes(),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    mock.assert_async().await;
    assert!(result.success);
    assert_eq!(result.status_code, 202);
    assert!(result.error_message.is_none());
    assert_eq!(result.retry_count, 0);
}

#[tokio::test]
async fn test_non_2xx_reports_unexpected_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(404)
        .create_async()
        .await;

    let sender = WebhookSender::new(SenderConfig::default()).unwrap();
    let result = sender
        .send(
            &CancellationToken::new(),
            &format!("{}/hook", server.url()),
            SECRET.as_bytes(),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.status_code, 404);
    assert_eq!(result.error_message.as_deref(), Some("unexpected status: 404"));
}

#[tokio::test]
async fn test_terminal_4xx_makes_exactly_one_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(400)
        .expect(1)
        .create_async()
        .await;

    let sender = retrying(Duration::from_secs(5));
    let result = sender
        .send(
            &CancellationToken::new(),
            &target(format!("{}/hook", server.url()), policy(3, 10)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    mock.assert_async().await;
    assert!(!result.success);
    assert_eq!(result.status_code, 400);
    assert_eq!(result.retry_count, 0);
}

#[tokio::test]
async fn test_retry_then_succeed() {
    let server = status_sequence(vec![503, 503, 200]);
    let sender = retrying(Duration::from_secs(5));

    let started = Instant::now();
    let result = sender
        .send(
            &CancellationToken::new(),
            &target(server.url("/hook"), policy(3, 100)),
            Bytes::from_static(PAYLOAD),
        )
        .await;
    let elapsed = started.elapsed();

    assert!(result.success);
    assert_eq!(result.status_code, 200);
    assert_eq!(result.retry_count, 2);
    assert_eq!(server.hits(), 3);
    // 100 ms + 200 ms of backoff, within +-50%.
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(450), "elapsed {elapsed:?}");

    // Every attempt carries the same body and signature.
    let expected_sig = signature::sign(SECRET.as_bytes(), PAYLOAD);
    for request in server.requests() {
        assert_eq!(&request.body[..], PAYLOAD);
        assert_eq!(request.headers["x-signature-256"], expected_sig.as_str());
    }
}

#[tokio::test]
async fn test_retryable_statuses_exhaust_budget() {
    for status in [408u16, 429, 500, 502, 503, 504] {
        let server = status_sequence(vec![status]);
        let sender = retrying(Duration::from_secs(5));

        let result = sender
            .send(
                &CancellationToken::new(),
                &target(server.url("/hook"), policy(2, 5)),
                Bytes::from_static(PAYLOAD),
            )
            .await;

        assert!(!result.success, "status {status}");
        assert_eq!(result.status_code, status);
        assert_eq!(result.retry_count, 2, "status {status}");
        assert_eq!(server.hits(), 3, "status {status}");
    }
}

#[tokio::test]
async fn test_disabled_policy_is_single_attempt() {
    let server = status_sequence(vec![503]);
    let sender = retrying(Duration::from_secs(5));

    let result = sender
        .send(
            &CancellationToken::new(),
            &target(server.url("/hook"), RetryPolicy::disabled()),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert_eq!(result.retry_count, 0);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_zero_max_retries_is_single_attempt() {
    let server = status_sequence(vec![500]);
    let sender = retrying(Duration::from_secs(5));

    let result = sender
        .send(
            &CancellationToken::new(),
            &target(server.url("/hook"), policy(0, 5)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert_eq!(result.retry_count, 0);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_transport_errors_are_retried() {
    let sender = retrying(Duration::from_secs(1));

    let result = sender
        .send(
            &CancellationToken::new(),
            &target("http://127.0.0.1:9/hook".to_string(), policy(2, 5)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert_eq!(result.status_code, 0);
    assert_eq!(result.retry_count, 2);
}

#[tokio::test]
async fn test_timeout_is_transport_failure() {
    let server = common::slow(Duration::from_secs(2));
    let sender = WebhookSender::new(SenderConfig::default().with_timeout(Duration::from_millis(200)))
        .unwrap();

    let started = Instant::now();
    let result = sender
        .send(
            &CancellationToken::new(),
            &server.url("/hook"),
            SECRET.as_bytes(),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert_eq!(result.status_code, 0);
    assert!(result.error_message.unwrap().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_unbounded_response_body_is_not_read_to_the_end() {
    let server = common::endless_body();
    let sender = WebhookSender::new(SenderConfig::default().with_timeout(Duration::from_secs(3)))
        .unwrap();

    let started = Instant::now();
    let result = sender
        .send(
            &CancellationToken::new(),
            &server.url("/hook"),
            SECRET.as_bytes(),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.status_code, 200);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_cancellation_short_circuits_backoff() {
    let server = status_sequence(vec![503]);
    let sender = retrying(Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = sender
        .send(
            &cancel,
            &target(server.url("/hook"), policy(5, 10_000)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.status_code, 503);
    assert_eq!(result.retry_count, 0);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_cancellation_after_retries_reports_completed_retries() {
    // Attempts land at roughly 0, 200 and 600 ms; the next would be at 1400 ms.
    let server = status_sequence(vec![503]);
    let sender = retrying(Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(900)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = sender
        .send(
            &cancel,
            &target(server.url("/hook"), policy(5, 200)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert!(started.elapsed() < Duration::from_millis(1300));
    assert_eq!(result.status_code, 503);
    assert_eq!(result.retry_count, 2);
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let server = common::slow(Duration::from_secs(5));
    let sender = WebhookSender::new(SenderConfig::default()).unwrap();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = sender
        .send(&cancel, &server.url("/hook"), SECRET.as_bytes(), Bytes::new())
        .await;

    assert_eq!(result.status_code, 0);
    assert_eq!(result.error_message.as_deref(), Some("delivery cancelled"));
    assert!(result.response_time < Duration::from_secs(2));
}

#[tokio::test]
async fn test_send_all_fans_out_concurrently() {
    let ok = status_sequence(vec![200]);
    let slow = common::slow(Duration::from_millis(300));
    let failing = status_sequence(vec![500]);

    let sender = WebhookSender::new(SenderConfig::default()).unwrap();
    let targets = vec![
        target(ok.url("/a"), RetryPolicy::default()),
        target(slow.url("/b"), RetryPolicy::default()),
        target(failing.url("/c"), RetryPolicy::default()),
    ];

    let started = Instant::now();
    let results = sender
        .send_all(&CancellationToken::new(), &targets, Bytes::from_static(PAYLOAD))
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(results[1].success);
    assert_eq!(results[2].status_code, 500);
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[tokio::test]
async fn test_deliver_capability_dispatches_through_retry() {
    let server = status_sequence(vec![502, 200]);
    let deliverer: Box<dyn Deliver> = Box::new(retrying(Duration::from_secs(5)));

    let result = deliverer
        .deliver(
            &CancellationToken::new(),
            &target(server.url("/hook"), policy(1, 5)),
            Bytes::from_static(PAYLOAD),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.retry_count, 1);
}

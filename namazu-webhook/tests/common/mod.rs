//! Local HTTP fixtures for webhook integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use namazu_types::{DeliveryTarget, RetryPolicy};
use warp::http::{HeaderMap, StatusCode};
use warp::Filter;

pub const SECRET: &str = "0123456789abcdef0123";

/// One request as seen by a fixture server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Handle to a running fixture server.
pub struct Fixture {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Fixture {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Server answering each POST with the next status in `statuses`,
/// repeating the last one once the list is exhausted.
pub fn status_sequence(statuses: Vec<u16>) -> Fixture {
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let statuses = Arc::new(statuses);

    let route = warp::post()
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .map({
            let hits = Arc::clone(&hits);
            let requests = Arc::clone(&requests);
            move |headers: HeaderMap, body: Bytes| {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                requests.lock().unwrap().push(Recorded { headers, body });
                let status = statuses
                    .get(n)
                    .or_else(|| statuses.last())
                    .copied()
                    .unwrap_or(200);
                warp::reply::with_status(warp::reply(), StatusCode::from_u16(status).unwrap())
            }
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    Fixture {
        addr,
        hits,
        requests,
    }
}

/// Server that waits `delay` before answering 200.
pub fn slow(delay: Duration) -> Fixture {
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let route = warp::post().and_then({
        let hits = Arc::clone(&hits);
        move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok::<_, warp::Rejection>(warp::reply())
            }
        }
    });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    Fixture {
        addr,
        hits,
        requests,
    }
}

/// Server answering 200 with a body that never ends.
pub fn endless_body() -> Fixture {
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let route = warp::post().map({
        let hits = Arc::clone(&hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
            let chunk = Bytes::from(vec![b'x'; 16 * 1024]);
            let stream = futures::stream::repeat(Ok::<_, std::convert::Infallible>(chunk));
            warp::http::Response::new(warp::hyper::Body::wrap_stream(stream))
        }
    });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    Fixture {
        addr,
        hits,
        requests,
    }
}

/// Server answering the ownership challenge by calling `respond` with the
/// parsed request body.
pub fn challenge_responder<R>(respond: R) -> Fixture
where
    R: Fn(&serde_json::Value) -> (u16, String) + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let route = warp::post()
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .map({
            let hits = Arc::clone(&hits);
            let requests = Arc::clone(&requests);
            move |headers: HeaderMap, body: Bytes| {
                hits.fetch_add(1, Ordering::SeqCst);
                let parsed: serde_json::Value =
                    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
                requests.lock().unwrap().push(Recorded { headers, body });
                let (status, reply) = respond(&parsed);
                warp::http::Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(reply)
                    .unwrap()
            }
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    Fixture {
        addr,
        hits,
        requests,
    }
}

pub fn target(url: String, retry: RetryPolicy) -> DeliveryTarget {
    DeliveryTarget {
        subscription_id: "sub-test".to_string(),
        url,
        secret: SECRET.to_string(),
        retry,
    }
}

pub fn policy(max_retries: u32, initial_ms: u64) -> RetryPolicy {
    RetryPolicy {
        enabled: true,
        max_retries,
        initial_ms,
        max_ms: 60_000,
    }
}

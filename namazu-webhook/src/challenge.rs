//! URL-ownership handshake run before a subscription is activated.
//!
//! The relay POSTs `{"type":"url_verification","challenge":"<token>"}`, signed
//! like any delivery, and the subscriber must answer `200` with
//! `{"challenge":"<token>"}`. Passing proves both that the endpoint is
//! reachable and that whoever runs it is willing to echo relay traffic.

use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::header::{CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::sender::{SIGNATURE_HEADER, USER_AGENT};
use crate::signature;

/// Maximum number of response bytes read from the subscriber.
pub const CHALLENGE_BODY_LIMIT: usize = 4096;

const TOKEN_BYTES: usize = 16;

/// Outcome of one ownership handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResult {
    /// Whether the subscriber echoed the token correctly
    pub success: bool,
    /// Why the handshake failed
    pub error_message: Option<String>,
    /// Wall time of the exchange
    pub response_time: Duration,
}

impl ChallengeResult {
    fn passed(response_time: Duration) -> Self {
        Self {
            success: true,
            error_message: None,
            response_time,
        }
    }

    fn failed(message: impl Into<String>, response_time: Duration) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            response_time,
        }
    }
}

#[derive(Serialize)]
struct ChallengeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    challenge: &'a str,
}

#[derive(Deserialize)]
struct ChallengeReply {
    challenge: String,
}

/// Generate a fresh 32-character hex token from the OS random source.
pub fn generate_challenge_token() -> std::result::Result<String, rand::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Runs ownership handshakes against subscriber URLs.
#[derive(Debug, Clone)]
pub struct Challenger {
    client: reqwest::Client,
    user_agent: String,
}

impl Challenger {
    /// Build a challenger with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Build a challenger around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Challenge `url` with a fresh token signed by `secret`.
    ///
    /// The exchange, including reading the response, is bounded by `timeout`
    /// and by `cancel`. Every failure is reported in the result.
    pub async fn verify(
        &self,
        cancel: &CancellationToken,
        url: &str,
        secret: &[u8],
        timeout: Duration,
    ) -> ChallengeResult {
        let started = Instant::now();

        let token = match generate_challenge_token() {
            Ok(token) => token,
            Err(e) => {
                return ChallengeResult::failed(
                    format!("failed to generate challenge token: {e}"),
                    started.elapsed(),
                )
            }
        };

        let body = match serde_json::to_vec(&ChallengeRequest {
            kind: "url_verification",
            challenge: &token,
        }) {
            Ok(body) => body,
            Err(e) => {
                return ChallengeResult::failed(
                    format!("failed to encode challenge: {e}"),
                    started.elapsed(),
                )
            }
        };

        let exchange = self.exchange(url, secret, body, timeout);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err("challenge cancelled".to_string()),
            result = tokio::time::timeout(timeout, exchange) => match result {
                Ok(inner) => inner,
                Err(_) => Err(format!("challenge timed out after {timeout:?}")),
            },
        };
        let elapsed = started.elapsed();

        let reply = match outcome {
            Ok(reply) => reply,
            Err(message) => {
                tracing::debug!(url, %message, "Ownership challenge failed");
                return ChallengeResult::failed(message, elapsed);
            }
        };

        if reply.challenge.as_bytes() == token.as_bytes() {
            tracing::debug!(url, elapsed_ms = elapsed.as_millis() as u64, "Ownership challenge passed");
            ChallengeResult::passed(elapsed)
        } else {
            ChallengeResult::failed("challenge response does not match", elapsed)
        }
    }

    /// POST the challenge body and parse the subscriber's reply.
    async fn exchange(
        &self,
        url: &str,
        secret: &[u8],
        body: Vec<u8>,
        timeout: Duration,
    ) -> std::result::Result<ChallengeReply, String> {
        let mut response = self
            .client
            .post(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature::sign(secret, &body))
            .header(USER_AGENT_HEADER, self.user_agent.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| format!("challenge request failed: {e}"))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(format!("unexpected status: {status}"));
        }

        let mut buffer = Vec::new();
        while buffer.len() < CHALLENGE_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = CHALLENGE_BODY_LIMIT - buffer.len();
                    buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                Ok(None) => break,
                Err(e) => return Err(format!("failed to read challenge response: {e}")),
            }
        }

        serde_json::from_slice::<ChallengeReply>(&buffer)
            .map_err(|e| format!("invalid challenge response: {e}"))
    }
}

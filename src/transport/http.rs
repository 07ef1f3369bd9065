//! HTTP command channel.
//!
//! Wraps `reqwest::Client` with the command endpoint URL, bounded retry and
//! body normalization. The retry budget is passed per call and lives in a
//! local counter, so concurrent calls never observe each other's attempts.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::builder::join_path;
use crate::error::{Error, Result};
use crate::protocol::envelope::decode_body;
use crate::protocol::{CommandEnvelope, CommandRequest, RawReply};

// ============================================================================
// Constants
// ============================================================================

/// Path of the single command endpoint.
const COMMAND_PATH: &str = "/api/command";

// ============================================================================
// HttpChannel
// ============================================================================

/// HTTP client for the command endpoint and plain REST paths.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpChannel {
    /// Creates a channel with a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the client cannot be built.
    pub fn new(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a channel with a pre-built client.
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// The API base URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POSTs `{command, payload}` to the command endpoint.
    ///
    /// Makes at most `1 + retries` attempts.
    pub async fn execute(&self, command: &str, payload: &Value, retries: u32) -> CommandEnvelope {
        let url = match join_path(&self.base_url, COMMAND_PATH) {
            Ok(url) => url,
            Err(e) => return CommandEnvelope::from(e),
        };
        let body = CommandRequest { command, payload };

        self.with_retries(command, retries, || {
            let request = self.client.post(url.clone()).json(&body);
            Self::send(request)
        })
        .await
    }

    /// Issues `method` against `{base_url}{path}` with an optional JSON body.
    ///
    /// Same retry and normalization rules as [`execute`](Self::execute).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        retries: u32,
    ) -> CommandEnvelope {
        let url = match join_path(&self.base_url, path) {
            Ok(url) => url,
            Err(e) => return CommandEnvelope::from(e),
        };

        self.with_retries(path, retries, || {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }
            Self::send(request)
        })
        .await
    }

    /// Runs `attempt` until it succeeds, fails permanently, or the budget is spent.
    async fn with_retries<F, Fut>(&self, label: &str, retries: u32, mut attempt: F) -> CommandEnvelope
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut remaining = retries;

        loop {
            match attempt().await {
                Ok(body) => return RawReply::from_http(body).normalize(),
                Err(e) if remaining > 0 && e.is_retryable() => {
                    remaining -= 1;
                    warn!(label, error = %e, remaining, "HTTP attempt failed, retrying");
                }
                Err(e) => {
                    debug!(label, error = %e, "HTTP call failed");
                    return CommandEnvelope::from(e);
                }
            }
        }
    }

    /// Sends one request. Non-2xx statuses are errors.
    async fn send(request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        trace!(status = status.as_u16(), len = text.len(), "HTTP response");

        if !status.is_success() {
            return Err(Error::http_status(status.as_u16(), text));
        }

        Ok(decode_body(&text))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, HttpChannel) {
        let server = MockServer::start().await;
        let base_url = Url::parse(&server.uri()).expect("mock uri");
        let channel = HttpChannel::new(base_url).expect("client");
        (server, channel)
    }

    #[tokio::test]
    async fn test_execute_posts_command_body() {
        let (server, channel) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .and(body_json(json!({"command": "wallet.balance", "payload": {"currency": "TON"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"amount": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = channel
            .execute("wallet.balance", &json!({"currency": "TON"}), 0)
            .await;
        assert_eq!(envelope, CommandEnvelope::success(json!({"amount": 42})));
    }

    #[tokio::test]
    async fn test_envelope_body_passes_through() {
        let (server, channel) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "error": "insufficient balance"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let envelope = channel.execute("withdraw", &json!({"amount": 10}), 3).await;
        assert_eq!(envelope.error_message(), Some("insufficient balance"));
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let (server, channel) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let envelope = channel.execute("recharge", &json!({}), 2).await;
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("HTTP 503: unavailable"));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let (server, channel) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/command"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = channel.execute("recharge", &json!({}), 1).await;
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn test_request_uses_verb_and_path() {
        let (server, channel) = setup().await;

        Mock::given(method("PUT"))
            .and(path("/api/wallet/limits"))
            .and(body_json(json!({"daily": 100})))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = channel
            .request(Method::PUT, "/api/wallet/limits", Some(&json!({"daily": 100})), 0)
            .await;
        assert_eq!(envelope, CommandEnvelope::success(Value::Null));
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let channel = HttpChannel::new(Url::parse("http://127.0.0.1:1").expect("url")).expect("client");
        let envelope = channel.execute("ping", &Value::Null, 1).await;
        assert!(!envelope.success);
        assert!(envelope.error.expect("error").starts_with("HTTP request failed"));
    }
}

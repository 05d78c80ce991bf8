//! Transport collaborator interface and the retry interceptor applied on top
//! of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde_json::{json, Map, Value as JsonValue};
use tokio::time::sleep;

use crate::{backoff, Method, RetryPolicy};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One outgoing call as handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL or a path relative to the transport's base URL.
    pub url: String,
    pub payload: Option<JsonValue>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    /// Per-call timeout; the transport default applies when `None`.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    /// JSON dump used by debug logging. Authorization values are redacted.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "method": self.method.as_str(),
            "url": self.url,
            "query": self.query,
            "headers": headers_to_json(&self.headers),
            "timeout_ms": self.timeout.map(|timeout| timeout.as_millis() as u64),
            "payload": self.payload,
        })
    }
}

/// Response received from the backend.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body; non-JSON text is kept as a string, an empty body
    /// is `null`.
    pub body: JsonValue,
}

impl TransportResponse {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses raw body text the way every response body is normalized.
    pub fn parse_body(text: &str) -> JsonValue {
        if text.trim().is_empty() {
            return JsonValue::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_owned()))
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "status": self.status,
            "headers": headers_to_json(&self.headers),
            "body": self.body,
        })
    }
}

/// Failure reported by a [`Transport`].
///
/// The presence of `response` and `request` tells how far the call got:
/// a response means the server answered with a non-success status, a
/// request without a response means the call went out but nothing came
/// back, neither means the call could not be built.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub request: Option<TransportRequest>,
    pub response: Option<TransportResponse>,
    #[source]
    pub source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request: None,
            response: None,
            source: None,
        }
    }

    pub fn with_request(mut self, request: TransportRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: TransportResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether another attempt may succeed: no response at all, or one of
    /// the throttling / gateway statuses.
    pub fn is_transient(&self) -> bool {
        match &self.response {
            Some(response) => matches!(response.status, 429 | 500 | 502 | 503 | 504),
            None => self.request.is_some(),
        }
    }
}

/// Sends one request and reports a response or a failure.
///
/// Implementations must return non-2xx responses as a [`TransportError`]
/// carrying `response`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Applies a [`RetryPolicy`] to a shared transport.
///
/// Attempts run sequentially. Only transient failures are retried and the
/// error of the last attempt is returned unchanged.
#[derive(Debug)]
pub struct RetryingTransport<T> {
    inner: Arc<T>,
    policy: RetryPolicy,
}

impl<T> RetryingTransport<T> {
    pub fn new(inner: Arc<T>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T> Clone for RetryingTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            policy: self.policy.clone(),
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut attempt = 0u32;
        loop {
            let error = match self.inner.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if attempt >= self.policy.max_retries || !error.is_transient() {
                return Err(error);
            }
            attempt += 1;

            let delay = backoff::delay(
                attempt,
                self.policy.backoff_strategy,
                self.policy.delay_factor,
            );
            if let Some(on_retry) = &self.policy.on_retry {
                on_retry.call(attempt, &error);
            }

            tracing::debug!(
                method = request.method.as_str(),
                url = %request.url,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying request"
            );
            sleep(delay).await;
        }
    }
}

/// Header dump for debug output with `authorization` redacted.
pub(crate) fn headers_to_json(headers: &HeaderMap) -> JsonValue {
    let mut map = Map::new();
    for (name, value) in headers {
        let value = if name == AUTHORIZATION {
            "<redacted>".to_owned()
        } else {
            value.to_str().unwrap_or("<binary>").to_owned()
        };
        map.insert(name.as_str().to_owned(), JsonValue::String(value));
    }
    JsonValue::Object(map)
}

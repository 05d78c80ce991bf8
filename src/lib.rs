//! `apibase-http` is a reusable async base client for talking to one HTTP API.
//!
//! Every call made through [`ApiClient`] goes through the same pipeline:
//! - [`RequestHooks::pre_request_filter`] and [`RequestHooks::pre_request_action`]
//! - retry policy resolution ([`resolve`]), merging a per-call [`RetryOverride`]
//!   onto the client's default [`RetryPolicy`]
//! - dispatch through a [`Transport`] with retries and [`backoff::delay`] waits
//! - classification of failures into [`ApiError`]
//!
//! # Example
//!
//! ```no_run
//! use apibase_http::{ApiClient, ClientConfig, RequestConfig, RetryOverride, RetryPolicy};
//!
//! # async fn run() -> apibase_http::Result<()> {
//! let client = ApiClient::new(
//!     ClientConfig::new("https://api.example.com/v1")
//!         .with_name("example")
//!         .with_retry_policy(RetryPolicy::default().with_max_retries(3)),
//! )?;
//!
//! let user: serde_json::Value = client
//!     .get("/users/7", RequestConfig::new().retry(RetryOverride::default().max_retries(0)))
//!     .await?
//!     .into_data();
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
mod client;
mod error;
mod hooks;
mod http;
mod options;
mod retry;
mod transport;
mod types;

pub use client::ApiClient;
pub use error::{classify, ApiError};
pub use hooks::{
    log_outgoing_request, DefaultHooks, FilteredRequest, HookContext, Logger, RequestHooks,
    TracingLogger,
};
pub use http::ReqwestTransport;
pub use options::{ClientConfig, ConfigError, DebugLevel, TransportConfig};
pub use retry::{resolve, BackoffStrategy, OnRetry, RetryOverride, RetryPolicy};
pub use transport::{
    RetryingTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
pub use types::{Method, RequestConfig, ResponseEnvelope};

pub type Result<T> = std::result::Result<T, ApiError>;

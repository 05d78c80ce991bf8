//! Request lifecycle extension points and the logging collaborator.

use serde_json::{json, Value as JsonValue};

use crate::transport::headers_to_json;
use crate::{classify, ApiError, DebugLevel, Method, RequestConfig, TransportError};

/// Sink for debug output.
pub trait Logger: Send + Sync {
    /// Writes a titled structured dump.
    fn log_titled_data(&self, title: &str, data: &JsonValue);

    /// Writes a single informational line.
    fn log_info_line(&self, text: &str);
}

/// [`Logger`] that emits `tracing` events under the `apibase_http` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_titled_data(&self, title: &str, data: &JsonValue) {
        tracing::info!(target: "apibase_http", title, data = %data, "{title}");
    }

    fn log_info_line(&self, text: &str) {
        tracing::info!(target: "apibase_http", "{text}");
    }
}

/// Client state visible to hooks.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub name: &'a str,
    pub debug: bool,
    pub debug_level: DebugLevel,
    pub logger: &'a dyn Logger,
}

/// Payload and config after [`RequestHooks::pre_request_filter`].
#[derive(Clone, Debug)]
pub struct FilteredRequest {
    pub payload: Option<JsonValue>,
    pub config: RequestConfig,
}

/// Overridable steps around every call.
///
/// `pre_request_filter` then `pre_request_action` run once per call before
/// dispatch; `error_handler` runs once for a failed call. Each method has a
/// default so implementors override only what they need.
pub trait RequestHooks: Send + Sync {
    /// Replaces payload and config before dispatch. Defaults to identity.
    fn pre_request_filter(
        &self,
        _ctx: &HookContext<'_>,
        _method: Method,
        _url: &str,
        payload: Option<JsonValue>,
        config: RequestConfig,
    ) -> FilteredRequest {
        FilteredRequest { payload, config }
    }

    /// Side effects before dispatch. Defaults to a debug dump of the request.
    fn pre_request_action(
        &self,
        ctx: &HookContext<'_>,
        method: Method,
        url: &str,
        payload: Option<&JsonValue>,
        config: &RequestConfig,
    ) {
        log_outgoing_request(ctx, method, url, payload, config);
    }

    /// Maps a transport failure to the returned error. Defaults to [`classify`].
    fn error_handler(
        &self,
        ctx: &HookContext<'_>,
        method: Method,
        url: &str,
        error: TransportError,
    ) -> ApiError {
        classify(ctx, method, url, error)
    }
}

/// Hooks with every default behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl RequestHooks for DefaultHooks {}

/// Default `pre_request_action`: payload only in normal mode, payload and
/// config in verbose mode, nothing when debug is off.
pub fn log_outgoing_request(
    ctx: &HookContext<'_>,
    method: Method,
    url: &str,
    payload: Option<&JsonValue>,
    config: &RequestConfig,
) {
    if !ctx.debug {
        return;
    }

    let title = format!("[{}] {method} {url}", ctx.name);
    let data = match ctx.debug_level {
        DebugLevel::Normal => json!({ "payload": payload }),
        DebugLevel::Verbose => json!({
            "payload": payload,
            "config": config_to_json(config),
        }),
    };
    ctx.logger.log_titled_data(&title, &data);
}

fn config_to_json(config: &RequestConfig) -> JsonValue {
    json!({
        "headers": headers_to_json(&config.headers),
        "query": config.query,
        "timeout_ms": config.timeout.map(|timeout| timeout.as_millis() as u64),
        "retry": config.retry.as_ref().map(|retry| json!({
            "max_retries": retry.max_retries,
            "backoff_strategy": retry.backoff_strategy,
            "delay_factor_ms": retry.delay_factor.map(|delay| delay.as_millis() as u64),
        })),
    })
}

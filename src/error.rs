use serde_json::{json, Value as JsonValue};

use crate::{DebugLevel, HookContext, Method, TransportError};

/// Error type returned by this crate.
///
/// Every failed transport call becomes exactly one of `Response`,
/// `NoResponse` or `RequestSetup`, keeping the transport error as `cause`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Response {
        message: String,
        status: u16,
        /// Response body as received.
        body: JsonValue,
        #[source]
        cause: Box<TransportError>,
    },
    /// The request went out but no response came back (network, timeout).
    #[error("{message}")]
    NoResponse {
        message: String,
        #[source]
        cause: Box<TransportError>,
    },
    /// The request could not be built or sent.
    #[error("{message}")]
    RequestSetup {
        message: String,
        #[source]
        cause: Box<TransportError>,
    },
    /// A successful response body did not match the requested type.
    #[error("decode error: {message}")]
    Decode { message: String, body: JsonValue },
}

impl ApiError {
    /// HTTP status of a `Response` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&JsonValue> {
        match self {
            Self::Response { body, .. } | Self::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Original transport error of a classified failure.
    pub fn cause(&self) -> Option<&TransportError> {
        match self {
            Self::Response { cause, .. }
            | Self::NoResponse { cause, .. }
            | Self::RequestSetup { cause, .. } => Some(cause.as_ref()),
            Self::Decode { .. } => None,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response { .. })
    }

    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    pub fn is_request_setup(&self) -> bool {
        matches!(self, Self::RequestSetup { .. })
    }
}

/// Turns a transport failure into an [`ApiError`].
///
/// A received response wins over an outgoing request; with neither the
/// failure happened while building the call. When debug is enabled the
/// matching dump is written to the context's logger first.
pub fn classify(
    ctx: &HookContext<'_>,
    method: Method,
    url: &str,
    error: TransportError,
) -> ApiError {
    let prefix = format!("[{}] {method} {url}", ctx.name);

    if let Some(response) = &error.response {
        let status = response.status;
        let body = response.body.clone();
        let message = match body_message(&body) {
            Some(detail) => format!("{prefix} failed with status {status}: {detail}"),
            None => format!("{prefix} failed with status {status}"),
        };

        if ctx.debug {
            match ctx.debug_level {
                DebugLevel::Verbose => ctx
                    .logger
                    .log_titled_data(&format!("{prefix} error response"), &response.to_json()),
                DebugLevel::Normal => ctx
                    .logger
                    .log_titled_data(&format!("{prefix} error response body"), &body),
            }
        }

        return ApiError::Response {
            message,
            status,
            body,
            cause: Box::new(error),
        };
    }

    if let Some(request) = &error.request {
        let message = format!("{prefix} failed with no response: {}", error.message);

        if ctx.debug {
            match ctx.debug_level {
                DebugLevel::Verbose => ctx.logger.log_titled_data(
                    &format!("{prefix} request without response"),
                    &request.to_json(),
                ),
                DebugLevel::Normal => ctx.logger.log_info_line(&message),
            }
        }

        return ApiError::NoResponse {
            message,
            cause: Box::new(error),
        };
    }

    let message = format!("{prefix} failed: {}", error.message);
    if ctx.debug {
        ctx.logger.log_titled_data(
            &format!("{prefix} request setup error"),
            &json!({
                "message": error.message,
                "source": error.source.as_ref().map(|source| source.to_string()),
            }),
        );
    }

    ApiError::RequestSetup {
        message,
        cause: Box::new(error),
    }
}

fn body_message(body: &JsonValue) -> Option<&str> {
    body.get("message")
        .and_then(JsonValue::as_str)
        .filter(|message| !message.is_empty())
}

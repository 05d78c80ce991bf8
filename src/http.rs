use std::fmt;

use async_trait::async_trait;
use reqwest::Url;

use crate::{Transport, TransportConfig, TransportError, TransportRequest, TransportResponse};

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReqwestTransport {
    /// Builds the underlying client with the configured timeout and default
    /// headers.
    pub fn new(base_url: impl Into<String>, config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().default_headers(config.headers.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            TransportError::new(format!("could not build http client: {err}")).with_source(err)
        })?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve_url(&self, url: &str) -> Result<Url, TransportError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url).map_err(|err| {
                TransportError::new(format!("invalid url '{url}': {err}")).with_source(err)
            });
        }

        let joined = join_url(&self.base_url, url);
        Url::parse(&joined).map_err(|err| {
            TransportError::new(format!("invalid url '{joined}': {err}")).with_source(err)
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.resolve_url(&request.url)?;

        let mut builder = self
            .http
            .request(request.method.into(), url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) if err.is_builder() => {
                return Err(TransportError::new(err.to_string()).with_source(err));
            }
            Err(err) => {
                return Err(TransportError::new(err.to_string())
                    .with_request(request)
                    .with_source(err));
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return Err(body_read_error(request, status, err)),
        };

        let response = TransportResponse {
            status,
            headers,
            body: TransportResponse::parse_body(&text),
        };
        if response.is_success() {
            return Ok(response);
        }

        Err(
            TransportError::new(format!("request failed with status code {status}"))
                .with_request(request)
                .with_response(response),
        )
    }
}

/// Failure while streaming the body of a response whose status already arrived.
///
/// No [`TransportResponse`] can be built without the body, so the status goes
/// into the message.
fn body_read_error<E>(request: TransportRequest, status: u16, err: E) -> TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    TransportError::new(format!("failed to read response body (status {status}): {err}"))
        .with_request(request)
        .with_source(err)
}

fn join_url(base_url: &str, path: &str) -> String {
    match (base_url.trim_end_matches('/'), path.trim_start_matches('/')) {
        ("", path) => path.to_owned(),
        (base, "") => base.to_owned(),
        (base, path) => format!("{base}/{path}"),
    }
}

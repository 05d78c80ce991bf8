use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    resolve, ApiError, ClientConfig, DefaultHooks, FilteredRequest, HookContext, Logger, Method,
    ReqwestTransport, RequestConfig, RequestHooks, ResponseEnvelope, Result, RetryingTransport,
    TracingLogger, Transport, TransportError, TransportRequest, TransportResponse,
};

/// Base client for one backend API.
///
/// Runs lifecycle hooks, applies the effective retry policy, dispatches to
/// the transport and classifies failures into [`ApiError`]. Cloning is
/// cheap and clones share the same transport.
pub struct ApiClient<T = ReqwestTransport> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
    shared: RetryingTransport<T>,
    hooks: Arc<dyn RequestHooks>,
    logger: Arc<dyn Logger>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            shared: self.shared.clone(),
            hooks: Arc::clone(&self.hooks),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl<T> fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApiClient<ReqwestTransport> {
    /// Creates a client backed by `reqwest`.
    ///
    /// Fails with [`ApiError::RequestSetup`] when the HTTP client cannot be
    /// built from the transport config.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.base_url.clone(), &config.transport)
            .map_err(|err| ApiError::RequestSetup {
                message: format!("[{}] {}", config.name, err.message),
                cause: Box::new(err),
            })?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Creates a client around a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let transport = Arc::new(transport);
        let shared =
            RetryingTransport::new(Arc::clone(&transport), config.default_retry_policy.clone());
        Self {
            config: Arc::new(config),
            transport,
            shared,
            hooks: Arc::new(DefaultHooks),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_hooks(mut self, hooks: impl RequestHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>> {
        self.dispatch(Method::Get, url, None, config).await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>> {
        self.dispatch(Method::Delete, url, None, config).await
    }

    pub async fn post<B, R>(
        &self,
        url: &str,
        payload: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::Post, url, Some(payload), config).await
    }

    pub async fn put<B, R>(
        &self,
        url: &str,
        payload: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::Put, url, Some(payload), config).await
    }

    pub async fn patch<B, R>(
        &self,
        url: &str,
        payload: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::Patch, url, Some(payload), config).await
    }

    /// Issues a call with any supported verb.
    ///
    /// A payload that cannot be serialized to JSON fails as
    /// [`ApiError::RequestSetup`] without reaching the transport.
    pub async fn request<B, R>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&B>,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = match payload.map(serde_json::to_value).transpose() {
            Ok(payload) => payload,
            Err(err) => {
                let error =
                    TransportError::new(format!("could not serialize payload: {err}")).with_source(err);
                return Err(self.hooks.error_handler(&self.hook_context(), method, url, error));
            }
        };
        self.dispatch(method, url, payload, config).await
    }

    async fn dispatch<R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        payload: Option<JsonValue>,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<R>> {
        let ctx = self.hook_context();
        let FilteredRequest { payload, config } =
            self.hooks.pre_request_filter(&ctx, method, url, payload, config);
        self.hooks
            .pre_request_action(&ctx, method, url, payload.as_ref(), &config);

        let RequestConfig {
            headers,
            query,
            timeout,
            retry,
        } = config;
        let request = TransportRequest {
            method,
            url: url.to_owned(),
            payload,
            headers,
            query,
            timeout,
        };

        let outcome = match retry {
            Some(overrides) => {
                let policy = resolve(&self.config.default_retry_policy, Some(&overrides));
                RetryingTransport::new(Arc::clone(&self.transport), policy)
                    .send(request)
                    .await
            }
            None => self.shared.send(request).await,
        };

        match outcome {
            Ok(response) => decode_envelope(response),
            Err(err) => Err(self.hooks.error_handler(&ctx, method, url, err)),
        }
    }

    fn hook_context(&self) -> HookContext<'_> {
        HookContext {
            name: &self.config.name,
            debug: self.config.debug,
            debug_level: self.config.debug_level,
            logger: self.logger.as_ref(),
        }
    }
}

fn decode_envelope<R: DeserializeOwned>(response: TransportResponse) -> Result<ResponseEnvelope<R>> {
    let data = serde_json::from_value(response.body.clone()).map_err(|err| ApiError::Decode {
        message: format!("invalid response body: {err}"),
        body: response.body.clone(),
    })?;
    Ok(ResponseEnvelope {
        raw_response: response,
        data,
    })
}

use std::time::Duration;

use apibase_http::{
    ApiClient, BackoffStrategy, ClientConfig, DebugLevel, OnRetry, RequestConfig, RetryOverride,
    RetryPolicy,
};
use serde_json::{json, Value as JsonValue};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // APIBASE_BASE_URL, APIBASE_TOKEN, APIBASE_MAX_RETRIES, ...
    let config = match ClientConfig::from_env("APIBASE") {
        Ok(config) => config,
        Err(_) => ClientConfig::new("https://httpbin.org").with_name("httpbin"),
    };
    let api = ApiClient::new(
        config
            .with_debug(DebugLevel::Normal)
            .with_retry_policy(
                RetryPolicy::default()
                    .with_max_retries(2)
                    .with_backoff(BackoffStrategy::Exponential, Duration::from_millis(250))
                    .with_on_retry(OnRetry::new(|attempt, error| {
                        eprintln!("retry #{attempt} after: {error}");
                    })),
            ),
    )?;

    let echoed = api
        .post::<_, JsonValue>("/anything", &json!({"hello": "world"}), RequestConfig::new())
        .await?;
    println!("{} {}", echoed.status(), echoed.data);

    let missing = api
        .get::<JsonValue>(
            "/status/404",
            RequestConfig::new().retry(RetryOverride::default().max_retries(0)),
        )
        .await;
    if let Err(err) = missing {
        println!("status={:?} message={err}", err.status());
    }

    Ok(())
}

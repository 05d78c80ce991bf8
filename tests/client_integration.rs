use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use apibase_http::{
    ApiClient, ApiError, BackoffStrategy, ClientConfig, RequestConfig, RetryOverride, RetryPolicy,
    TransportConfig,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
enum MockBody {
    Json(JsonValue),
    Text(&'static str),
}

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: MockBody,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body: MockBody::Json(body),
            delay: Duration::from_millis(0),
        }
    }

    fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body: MockBody::Text(body),
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct Received {
    method: String,
    uri: String,
    authorization: Option<String>,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    received: Arc<Mutex<Vec<Received>>>,
    hits: Arc<AtomicUsize>,
}

async fn handler(State(state): State<MockState>, request: Request) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    state
        .received
        .lock()
        .expect("received mutex must not be poisoned")
        .push(Received {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            authorization: parts
                .headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    match response.body {
        MockBody::Json(body) => (response.status, Json(body)).into_response(),
        MockBody::Text(body) => (response.status, body).into_response(),
    }
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Received>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn received(&self) -> Vec<Received> {
        self.received
            .lock()
            .expect("received mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        received: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}/api"),
        hits: state.hits,
        received: state.received,
        task,
    }
}

fn client(base_url: &str, max_retries: u32) -> ApiClient {
    ApiClient::new(
        ClientConfig::new(base_url)
            .with_name("users-api")
            .with_retry_policy(
                RetryPolicy::default()
                    .with_max_retries(max_retries)
                    .with_backoff(BackoffStrategy::Exponential, Duration::from_millis(1)),
            ),
    )
    .expect("client must build")
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

#[tokio::test]
async fn get_decodes_json_body() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({"id": 1, "name": "Kit"}),
    )])
    .await;
    let api = client(&server.base_url, 0);

    let envelope = api
        .get::<User>("/users/1", RequestConfig::new().query("expand", "roles"))
        .await
        .expect("get must succeed");

    assert_eq!(
        envelope.data,
        User {
            id: 1,
            name: "Kit".to_owned()
        }
    );
    assert_eq!(envelope.raw_response.status, 200);
    let received = server.received();
    assert_eq!(received[0].method, "GET");
    assert_eq!(received[0].uri, "/api/users/1?expand=roles");
}

#[tokio::test]
async fn post_sends_json_payload_and_default_headers() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::CREATED,
        json!({"id": 2, "name": "Ada"}),
    )])
    .await;
    let transport = TransportConfig::default()
        .with_bearer_token("s3cret")
        .expect("token must be a valid header");
    let api = ApiClient::new(ClientConfig::new(&server.base_url).with_transport(transport))
        .expect("client must build");

    let envelope = api
        .post::<_, User>("users", &json!({"name": "Ada"}), RequestConfig::new())
        .await
        .expect("post must succeed");

    assert_eq!(envelope.status(), 201);
    let received = server.received();
    assert_eq!(received[0].method, "POST");
    assert_eq!(received[0].authorization.as_deref(), Some("Bearer s3cret"));
    assert_eq!(
        serde_json::from_str::<JsonValue>(&received[0].body).expect("body must be json"),
        json!({"name": "Ada"})
    );
}

#[tokio::test]
async fn retries_on_retryable_http_status() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"})),
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"})),
        MockResponse::json(StatusCode::OK, json!({"id": 3, "name": "Lin"})),
    ])
    .await;
    let api = client(&server.base_url, 2);

    let envelope = api
        .put::<_, User>("/users/3", &json!({"name": "Lin"}), RequestConfig::new())
        .await
        .expect("request must succeed after retry");

    assert_eq!(envelope.data.id, 3);
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_response_error() {
    let server = spawn_server(vec![]).await;
    let api = client(&server.base_url, 2);

    let err = api
        .get::<User>("/users/1", RequestConfig::new())
        .await
        .expect_err("request must fail");

    assert_eq!(err.status(), Some(500));
    assert_eq!(
        err.body(),
        Some(&json!({"message": "no mock response available"}))
    );
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::NOT_FOUND,
        json!({"message": "Not Found"}),
    )])
    .await;
    let api = client(&server.base_url, 3);

    let err = api
        .delete::<JsonValue>("/users/9", RequestConfig::new())
        .await
        .expect_err("request must fail");

    match &err {
        ApiError::Response { status, body, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(body, &json!({"message": "Not Found"}));
        }
        other => panic!("expected response error, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "[users-api] DELETE /users/9 failed with status 404: Not Found"
    );
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn plain_text_error_body_is_kept_as_string() {
    let server = spawn_server(vec![MockResponse::text(
        StatusCode::BAD_REQUEST,
        "missing field: name",
    )])
    .await;
    let api = client(&server.base_url, 0);

    let err = api
        .patch::<_, JsonValue>("/users/1", &json!({}), RequestConfig::new())
        .await
        .expect_err("request must fail");

    assert_eq!(err.body(), Some(&json!("missing field: name")));
    assert_eq!(err.to_string(), "[users-api] PATCH /users/1 failed with status 400");
}

#[tokio::test]
async fn per_call_override_disables_retry() {
    let server = spawn_server(vec![]).await;
    let api = client(&server.base_url, 3);

    api.get::<JsonValue>(
        "/users",
        RequestConfig::new().retry(RetryOverride::default().max_retries(0)),
    )
    .await
    .expect_err("request must fail");

    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_timeout_surfaces_no_response_error() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({"id": 1, "name": "Kit"}),
    )
    .with_delay(Duration::from_millis(150))])
    .await;
    let api = client(&server.base_url, 0);

    let err = api
        .get::<User>("/users/1", RequestConfig::new().timeout(Duration::from_millis(20)))
        .await
        .expect_err("request must timeout");

    assert!(err.is_no_response(), "expected no-response error, got {err:?}");
    let cause = err.cause().expect("cause must be kept");
    assert!(cause.request.is_some());
    assert!(cause.response.is_none());
}

#[tokio::test]
async fn connection_refused_is_no_response_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let api = client(&format!("http://{address}"), 0);
    let err = api
        .get::<JsonValue>("/health", RequestConfig::new())
        .await
        .expect_err("request must fail");

    assert!(err.is_no_response(), "expected no-response error, got {err:?}");
}

#[tokio::test]
async fn invalid_base_url_is_setup_error() {
    let api = client("", 3);

    let err = api
        .get::<JsonValue>("/users", RequestConfig::new())
        .await
        .expect_err("request must fail");

    assert!(err.is_request_setup(), "expected setup error, got {err:?}");
}

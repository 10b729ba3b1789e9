#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use http_body_util::BodyExt;
use layoutgen_api::auth::jwt::{generate_access_token, JwtConfig};
use layoutgen_api::billing::entitlements::{EntitlementProvider, NoEntitlements};
use layoutgen_api::config::{GenerationConfig, ServerConfig};
use layoutgen_api::router::build_app_router;
use layoutgen_api::startup::build_state;
use layoutgen_api::state::AppState;
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::JobId;
use layoutgen_db::memory::MemoryJobStore;
use layoutgen_db::StoreHandles;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// Replica the test app runs as.
pub const TEST_REPLICA: &str = "a";

/// Chunks the fake upstream streams for ordinary prompts.
pub const LAYOUT_CHUNKS: [&str; 2] = ["{\"ui", "Data\":1}"];

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(generation_url: String) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        replica_id: ReplicaId::new(TEST_REPLICA),
        database_url: None,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        generation: GenerationConfig {
            api_url: generation_url,
            api_key: Some("test-key".to_string()),
        },
        entitlements: None,
    }
}

// ---------------------------------------------------------------------------
// Fake generation API
// ---------------------------------------------------------------------------

/// Counts requests so tests can assert the upstream was (not) contacted.
#[derive(Clone, Default)]
pub struct Upstream {
    pub url: String,
    pub calls: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// `fail` answers 500, `hang` sends one chunk and never finishes, anything
/// else streams [`LAYOUT_CHUNKS`].
async fn fake_generate(calls: Arc<AtomicUsize>, body: serde_json::Value) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);
    match body["prompt"].as_str().unwrap_or_default() {
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "hang" => {
            let first = futures::stream::iter([Ok::<_, std::io::Error>("{\"ui".to_string())]);
            let rest = futures::stream::pending::<Result<String, std::io::Error>>();
            Body::from_stream(first.chain(rest)).into_response()
        }
        _ => {
            let chunks = futures::stream::iter(LAYOUT_CHUNKS).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, std::io::Error>(chunk.to_string())
            });
            Body::from_stream(chunks).into_response()
        }
    }
}

pub async fn spawn_upstream() -> Upstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = Router::new().route(
        "/generate",
        post(move |Json(body): Json<serde_json::Value>| fake_generate(counter.clone(), body)),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Upstream {
        url: format!("http://{addr}/generate"),
        calls,
    }
}

// ---------------------------------------------------------------------------
// Test app
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryJobStore>,
    pub upstream: Upstream,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Wait until the fetch for `job_id` has finished on this replica.
    pub async fn settled(&self, job_id: JobId) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.state.runtime.registry().lookup(job_id).is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("fetch settled");
    }
}

/// Build the full application router over an in-memory store and a fake
/// upstream, with no payments provider.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(NoEntitlements)).await
}

pub async fn build_test_app_with(entitlements: Arc<dyn EntitlementProvider>) -> TestApp {
    let upstream = spawn_upstream().await;
    let config = test_config(upstream.url.clone());
    let store = Arc::new(MemoryJobStore::new());
    let state = build_state(
        config.clone(),
        StoreHandles::new(Arc::clone(&store)),
        entitlements,
        CancellationToken::new(),
    );
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        store,
        upstream,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Bearer token for `user_id` signed with the test secret.
pub fn token(user_id: &str) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
    };
    generate_access_token(user_id, false, 3600, &config).unwrap()
}

pub fn anonymous_token(user_id: &str) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
    };
    generate_access_token(user_id, true, 3600, &config).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn json_auth(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    json_auth(app, Method::POST, uri, body, Some(token)).await
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

pub async fn body_text(response: Response) -> String {
    let bytes = tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .expect("body finished")
        .unwrap()
        .to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// One parsed Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Read an SSE body to the end and parse its events, skipping comments.
pub async fn sse_events(response: Response) -> Vec<SseEvent> {
    let text = body_text(response).await;
    text.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = Vec::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    event = Some(value.trim_start().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                }
            }
            event.map(|event| SseEvent {
                event,
                data: data.join("\n"),
            })
        })
        .collect()
}

/// Concatenate the JSON-string payloads of `chunk` events.
pub fn chunk_text(events: &[SseEvent]) -> String {
    events
        .iter()
        .filter(|e| e.event == "chunk")
        .map(|e| serde_json::from_str::<String>(&e.data).unwrap())
        .collect()
}

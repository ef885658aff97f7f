//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with an in-memory card store and mock order source and delivery channel,
//! so the API can be exercised without a database file or external services.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use autodeliver_core::{
    load_config_from_str, CardInventory, DeliveryChannel, DeliveryOrchestrator, KeywordRule,
    OrchestratorConfig, OrderSource, ProductMatcher, SqliteCardStore,
    testing::{MockDeliveryChannel, MockOrderSource},
};

/// Re-export fixtures for test convenience
pub use autodeliver_core::testing::fixtures;

/// Config shown by `GET /api/v1/config`. Backends here are display only;
/// the orchestrator runs against the mocks.
pub const TEST_CONFIG: &str = r#"
[orders]
backend = "remote"

[orders.remote]
url = "https://orders.example/api/orders"
token = "order-feed-secret"

[delivery]
backend = "http"

[delivery.http]
url = "https://orders.example/api/orders/{order_id}/deliver"
token = "delivery-secret"

[[matcher.rules]]
keyword = "gpt"
pool = "GPT"

[server]
host = "127.0.0.1"
port = 8080
"#;

/// In-process router with controllable collaborators.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteCardStore>,
    pub source: Arc<MockOrderSource>,
    pub channel: Arc<MockDeliveryChannel>,
    pub orchestrator: DeliveryOrchestrator,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let config = load_config_from_str(TEST_CONFIG).expect("Failed to parse test config");

        let store = Arc::new(SqliteCardStore::in_memory().expect("Failed to create store"));
        let source = Arc::new(MockOrderSource::new());
        let channel = Arc::new(MockDeliveryChannel::new());
        let matcher = Arc::new(
            ProductMatcher::new(vec![KeywordRule::new("gpt", "GPT")])
                .expect("Failed to build matcher"),
        );

        let orchestrator = DeliveryOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&store) as Arc<dyn CardInventory>,
            matcher,
            Arc::clone(&source) as Arc<dyn OrderSource>,
            Arc::clone(&channel) as Arc<dyn DeliveryChannel>,
        );

        let state = Arc::new(autodeliver_server::state::AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn CardInventory>,
            orchestrator.clone(),
        ));
        let router = autodeliver_server::api::create_router(state);

        Self {
            router,
            store,
            source,
            channel,
            orchestrator,
        }
    }

    /// Import `count` codes named `POOL-001`.. into a pool.
    pub fn stock(&self, pool: &str, count: usize) {
        let mut lines = Cursor::new(fixtures::code_lines(pool, count));
        self.store
            .import_codes(pool, &mut lines)
            .expect("Failed to import codes");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let (status, bytes) = self.send("GET", path).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let (status, body_bytes) = self.send(method, path).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, method: &str, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, bytes.to_vec())
    }
}

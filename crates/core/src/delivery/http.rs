//! Delivery through an authenticated HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{truncate_body, DeliveryChannel, DeliveryError};
use crate::config::HttpDeliveryConfig;

#[derive(Debug, Serialize)]
struct DeliverRequest<'a> {
    order_id: &'a str,
    message: &'a str,
}

/// POSTs `{order_id, message}` to a per-order URL.
pub struct HttpDelivery {
    client: Client,
    url_template: String,
    token: String,
}

impl HttpDelivery {
    pub fn new(config: &HttpDeliveryConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            url_template: config.url.clone(),
            token: config.token.clone(),
        })
    }

    /// Endpoint for an order, with the id URL-encoded.
    pub fn url_for(&self, order_id: &str) -> String {
        self.url_template
            .replace("{order_id}", &urlencoding::encode(order_id))
    }
}

#[async_trait]
impl DeliveryChannel for HttpDelivery {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, order_id: &str, message: &str) -> Result<(), DeliveryError> {
        let url = self.url_for(order_id);
        debug!(order_id, url = %url, "Posting delivery");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&DeliverRequest { order_id, message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    type Received = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn deliver_handler(
        State(received): State<Received>,
        Path(order_id): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        received.lock().unwrap().push((order_id.clone(), auth, body));
        if order_id == "broken" {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::OK
        }
    }

    async fn serve() -> (String, Received) {
        let received: Received = Arc::default();
        let router = Router::new()
            .route("/orders/{order_id}/deliver", post(deliver_handler))
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/orders/{{order_id}}/deliver", addr), received)
    }

    fn channel(url: String) -> HttpDelivery {
        HttpDelivery::new(&HttpDeliveryConfig {
            url,
            token: "t0ken".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_for_encodes_order_id() {
        let c = channel("https://helper.example/api/orders/{order_id}/deliver".to_string());
        assert_eq!(
            c.url_for("A 1/2"),
            "https://helper.example/api/orders/A%201%2F2/deliver"
        );
    }

    #[tokio::test]
    async fn test_deliver_posts_message_with_token() {
        let (url, received) = serve().await;
        channel(url).deliver("A1", "hello\n1. CODE").await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (order_id, auth, body) = &received[0];
        assert_eq!(order_id, "A1");
        assert_eq!(auth.as_deref(), Some("Bearer t0ken"));
        assert_eq!(body["order_id"], "A1");
        assert_eq!(body["message"], "hello\n1. CODE");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let (url, _received) = serve().await;
        match channel(url).deliver("broken", "msg").await {
            Err(DeliveryError::Status { status, .. }) => assert_eq!(status, 502),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = channel(format!("http://{}/{{order_id}}", addr))
            .deliver("A1", "msg")
            .await;
        assert!(matches!(result, Err(DeliveryError::Request(_))));
    }
}

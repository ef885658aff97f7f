//! Authenticated HTTP order feed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::types::{select_eligible, Eligibility, Order, OrderSourceError, RawOrder};
use super::OrderSource;
use crate::config::RemoteOrderSourceConfig;
use crate::delivery::truncate_body;

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

/// Fetches orders with a bearer-authenticated GET.
///
/// The feed has no acknowledgement endpoint; the helper service tracks
/// delivery state itself once the delivery call succeeds.
pub struct RemoteOrderSource {
    client: Client,
    url: String,
    token: String,
    eligibility: Eligibility,
}

impl RemoteOrderSource {
    pub fn new(config: &RemoteOrderSourceConfig) -> Result<Self, OrderSourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            eligibility: Eligibility::Status(config.pending_status.clone()),
        })
    }
}

#[async_trait]
impl OrderSource for RemoteOrderSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn list_pending(&self) -> Result<Vec<Order>, OrderSourceError> {
        debug!(url = %self.url, "Fetching remote orders");

        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrderSourceError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body: OrdersResponse = response
            .json()
            .await
            .map_err(|e| OrderSourceError::Malformed(format!("order feed response: {}", e)))?;

        Ok(select_eligible(body.orders, &self.eligibility))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/orders", addr)
    }

    fn config(url: String) -> RemoteOrderSourceConfig {
        RemoteOrderSourceConfig {
            url,
            token: "t0ken".to_string(),
            timeout_secs: 5,
            pending_status: "pending".to_string(),
        }
    }

    async fn orders_handler(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer t0ken") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({
            "orders": [
                {"order_id": "R1", "item_title": "GPT Plus", "buyer_nick": "bob", "status": "pending"},
                {"order_id": "R2", "item_title": "GPT Plus", "status": "delivered"},
                {"order_id": 99, "item_title": "Netflix", "quantity": 2, "status": "pending"}
            ]
        })))
    }

    #[tokio::test]
    async fn test_list_pending_filters_by_status() {
        let url = serve(Router::new().route("/orders", get(orders_handler))).await;
        let source = RemoteOrderSource::new(&config(url)).unwrap();

        let orders = source.list_pending().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, "R1");
        assert_eq!(orders[0].buyer_nick, "bob");
        assert_eq!(orders[1].order_id, "99");
        assert_eq!(orders[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_custom_pending_status() {
        let url = serve(Router::new().route("/orders", get(orders_handler))).await;
        let mut config = config(url);
        config.pending_status = "delivered".to_string();
        let source = RemoteOrderSource::new(&config).unwrap();

        let orders = source.list_pending().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, "R2");
    }

    #[tokio::test]
    async fn test_bad_token_is_status_error() {
        let url = serve(Router::new().route("/orders", get(orders_handler))).await;
        let mut config = config(url);
        config.token = "wrong".to_string();
        let source = RemoteOrderSource::new(&config).unwrap();

        match source.list_pending().await {
            Err(OrderSourceError::Status { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_malformed() {
        let router = Router::new().route("/orders", get(|| async { Json(json!({"orders": 5})) }));
        let url = serve(router).await;
        let source = RemoteOrderSource::new(&config(url)).unwrap();

        assert!(matches!(
            source.list_pending().await,
            Err(OrderSourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_acknowledge_is_noop() {
        let source = RemoteOrderSource::new(&config("http://127.0.0.1:9/orders".into())).unwrap();
        assert!(source.acknowledge_delivered("R1").await.is_ok());
    }
}

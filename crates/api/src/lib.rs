//! HTTP and WebSocket surface of the order execution engine
//!
//! | Method | Path                       | Purpose                          |
//! |--------|----------------------------|----------------------------------|
//! | POST   | `/api/orders/execute`      | submit a market order            |
//! | GET    | `/api/orders`              | list orders, newest first        |
//! | GET    | `/api/orders/:order_id`    | fetch one order                  |
//! | GET    | `/api/orders/:order_id/ws` | stream status updates            |
//! | GET    | `/api/health`              | liveness and source health       |
//! | GET    | `/api/queue/metrics`       | job counts by state              |

pub mod error;
pub mod handlers;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use order_engine::Engine;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/queue/metrics", get(handlers::queue_metrics))
        .route("/api/orders/execute", post(handlers::execute_order))
        .route("/api/orders", get(handlers::list_orders))
        .route("/api/orders/:order_id", get(handlers::get_order))
        .route("/api/orders/:order_id/ws", get(websocket::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use order_engine::OrderPayload;
    use order_engine_notify::NotificationHub;
    use order_engine_queue::InMemoryJobQueue;
    use order_engine_router::{MockQuoteSource, QuoteRouter};
    use order_engine_store::InMemoryOrderStore;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    pub(crate) fn test_engine() -> Engine {
        let router = QuoteRouter::new(
            vec![Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)))],
            Duration::from_secs(1),
        );
        Engine::builder()
            .with_store(Arc::new(InMemoryOrderStore::new()))
            .with_queue(Arc::new(InMemoryJobQueue::default()))
            .with_hub(Arc::new(NotificationHub::new()))
            .with_router(Arc::new(router))
            .build()
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_execute_creates_and_queues_order() {
        let engine = Arc::new(test_engine());
        let app = build_router(ApiState::new(engine.clone()));

        let (status, body) = send(
            app,
            post_json(
                "/api/orders/execute",
                r#"{"tokenIn":"SOL","tokenOut":"USDC","amount":1.5}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        let order_id = body["orderId"].as_str().unwrap();
        assert_eq!(body["websocketUrl"], format!("/api/orders/{order_id}/ws"));

        let order = engine.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.amount, dec!(1.5));
        assert_eq!(engine.queue_counts().await.unwrap().waiting, 1);
    }

    #[tokio::test]
    async fn test_execute_rejects_non_positive_amount() {
        let engine = Arc::new(test_engine());
        let app = build_router(ApiState::new(engine.clone()));

        let (status, body) = send(
            app,
            post_json(
                "/api/orders/execute",
                r#"{"tokenIn":"SOL","tokenOut":"USDC","amount":0}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(engine.list_orders(0, 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_execute_rejects_malformed_body() {
        let app = build_router(ApiState::new(Arc::new(test_engine())));
        let (status, _) = send(app, post_json("/api/orders/execute", r#"{"tokenIn":"SOL"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_order_and_missing_order() {
        let engine = Arc::new(test_engine());
        let order = engine
            .submit(OrderPayload::new("SOL", "USDC", dec!(2)))
            .await
            .unwrap();

        let app = build_router(ApiState::new(engine));
        let (status, body) = send(app.clone(), get(&format!("/api/orders/{}", order.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["id"], order.id.as_str());
        assert_eq!(body["order"]["status"], "pending");

        let (status, body) = send(app, get("/api/orders/does-not-exist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_orders_paginates() {
        let engine = Arc::new(test_engine());
        for _ in 0..3 {
            engine
                .submit(OrderPayload::new("SOL", "USDC", dec!(1)))
                .await
                .unwrap();
        }

        let app = build_router(ApiState::new(engine));
        let (status, body) = send(app.clone(), get("/api/orders")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["take"], 20);
        assert_eq!(body["pagination"]["count"], 3);

        let (_, body) = send(app, get("/api/orders?skip=1&take=1")).await;
        assert_eq!(body["orders"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["skip"], 1);
    }

    #[tokio::test]
    async fn test_health_and_queue_metrics() {
        let engine = Arc::new(test_engine());
        engine
            .submit(OrderPayload::new("SOL", "USDC", dec!(1)))
            .await
            .unwrap();

        let app = build_router(ApiState::new(engine));
        let (status, body) = send(app.clone(), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sources"][0]["id"], "meteora");
        assert!(body["workers"].is_null());

        let (status, body) = send(app, get("/api/queue/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"]["waiting"], 1);
    }
}

//! REST handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use order_engine::{current_timestamp_ms, Order, OrderPayload, PoolStats, QueueCounts};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::ApiState;

const DEFAULT_TAKE: usize = 20;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub success: bool,
    pub order_id: String,
    pub message: String,
    pub websocket_url: String,
}

pub async fn execute_order(
    State(state): State<ApiState>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ExecuteResponse>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let order = state.engine.submit(payload).await?;
    info!(order_id = %order.id, "Order submitted over HTTP");

    Ok((
        StatusCode::CREATED,
        Json(ExecuteResponse {
            success: true,
            websocket_url: format!("/api/orders/{}/ws", order.id),
            order_id: order.id,
            message: "Order created successfully. Connect via WebSocket for status updates."
                .to_string(),
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

pub async fn get_order(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .engine
        .get_order(&order_id)
        .await?
        .ok_or(ApiError::NotFound(order_id))?;

    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: usize,
    pub take: usize,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

pub async fn list_orders(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let skip = query.skip.unwrap_or(0);
    let take = query.take.unwrap_or(DEFAULT_TAKE);

    let orders = state.engine.list_orders(skip, take).await?;
    let count = orders.len();

    Ok(Json(OrderListResponse {
        success: true,
        orders,
        pagination: Pagination { skip, take, count },
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceHealth {
    pub id: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
    pub timestamp: u64,
    pub sources: Vec<SourceHealth>,
    pub workers: Option<PoolStats>,
}

pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let sources: Vec<SourceHealth> = state
        .engine
        .source_health()
        .await
        .into_iter()
        .map(|(id, healthy)| SourceHealth { id, healthy })
        .collect();

    let status = if sources.iter().any(|s| s.healthy) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        success: true,
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: current_timestamp_ms(),
        sources,
        workers: state.engine.pool_stats().await,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueMetricsResponse {
    pub success: bool,
    pub counts: QueueCounts,
}

pub async fn queue_metrics(
    State(state): State<ApiState>,
) -> Result<Json<QueueMetricsResponse>, ApiError> {
    let counts = state.engine.queue_counts().await?;
    Ok(Json(QueueMetricsResponse {
        success: true,
        counts,
    }))
}

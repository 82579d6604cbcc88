//! Per-order WebSocket status stream

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use order_engine::{current_timestamp_ms, Engine, Order};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ApiState;

/// Messages the server sends before forwarding order events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Connected {
        #[serde(rename = "orderId")]
        order_id: String,
        message: String,
        timestamp: u64,
    },

    /// Persisted state at subscribe time
    Snapshot { order: Order },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(order_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, order_id))
}

/// Greeting plus a snapshot of the order, if it exists
pub async fn opening_messages(engine: &Engine, order_id: &str) -> Vec<StreamMessage> {
    let mut messages = vec![StreamMessage::Connected {
        order_id: order_id.to_string(),
        message: "WebSocket connection established".to_string(),
        timestamp: current_timestamp_ms(),
    }];

    match engine.get_order(order_id).await {
        Ok(Some(order)) => messages.push(StreamMessage::Snapshot { order }),
        Ok(None) => debug!(order_id = %order_id, "Subscribed to unknown order"),
        Err(e) => warn!(order_id = %order_id, error = %e, "Failed to load order snapshot"),
    }

    messages
}

async fn handle_socket(socket: WebSocket, state: ApiState, order_id: String) {
    let (mut sender, mut receiver) = socket.split();
    info!(order_id = %order_id, "WebSocket client connected");

    // register before reading the snapshot so no transition falls in between
    let (subscription, mut events) = state.engine.subscribe(&order_id).await;

    let opening = opening_messages(&state.engine, &order_id).await;
    let send_order_id = order_id.clone();
    let send_task = tokio::spawn(async move {
        for message in opening {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize stream message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }

        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize order event");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
            debug!(order_id = %send_order_id, status = %event.status, "Sent order update");
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(order_id = %order_id, message = %text, "Ignoring client message");
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.engine.release_subscription(&order_id, subscription).await;
    info!(order_id = %order_id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_engine;
    use order_engine::OrderPayload;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_opening_messages_include_snapshot() {
        let engine = test_engine();
        let order = engine
            .submit(OrderPayload::new("SOL", "USDC", dec!(5)))
            .await
            .unwrap();

        let messages = opening_messages(&engine, &order.id).await;
        assert_eq!(messages.len(), 2);

        let connected = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["orderId"], order.id.as_str());

        let snapshot = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["order"]["status"], "pending");
    }

    #[tokio::test]
    async fn test_unknown_order_gets_greeting_only() {
        let engine = test_engine();
        let messages = opening_messages(&engine, "missing").await;
        assert_eq!(messages.len(), 1);
    }
}

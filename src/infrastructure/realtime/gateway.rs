use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;

use crate::application::services::ChatServices;
use crate::domain::entities::{TenantChatConfig, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::ChatEvent;
use crate::domain::ports::connection_registry::ConnectionId;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::realtime::handler::ConnectionHandler;
use crate::shared::metrics::{CONNECTIONS_ACTIVE, CONNECTIONS_REJECTED};

/// `GET /chat/:namespace`. The tenant is checked after the upgrade so a
/// rejected client still receives an `error` frame before the close.
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(namespace): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, namespace, state))
}

/// Tenant router: the namespace must be `tenant-<id>` for an active tenant.
/// Runs once per connection.
#[tracing::instrument(skip(services))]
pub async fn admit(services: &ChatServices, namespace: &str) -> ChatResult<TenantChatConfig> {
    let tenant_id = TenantId::from_namespace(namespace)?;
    services.tenants.load_active_config(tenant_id).await
}

async fn handle_socket(socket: WebSocket, namespace: String, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let config = match admit(&state.services, &namespace).await {
        Ok(config) => config,
        Err(err) => {
            counter!(CONNECTIONS_REJECTED, "reason" => err.code()).increment(1);
            tracing::warn!("Rejected connection on '{}': {}", namespace, err);

            if let Ok(frame) = serde_json::to_string(&ChatEvent::error(&err)) {
                let _ = ws_sender.send(WsMessage::Text(frame)).await;
            }
            let _ = ws_sender.send(WsMessage::Close(None)).await;
            return;
        }
    };

    let connection_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<ChatEvent>(state.channel_capacity);

    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
    tracing::info!(
        "Connection {} admitted for tenant {}",
        connection_id,
        config.tenant_id
    );

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut handler = ConnectionHandler::new(connection_id, config, tx, state.services.clone());

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => handler.handle_frame(&text).await,
            Ok(WsMessage::Binary(_)) => {
                handler
                    .reject("frame", &ChatError::validation("Binary frames are not supported"))
                    .await
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {} // ping/pong answered by the websocket layer
            Err(e) => {
                tracing::debug!("Connection {} read error: {}", connection_id, e);
                break;
            }
        }
    }

    handler.disconnect().await;
    sender_task.abort();
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

//! Session pipeline: WebSocket server and per-connection reader/writer loops.

use crate::broker::Broker;
use crate::client::ActiveClient;
use crate::handlers::Handlers;
use crate::protocol::Request;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub broker: Broker,
    pub handlers: Arc<Handlers>,
}

/// Create the WebSocket router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    format!(
        r#"{{"status":"ok","clients":{}}}"#,
        state.broker.stats().active_clients()
    )
}

#[derive(Deserialize)]
struct ConnectParams {
    /// Session identifier, trusted as given. Stable across reconnects when
    /// the client carries it; a fresh one is minted when absent.
    session: Option<String>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = params
        .session
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
}

/// Run one connection: register, seed, then pump the reader and writer
/// loops until the transport fails or closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client, mut rx) = ActiveClient::new(session);
    let request_id = client.request_id;

    state.broker.register(client.clone()).await;
    counter!("gateway_connections_total").increment(1);
    info!("client {} connected for session {}", request_id, client.session);

    // Writer loop: drain the outbound queue onto the transport. A failed
    // write means the connection is dead.
    let stats = state.broker.stats().clone();
    let send_task = tokio::spawn(async move {
        while let Some(push) = rx.recv().await {
            let json = match serde_json::to_string(push.as_ref()) {
                Ok(json) => json,
                Err(e) => {
                    warn!("{} failed to encode push: {}", request_id, e);
                    continue;
                }
            };
            let len = json.len();
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            stats.record_send(len);
            counter!("gateway_messages_sent_total").increment(1);
            counter!("gateway_bytes_sent_total").increment(len as u64);
        }
    });

    // Seed the new connection with the current state.
    let seed_handlers = state.handlers.clone();
    let seed_client = client.clone();
    tokio::spawn(async move {
        seed_handlers.handle_connect(seed_client).await;
    });

    // Reader loop. Malformed frames are tolerated; only transport failure
    // or a close frame ends the connection.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<Request>(&text) {
                Ok(req) => state.handlers.dispatch(req, client.clone()),
                Err(e) => warn!("{} malformed request: {}", request_id, e),
            },
            Ok(Message::Binary(data)) => match serde_json::from_slice::<Request>(&data) {
                Ok(req) => state.handlers.dispatch(req, client.clone()),
                Err(e) => warn!("{} malformed request: {}", request_id, e),
            },
            Ok(Message::Close(_)) => break,
            // Transport-level ping/pong is answered by the socket layer.
            Ok(_) => {}
            Err(e) => {
                warn!("{} read error: {}", request_id, e);
                break;
            }
        }
    }

    // Teardown: the reader loop exit is the sole trigger.
    state.broker.deregister(client).await;
    send_task.abort();
    counter!("gateway_disconnections_total").increment(1);
    info!("client {} disconnected", request_id);
}

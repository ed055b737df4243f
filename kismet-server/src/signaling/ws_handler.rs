use crate::AppState;
use crate::registry::RegistryCommand;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use kismet_core::{ClientEnvelope, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session = SessionId::new();
    info!("New WebSocket connection: {session}");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Register the outbound handle before announcing the session so the
    // `connected` envelope has somewhere to go.
    state.signaling.add_peer(session, tx);
    if state
        .registry_tx
        .send(RegistryCommand::Connect { session })
        .await
        .is_err()
    {
        state.signaling.remove_peer(&session);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEnvelope>(&text) {
                        Ok(envelope) => {
                            let cmd = RegistryCommand::Inbound { session, envelope };
                            if state.registry_tx.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        // Protocol error: log and discard the single
                        // envelope, keep the connection.
                        Err(e) => warn!("Invalid envelope from {session}: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Whichever half went down first, the close is reported exactly once.
    let _ = state
        .registry_tx
        .send(RegistryCommand::Disconnect { session })
        .await;

    state.signaling.remove_peer(&session);
    info!("WebSocket disconnected: {session}");
}

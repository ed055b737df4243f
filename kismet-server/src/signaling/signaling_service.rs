use crate::signaling::ClientSink;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use kismet_core::{ServerEnvelope, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

struct SignalingInner {
    peers: DashMap<SessionId, mpsc::UnboundedSender<Message>>,
}

/// Sender table for all open WebSocket connections, keyed by session id.
/// The only piece of shared mutable state outside the registry actor;
/// it holds transport handles, never matchmaking state.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
            }),
        }
    }

    pub fn add_peer(&self, session: SessionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.peers.insert(session, tx);
    }

    pub fn remove_peer(&self, session: &SessionId) {
        self.inner.peers.remove(session);
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    fn send_envelope(&self, session: SessionId, envelope: &ServerEnvelope) {
        let Some(peer) = self.inner.peers.get(&session) else {
            // Already gone: expected under disconnect races.
            debug!("Dropping envelope for disconnected session {session}");
            return;
        };
        match serde_json::to_string(envelope) {
            Ok(json) => {
                if peer.send(Message::Text(json.into())).is_err() {
                    debug!("WS send channel closed for {session}");
                }
            }
            Err(e) => error!("Failed to serialize envelope: {e}"),
        }
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientSink for SignalingService {
    async fn send(&self, session: SessionId, envelope: ServerEnvelope) {
        self.send_envelope(session, &envelope);
    }

    async fn broadcast(&self, envelope: ServerEnvelope) {
        let sessions: Vec<SessionId> = self.inner.peers.iter().map(|e| *e.key()).collect();
        for session in sessions {
            self.send_envelope(session, &envelope);
        }
    }
}

use async_trait::async_trait;
use kismet_core::{ServerEnvelope, SessionId};

/// Outbound delivery seam between the registry actor and the transport
/// layer. The production implementation writes to WebSocket senders;
/// tests substitute a capture mock.
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Deliver an envelope to one session. Delivery to a session that
    /// has already vanished is a benign race and is not an error.
    async fn send(&self, session: SessionId, envelope: ServerEnvelope);

    /// Deliver an envelope to every connected session.
    async fn broadcast(&self, envelope: ServerEnvelope);
}

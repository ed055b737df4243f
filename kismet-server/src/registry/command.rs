use crate::registry::RegistryStats;
use kismet_core::{ClientEnvelope, SessionId};
use tokio::sync::oneshot;

/// Commands feeding the registry actor. Everything that can touch
/// sessions, the waiting pool or the room table arrives here, so the
/// actor's one-at-a-time processing is the only serialization needed.
#[derive(Debug)]
pub enum RegistryCommand {
    /// A transport connection opened and was assigned this session id.
    Connect { session: SessionId },

    /// A decoded envelope from a connected client.
    Inbound {
        session: SessionId,
        envelope: ClientEnvelope,
    },

    /// The transport connection closed, cleanly or not.
    Disconnect { session: SessionId },

    /// Read-only counters for the health endpoint.
    Stats {
        reply: oneshot::Sender<RegistryStats>,
    },
}

use crate::registry::command::RegistryCommand;
use crate::registry::registry::{Registry, SearchOutcome};
use crate::signaling::ClientSink;
use kismet_core::{ChatMode, ClientEnvelope, PairRole, ServerEnvelope, SessionId};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The registry actor: owns the [`Registry`] and routes every inbound
/// envelope, either into a matchmaking operation or as a relay to the
/// sender's room partner. Runs until the command channel closes.
pub struct Dispatcher {
    registry: Registry,
    command_rx: mpsc::Receiver<RegistryCommand>,
    sink: Arc<dyn ClientSink>,
}

impl Dispatcher {
    pub fn new(command_rx: mpsc::Receiver<RegistryCommand>, sink: Arc<dyn ClientSink>) -> Self {
        Self {
            registry: Registry::new(),
            command_rx,
            sink,
        }
    }

    pub async fn run(mut self) {
        info!("Registry dispatcher started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Registry dispatcher finished");
    }

    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Connect { session } => {
                info!("Session connected: {session}");
                self.registry.connect(session);
                self.sink
                    .send(session, ServerEnvelope::Connected { session_id: session })
                    .await;
                self.broadcast_user_count().await;
            }

            RegistryCommand::Inbound { session, envelope } => {
                self.handle_envelope(session, envelope).await;
            }

            RegistryCommand::Disconnect { session } => {
                info!("Session disconnected: {session}");
                if let Some(partner) = self.registry.disconnect(session) {
                    self.sink
                        .send(partner, ServerEnvelope::PeerDisconnected {})
                        .await;
                }
                self.broadcast_user_count().await;
            }

            RegistryCommand::Stats { reply } => {
                let _ = reply.send(self.registry.stats());
            }
        }
    }

    async fn handle_envelope(&mut self, session: SessionId, envelope: ClientEnvelope) {
        match envelope {
            ClientEnvelope::BeginSearch { mode, interests } => {
                self.begin_search(session, mode, interests).await;
            }

            // Negotiation payloads are opaque: relay verbatim to the
            // room partner, re-tagged as the server-side variant.
            ClientEnvelope::Offer { description } => {
                self.relay(session, ServerEnvelope::Offer { description })
                    .await;
            }
            ClientEnvelope::Answer { description } => {
                self.relay(session, ServerEnvelope::Answer { description })
                    .await;
            }
            ClientEnvelope::IceCandidate { candidate } => {
                self.relay(session, ServerEnvelope::IceCandidate { candidate })
                    .await;
            }

            ClientEnvelope::ChatMessage { text } => {
                self.relay(
                    session,
                    ServerEnvelope::ChatMessage {
                        text,
                        timestamp: unix_millis(),
                    },
                )
                .await;
            }

            ClientEnvelope::Skip {} => {
                self.teardown_room(session).await;
                if let Some((mode, interests)) = self.registry.last_search(session) {
                    self.begin_search(session, mode, interests).await;
                }
            }

            ClientEnvelope::Stop {} => {
                self.teardown_room(session).await;
            }
        }
    }

    async fn begin_search(&mut self, session: SessionId, mode: ChatMode, interests: Vec<String>) {
        // A client that searches while still roomed implicitly abandons
        // the room, exactly as a skip would.
        self.teardown_room(session).await;

        match self.registry.begin_search(session, mode, interests) {
            Ok(SearchOutcome::Matched {
                room_id,
                caller,
                callee,
            }) => {
                info!("Matched {caller} (caller) with {callee} (callee) in room {room_id}");
                self.sink
                    .send(
                        caller,
                        ServerEnvelope::MatchFound {
                            room_id,
                            partner_id: callee,
                            role: PairRole::Caller,
                        },
                    )
                    .await;
                self.sink
                    .send(
                        callee,
                        ServerEnvelope::MatchFound {
                            room_id,
                            partner_id: caller,
                            role: PairRole::Callee,
                        },
                    )
                    .await;
            }
            Ok(SearchOutcome::Enqueued) => {
                debug!("Session {session} enqueued, pool size {}", self.registry.stats().waiting);
                self.sink.send(session, ServerEnvelope::Searching {}).await;
            }
            Err(e) => warn!("begin_search rejected: {e}"),
        }
    }

    async fn teardown_room(&mut self, session: SessionId) {
        if let Some((room_id, partner)) = self.registry.leave_room(session) {
            info!("Session {session} left room {room_id}");
            self.sink
                .send(partner, ServerEnvelope::PeerDisconnected {})
                .await;
        }
    }

    /// Relay to the sender's room partner. A sender with no partner is a
    /// benign race (the partner vanished mid-flight); the envelope is
    /// dropped without complaint.
    async fn relay(&self, from: SessionId, envelope: ServerEnvelope) {
        match self.registry.partner_of(from) {
            Some(partner) => self.sink.send(partner, envelope).await,
            None => debug!("Dropping relay from {from}: no partner"),
        }
    }

    async fn broadcast_user_count(&self) {
        let count = self.registry.stats().sessions;
        self.sink
            .broadcast(ServerEnvelope::UserCount { count })
            .await;
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

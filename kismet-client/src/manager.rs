use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::event::{ClientEvent, ConnectionState};
use crate::media::{MediaError, MediaEvent, MediaFactory, RtcMediaFactory};
use crate::negotiation::Negotiation;
use futures::{SinkExt, StreamExt};
use kismet_core::{ChatMode, ClientEnvelope, PairRole, RoomId, ServerEnvelope, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use url::Url;

enum Command {
    Connect {
        ack: oneshot::Sender<Result<(), ClientError>>,
    },
    BeginSearch {
        mode: ChatMode,
        interests: Vec<String>,
    },
    SendText {
        text: String,
    },
    Skip,
    Stop,
}

enum Inbound {
    Envelope(ServerEnvelope),
    Closed,
}

struct ActiveRoom {
    room_id: RoomId,
    /// Tag on media events so callbacks from an already-closed room are
    /// ignored instead of leaking into the next one.
    epoch: u64,
    negotiation: Negotiation,
}

/// Handle to the connection manager task. Cheap to clone; all methods
/// enqueue commands for the actor.
#[derive(Clone)]
pub struct ChatClient {
    cmd_tx: mpsc::Sender<Command>,
}

impl ChatClient {
    /// Spawn a manager using real peer connections.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let factory = Arc::new(RtcMediaFactory::new(config.ice_servers.clone()));
        Self::with_media_factory(config, factory)
    }

    /// Spawn a manager with a custom media stack (tests use a scripted
    /// one).
    pub fn with_media_factory(
        config: ClientConfig,
        media_factory: Arc<dyn MediaFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let manager = ConnectionManager::new(config, media_factory, cmd_rx, event_tx);
        tokio::spawn(manager.run());

        (Self { cmd_tx }, event_rx)
    }

    /// Open the signaling transport. Idempotent: if the connection is
    /// already open this resolves immediately without opening a second
    /// transport.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { ack: ack_tx })
            .await
            .map_err(|_| ClientError::ManagerGone)?;
        ack_rx.await.map_err(|_| ClientError::ManagerGone)?
    }

    pub async fn begin_search(
        &self,
        mode: ChatMode,
        interests: Vec<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::BeginSearch { mode, interests }).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::SendText { text: text.into() }).await
    }

    /// Leave the current room and immediately search again.
    pub async fn skip(&self) -> Result<(), ClientError> {
        self.send(Command::Skip).await
    }

    /// Leave the current room and stay out of the pool.
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.send(Command::Stop).await
    }

    async fn send(&self, cmd: Command) -> Result<(), ClientError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::ManagerGone)
    }
}

/// Owns the signaling transport, the reconnect policy and the per-room
/// negotiation engine. Runs as a single task; every mutation goes
/// through its command/inbound/media channels.
struct ConnectionManager {
    config: ClientConfig,
    media_factory: Arc<dyn MediaFactory>,
    cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,

    state: ConnectionState,
    session_id: Option<SessionId>,

    ws_tx: Option<mpsc::UnboundedSender<WsMessage>>,
    inbound_tx: mpsc::UnboundedSender<(u64, Inbound)>,
    inbound_rx: mpsc::UnboundedReceiver<(u64, Inbound)>,
    /// Bumped per transport connection; pump tasks from a dead
    /// connection tag their traffic with a stale epoch.
    connection_epoch: u64,
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,

    media_tx: mpsc::Sender<(u64, MediaEvent)>,
    media_rx: mpsc::Receiver<(u64, MediaEvent)>,
    room_epoch: u64,
    room: Option<ActiveRoom>,
}

impl ConnectionManager {
    fn new(
        config: ClientConfig,
        media_factory: Arc<dyn MediaFactory>,
        cmd_rx: mpsc::Receiver<Command>,
        event_tx: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::channel(64);

        Self {
            config,
            media_factory,
            cmd_rx,
            event_tx,
            state: ConnectionState::Idle,
            session_id: None,
            ws_tx: None,
            inbound_tx,
            inbound_rx,
            connection_epoch: 0,
            reconnect_attempts: 0,
            reconnect_at: None,
            media_tx,
            media_rx,
            room_epoch: 0,
            room: None,
        }
    }

    async fn run(mut self) {
        info!("Connection manager started");

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }

                Some((epoch, inbound)) = self.inbound_rx.recv() => {
                    self.handle_inbound(epoch, inbound).await;
                }

                Some((epoch, event)) = self.media_rx.recv() => {
                    self.handle_media(epoch, event).await;
                }

                _ = Self::reconnect_timer(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.try_reconnect().await;
                }
            }
        }

        self.close_room(false).await;
        info!("Connection manager finished");
    }

    async fn reconnect_timer(at: Option<Instant>) {
        match at {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { ack } => {
                if self.ws_tx.is_some() {
                    let _ = ack.send(Ok(()));
                    return;
                }
                match self.open_transport().await {
                    Ok(()) => {
                        self.reconnect_attempts = 0;
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        self.schedule_reconnect();
                        let _ = ack.send(Err(e));
                    }
                }
            }

            Command::BeginSearch { mode, interests } => {
                // A search that never reaches the server must not look
                // like one that did.
                if self.ws_tx.is_none() {
                    warn!("Search requested while disconnected");
                    self.emit(ClientEvent::Error(ClientError::NotConnected));
                    return;
                }
                self.send_envelope(&ClientEnvelope::BeginSearch { mode, interests });
                self.set_state(ConnectionState::Searching);
            }

            Command::SendText { text } => {
                self.send_envelope(&ClientEnvelope::ChatMessage { text });
            }

            // Both teardown paths force-close local negotiation state in
            // parallel with the server-side teardown, so stale
            // candidates cannot leak into the next room.
            Command::Skip => {
                self.send_envelope(&ClientEnvelope::Skip {});
                self.close_room(false).await;
                self.set_state(ConnectionState::Disconnected);
            }
            Command::Stop => {
                self.send_envelope(&ClientEnvelope::Stop {});
                self.close_room(false).await;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    async fn handle_inbound(&mut self, epoch: u64, inbound: Inbound) {
        if epoch != self.connection_epoch {
            debug!("Dropping traffic from stale connection");
            return;
        }

        match inbound {
            Inbound::Closed => {
                warn!("Signaling connection lost (session {:?})", self.session_id);
                self.ws_tx = None;
                self.close_room(true).await;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
            Inbound::Envelope(envelope) => self.handle_envelope(envelope).await,
        }
    }

    async fn handle_envelope(&mut self, envelope: ServerEnvelope) {
        match envelope {
            ServerEnvelope::Connected { session_id } => {
                info!("Assigned session id {session_id}");
                self.session_id = Some(session_id);
            }

            ServerEnvelope::UserCount { count } => {
                self.emit(ClientEvent::UserCount { count });
            }

            ServerEnvelope::Searching {} => {
                self.set_state(ConnectionState::Searching);
            }

            ServerEnvelope::MatchFound {
                room_id,
                partner_id,
                role,
            } => {
                self.start_room(room_id, partner_id, role).await;
            }

            ServerEnvelope::Offer { description } => {
                let result = match self.room.as_mut() {
                    Some(room) => room.negotiation.handle_offer(description).await,
                    None => {
                        debug!("Ignoring offer outside a room");
                        return;
                    }
                };
                match result {
                    Ok(Some(answer)) => {
                        self.send_envelope(&ClientEnvelope::Answer {
                            description: answer,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => self.fail_negotiation(e).await,
                }
            }

            ServerEnvelope::Answer { description } => {
                let result = match self.room.as_mut() {
                    Some(room) => room.negotiation.handle_answer(description).await,
                    None => {
                        debug!("Ignoring answer outside a room");
                        return;
                    }
                };
                if let Err(e) = result {
                    self.fail_negotiation(e).await;
                }
            }

            ServerEnvelope::IceCandidate { candidate } => {
                let result = match self.room.as_mut() {
                    Some(room) => room.negotiation.handle_candidate(candidate).await,
                    None => {
                        debug!("Ignoring candidate outside a room");
                        return;
                    }
                };
                if let Err(e) = result {
                    self.fail_negotiation(e).await;
                }
            }

            ServerEnvelope::ChatMessage { text, timestamp } => {
                self.emit(ClientEvent::MessageReceived { text, timestamp });
            }

            ServerEnvelope::PeerDisconnected {} => {
                self.close_room(true).await;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    async fn start_room(&mut self, room_id: RoomId, partner_id: SessionId, role: PairRole) {
        // A match while a room is still around means the old one is
        // stale; drop it quietly.
        self.close_room(false).await;

        self.room_epoch += 1;
        let epoch = self.room_epoch;

        // Media callbacks outlive rooms; tag them so stale ones are
        // recognizable.
        let (raw_tx, mut raw_rx) = mpsc::channel(64);
        let media_tx = self.media_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                if media_tx.send((epoch, event)).await.is_err() {
                    break;
                }
            }
        });

        let media = match self.media_factory.create(raw_tx).await {
            Ok(media) => media,
            Err(e) => {
                error!("Failed to create media session: {e}");
                self.fail_negotiation(e).await;
                return;
            }
        };

        info!("Matched into room {room_id} as {role:?}");
        self.emit(ClientEvent::MatchFound {
            room_id,
            partner_id,
            role,
        });
        self.set_state(ConnectionState::Connecting);

        let mut negotiation = Negotiation::new(role, media);
        match negotiation.start().await {
            Ok(offer) => {
                if let Some(description) = offer {
                    self.send_envelope(&ClientEnvelope::Offer { description });
                }
                self.room = Some(ActiveRoom {
                    room_id,
                    epoch,
                    negotiation,
                });
            }
            Err(e) => {
                negotiation.close().await;
                self.fail_negotiation(e).await;
            }
        }
    }

    async fn handle_media(&mut self, epoch: u64, event: MediaEvent) {
        let current = self.room.as_ref().is_some_and(|room| room.epoch == epoch);
        if !current {
            debug!("Dropping media event from a stale room");
            return;
        }

        match event {
            MediaEvent::LocalCandidate(candidate) => {
                self.send_envelope(&ClientEnvelope::IceCandidate { candidate });
            }
            MediaEvent::ChannelConnected => {
                if let Some(room) = self.room.as_mut() {
                    room.negotiation.mark_connected();
                }
                self.set_state(ConnectionState::Connected);
            }
            MediaEvent::ChannelClosed => {
                self.close_room(true).await;
                self.set_state(ConnectionState::Disconnected);
            }
            MediaEvent::RemoteTrack(track) => {
                self.emit(ClientEvent::RemoteTrack(track));
            }
        }
    }

    async fn open_transport(&mut self) -> Result<(), ClientError> {
        let url = Url::parse(&self.config.server_url)?;
        info!("Connecting to signaling server: {url}");

        let (socket, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = socket.split();

        self.connection_epoch += 1;
        let epoch = self.connection_epoch;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let inbound_tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ServerEnvelope>(&text) {
                            Ok(envelope) => {
                                if inbound_tx.send((epoch, Inbound::Envelope(envelope))).is_err() {
                                    break;
                                }
                            }
                            // Malformed envelope: discard it, keep the
                            // connection.
                            Err(e) => warn!("Invalid envelope from server: {e}"),
                        }
                    }
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = inbound_tx.send((epoch, Inbound::Closed));
        });

        self.ws_tx = Some(out_tx);
        info!("Connected to signaling server");
        Ok(())
    }

    fn schedule_reconnect(&mut self) {
        if self.state == ConnectionState::Error {
            return;
        }

        let policy = self.config.reconnect;
        if self.reconnect_attempts >= policy.max_attempts {
            error!(
                "Giving up after {} reconnect attempts",
                policy.max_attempts
            );
            self.emit(ClientEvent::Error(ClientError::ReconnectExhausted {
                attempts: policy.max_attempts,
            }));
            self.set_state(ConnectionState::Error);
            return;
        }

        let delay = policy.delay_for(self.reconnect_attempts);
        self.reconnect_attempts += 1;
        warn!(
            "Reconnecting in {delay:?} (attempt {}/{})",
            self.reconnect_attempts, policy.max_attempts
        );
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn try_reconnect(&mut self) {
        match self.open_transport().await {
            Ok(()) => {
                self.reconnect_attempts = 0;
                self.set_state(ConnectionState::Idle);
            }
            Err(e) => {
                warn!("Reconnect attempt failed: {e}");
                self.schedule_reconnect();
            }
        }
    }

    /// Negotiation failed: tear the room down, have the server notify
    /// the partner, surface the fault and return to a resting state.
    async fn fail_negotiation(&mut self, error: MediaError) {
        warn!("Negotiation failed: {error}");
        self.close_room(false).await;
        self.send_envelope(&ClientEnvelope::Stop {});
        self.emit(ClientEvent::Error(error.into()));
        self.set_state(ConnectionState::Disconnected);
    }

    async fn close_room(&mut self, peer_gone: bool) {
        if let Some(mut room) = self.room.take() {
            debug!("Closing room {}", room.room_id);
            room.negotiation.close().await;
            if peer_gone {
                self.emit(ClientEvent::PeerDisconnected);
            }
        }
    }

    fn send_envelope(&self, envelope: &ClientEnvelope) {
        let Some(tx) = &self.ws_tx else {
            warn!("Not connected, dropping outbound envelope");
            return;
        };
        match serde_json::to_string(envelope) {
            Ok(json) => {
                if tx.send(WsMessage::Text(json.into())).is_err() {
                    warn!("Transport writer is gone");
                }
            }
            Err(e) => error!("Failed to serialize envelope: {e}"),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.emit(ClientEvent::StateChange(state));
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}

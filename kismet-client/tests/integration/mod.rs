
use crate::utils::ScriptedMediaFactory;
use kismet_client::{ChatClient, ClientConfig, ClientEvent, ConnectionState};
use kismet_core::{ChatMode, PairRole, RoomId, SessionId};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Run a real signaling server on an ephemeral port.
pub async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = kismet_server::serve(listener).await;
    });
    addr
}

/// One connected participant: a client handle, its event stream and the
/// call log of its scripted media stack.
pub struct TestClient {
    pub tag: &'static str,
    pub client: ChatClient,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    media_log: Arc<Mutex<Vec<String>>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, tag: &'static str) -> Self {
        let factory = ScriptedMediaFactory::new(tag);
        let media_log = factory.log();
        let config = ClientConfig {
            server_url: format!("ws://{addr}/ws"),
            ..ClientConfig::default()
        };

        let (client, events) = ChatClient::with_media_factory(config, Arc::new(factory));
        client.connect().await.expect("connect");

        Self {
            tag,
            client,
            events,
            media_log,
        }
    }

    pub async fn search(&self, mode: ChatMode) {
        self.client
            .begin_search(mode, Vec::new())
            .await
            .expect("begin_search");
    }

    pub async fn next_event(&mut self) -> ClientEvent {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for a client event")
            .expect("event channel closed")
    }

    /// Consume events until one matches the predicate.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
    }

    pub async fn wait_match(&mut self) -> (RoomId, SessionId, PairRole) {
        let event = self
            .wait_for(|e| matches!(e, ClientEvent::MatchFound { .. }))
            .await;
        match event {
            ClientEvent::MatchFound {
                room_id,
                partner_id,
                role,
            } => (room_id, partner_id, role),
            _ => unreachable!(),
        }
    }

    pub async fn wait_state(&mut self, want: ConnectionState) {
        self.wait_for(|e| matches!(e, ClientEvent::StateChange(s) if *s == want))
            .await;
    }

    pub fn media_calls(&self) -> Vec<String> {
        self.media_log.lock().unwrap().clone()
    }
}

/// Connect two participants, put both in the video pool and wait for
/// the match. Returned as (caller, callee).
pub async fn matched_pair(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut a = TestClient::connect(addr, "a").await;
    let mut b = TestClient::connect(addr, "b").await;

    a.search(ChatMode::Video).await;
    b.search(ChatMode::Video).await;

    let (room_a, _, role_a) = a.wait_match().await;
    let (room_b, _, role_b) = b.wait_match().await;
    assert_eq!(room_a, room_b);
    assert_ne!(role_a, role_b);

    if role_a == PairRole::Caller { (a, b) } else { (b, a) }
}

/// Give in-flight traffic time to settle.
pub async fn quiesce() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

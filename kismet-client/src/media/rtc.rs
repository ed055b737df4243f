use crate::media::{MediaError, MediaEvent, MediaFactory, MediaSession};
use async_trait::async_trait;
use kismet_core::IceServerConfig;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_local::TrackLocal;

/// Media session backed by a real `RTCPeerConnection`. One instance per
/// room; callbacks feed the given event channel for the lifetime of the
/// connection.
pub struct RtcMediaSession {
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcMediaSession {
    pub async fn new(
        ice_servers: &[IceServerConfig],
        local_tracks: &[Arc<dyn TrackLocal + Send + Sync>],
        event_tx: mpsc::Sender<MediaEvent>,
    ) -> Result<Self, MediaError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Connection state drives the negotiating -> connected and
        // connected -> closed transitions.
        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state: {state:?}");
                    match state {
                        RTCPeerConnectionState::Connected => {
                            let _ = tx.send(MediaEvent::ChannelConnected).await;
                        }
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(MediaEvent::ChannelClosed).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        // Trickle ICE: every locally discovered candidate goes straight
        // to the peer, in wire form.
        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                debug!("Local candidate discovered");
                let _ = tx.send(MediaEvent::LocalCandidate(value)).await;
            })
        }));

        let track_tx = event_tx.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            Box::pin(async move {
                debug!("Remote track: {}", track.id());
                let _ = tx.send(MediaEvent::RemoteTrack(track)).await;
            })
        }));

        for track in local_tracks {
            peer_connection.add_track(Arc::clone(track)).await?;
        }

        Ok(Self { peer_connection })
    }
}

#[async_trait]
impl MediaSession for RtcMediaSession {
    async fn create_offer(&mut self) -> Result<Value, MediaError> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(serde_json::to_value(&offer)?)
    }

    async fn accept_offer(&mut self, offer: Value) -> Result<Value, MediaError> {
        let offer: RTCSessionDescription = serde_json::from_value(offer)?;
        self.peer_connection.set_remote_description(offer).await?;

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(serde_json::to_value(&answer)?)
    }

    async fn accept_answer(&mut self, answer: Value) -> Result<(), MediaError> {
        let answer: RTCSessionDescription = serde_json::from_value(answer)?;
        self.peer_connection.set_remote_description(answer).await?;
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: Value) -> Result<(), MediaError> {
        let init: RTCIceCandidateInit = serde_json::from_value(candidate)?;
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.peer_connection.close().await {
            debug!("Error closing peer connection: {e}");
        }
    }
}

/// Default factory: a fresh `RTCPeerConnection` per room, sharing the
/// configured ICE servers and any registered local tracks.
pub struct RtcMediaFactory {
    ice_servers: Vec<IceServerConfig>,
    local_tracks: Mutex<Vec<Arc<dyn TrackLocal + Send + Sync>>>,
}

impl RtcMediaFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            ice_servers,
            local_tracks: Mutex::new(Vec::new()),
        }
    }

    /// Register a local media track; it is attached to every session
    /// created afterwards.
    pub fn add_local_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) {
        if let Ok(mut tracks) = self.local_tracks.lock() {
            tracks.push(track);
        }
    }
}

#[async_trait]
impl MediaFactory for RtcMediaFactory {
    async fn create(
        &self,
        events: mpsc::Sender<MediaEvent>,
    ) -> Result<Box<dyn MediaSession>, MediaError> {
        let tracks = self
            .local_tracks
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default();
        let session = RtcMediaSession::new(&self.ice_servers, &tracks, events).await?;
        Ok(Box::new(session))
    }
}

mod rtc;

pub use rtc::{RtcMediaFactory, RtcMediaSession};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("webrtc failure: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("malformed description or candidate: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Events pushed out of a media session while negotiation runs.
pub enum MediaEvent {
    /// A locally discovered network candidate, ready to trickle to the
    /// peer. Payload is already in wire form.
    LocalCandidate(Value),
    /// The peer channel reached end-to-end connected status.
    ChannelConnected,
    /// The peer channel failed, closed or lost its peer.
    ChannelClosed,
    /// Remote media arrived on the channel.
    RemoteTrack(Arc<TrackRemote>),
}

// Tracks do not implement Debug, so spell the variants out by hand.
impl std::fmt::Debug for MediaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalCandidate(candidate) => {
                f.debug_tuple("LocalCandidate").field(candidate).finish()
            }
            Self::ChannelConnected => write!(f, "ChannelConnected"),
            Self::ChannelClosed => write!(f, "ChannelClosed"),
            Self::RemoteTrack(track) => f.debug_tuple("RemoteTrack").field(&track.id()).finish(),
        }
    }
}

/// Seam between the negotiation engine and the actual peer connection.
/// Descriptions and candidates cross it as opaque wire-form JSON so the
/// engine stays testable against a scripted implementation.
#[async_trait]
pub trait MediaSession: Send {
    /// Build a local offer, install it as the local description and
    /// return its wire form.
    async fn create_offer(&mut self) -> Result<Value, MediaError>;

    /// Apply a remote offer, build an answer, install it locally and
    /// return its wire form.
    async fn accept_offer(&mut self, offer: Value) -> Result<Value, MediaError>;

    /// Apply a remote answer.
    async fn accept_answer(&mut self, answer: Value) -> Result<(), MediaError>;

    /// Apply one remote network candidate. The remote description is
    /// guaranteed to be set before this is called.
    async fn add_remote_candidate(&mut self, candidate: Value) -> Result<(), MediaError>;

    async fn close(&mut self);
}

/// Builds one media session per room. The factory shape keeps the
/// manager independent of the concrete peer-connection stack.
#[async_trait]
pub trait MediaFactory: Send + Sync {
    async fn create(
        &self,
        events: mpsc::Sender<MediaEvent>,
    ) -> Result<Box<dyn MediaSession>, MediaError>;
}

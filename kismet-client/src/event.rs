use crate::error::ClientError;
use kismet_core::{PairRole, RoomId, SessionId};
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Coarse lifecycle state surfaced to UI collaborators. Owned and
/// transitioned only by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Searching,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Everything collaborators can observe, delivered in arrival order on
/// a single subscription channel.
pub enum ClientEvent {
    StateChange(ConnectionState),
    UserCount {
        count: usize,
    },
    MatchFound {
        room_id: RoomId,
        partner_id: SessionId,
        role: PairRole,
    },
    MessageReceived {
        text: String,
        /// Server-assigned unix milliseconds.
        timestamp: u64,
    },
    RemoteTrack(Arc<TrackRemote>),
    PeerDisconnected,
    Error(ClientError),
}

// Tracks do not implement Debug, so spell the variants out by hand.
impl std::fmt::Debug for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateChange(state) => f.debug_tuple("StateChange").field(state).finish(),
            Self::UserCount { count } => {
                f.debug_struct("UserCount").field("count", count).finish()
            }
            Self::MatchFound {
                room_id,
                partner_id,
                role,
            } => f
                .debug_struct("MatchFound")
                .field("room_id", room_id)
                .field("partner_id", partner_id)
                .field("role", role)
                .finish(),
            Self::MessageReceived { text, timestamp } => f
                .debug_struct("MessageReceived")
                .field("text", text)
                .field("timestamp", timestamp)
                .finish(),
            Self::RemoteTrack(track) => f.debug_tuple("RemoteTrack").field(&track.id()).finish(),
            Self::PeerDisconnected => write!(f, "PeerDisconnected"),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

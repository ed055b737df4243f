use crate::model::chat::{ChatMode, PairRole};
use crate::model::room::RoomId;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a client may send to the server. One variant per wire
/// `type`; unknown types fail decoding at the boundary and are dropped
/// there, never propagated inward.
///
/// Description and candidate payloads are opaque to the server: it
/// relays them verbatim to the room partner without inspecting them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEnvelope {
    BeginSearch {
        mode: ChatMode,
        #[serde(default)]
        interests: Vec<String>,
    },
    Offer {
        description: Value,
    },
    Answer {
        description: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    ChatMessage {
        text: String,
    },
    Skip {},
    Stop {},
}

/// Everything the server may send to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEnvelope {
    Connected {
        session_id: SessionId,
    },
    UserCount {
        count: usize,
    },
    Searching {},
    MatchFound {
        room_id: RoomId,
        partner_id: SessionId,
        role: PairRole,
    },
    Offer {
        description: Value,
    },
    Answer {
        description: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    ChatMessage {
        text: String,
        /// Server-assigned unix milliseconds; client clocks are untrusted.
        timestamp: u64,
    },
    PeerDisconnected {},
}

use serde::{Deserialize, Serialize};

/// What kind of encounter a participant is searching for. Matching pairs
/// equal modes only; interests ride along but are not a matching key.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Video,
    Text,
}

/// Which side of a freshly formed room drives the offer. Assigned by the
/// server (queued participant becomes the caller) so the two peers never
/// offer simultaneously.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PairRole {
    Caller,
    Callee,
}

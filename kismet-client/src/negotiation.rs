use crate::media::{MediaError, MediaSession};
use kismet_core::PairRole;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    Negotiating,
    Connected,
    Closed,
}

/// Drives one room's offer/answer/candidate exchange over a media
/// session. The server assigns exactly one caller per room, so the
/// engine never needs glare resolution: the caller offers, the callee
/// answers, and that is the whole handshake.
pub struct Negotiation {
    role: PairRole,
    phase: NegotiationPhase,
    media: Box<dyn MediaSession>,
    remote_description_set: bool,
    /// Candidates that raced ahead of the remote description. Held back
    /// and applied once the description lands, never discarded.
    pending_remote_candidates: Vec<Value>,
    applied_candidates: HashSet<String>,
}

impl Negotiation {
    pub fn new(role: PairRole, media: Box<dyn MediaSession>) -> Self {
        Self {
            role,
            phase: NegotiationPhase::Idle,
            media,
            remote_description_set: false,
            pending_remote_candidates: Vec::new(),
            applied_candidates: HashSet::new(),
        }
    }

    pub fn role(&self) -> PairRole {
        self.role
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    /// Begin negotiating. The caller produces the offer to send to the
    /// peer; the callee produces nothing and waits for the offer.
    pub async fn start(&mut self) -> Result<Option<Value>, MediaError> {
        self.phase = NegotiationPhase::Negotiating;
        match self.role {
            PairRole::Caller => Ok(Some(self.media.create_offer().await?)),
            PairRole::Callee => Ok(None),
        }
    }

    /// Apply a remote offer (callee only) and produce the answer to
    /// send back. Any buffered candidates are flushed afterwards.
    pub async fn handle_offer(&mut self, offer: Value) -> Result<Option<Value>, MediaError> {
        if self.role == PairRole::Caller {
            warn!("Caller received an offer; ignoring");
            return Ok(None);
        }
        let answer = self.media.accept_offer(offer).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates().await?;
        Ok(Some(answer))
    }

    /// Apply a remote answer (caller only) and flush buffered candidates.
    pub async fn handle_answer(&mut self, answer: Value) -> Result<(), MediaError> {
        if self.role == PairRole::Callee {
            warn!("Callee received an answer; ignoring");
            return Ok(());
        }
        self.media.accept_answer(answer).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates().await
    }

    /// Apply a remote candidate. Candidates arriving before the remote
    /// description are buffered; duplicates are tolerated and applied
    /// only once.
    pub async fn handle_candidate(&mut self, candidate: Value) -> Result<(), MediaError> {
        if !self.remote_description_set {
            debug!("Buffering early remote candidate");
            self.pending_remote_candidates.push(candidate);
            return Ok(());
        }
        self.apply_candidate(candidate).await
    }

    /// The transport-level channel reported connected.
    pub fn mark_connected(&mut self) {
        if self.phase == NegotiationPhase::Negotiating {
            self.phase = NegotiationPhase::Connected;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.phase == NegotiationPhase::Closed
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.phase != NegotiationPhase::Closed {
            self.phase = NegotiationPhase::Closed;
            self.pending_remote_candidates.clear();
            self.media.close().await;
        }
    }

    async fn flush_pending_candidates(&mut self) -> Result<(), MediaError> {
        for candidate in std::mem::take(&mut self.pending_remote_candidates) {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn apply_candidate(&mut self, candidate: Value) -> Result<(), MediaError> {
        let key = candidate.to_string();
        if !self.applied_candidates.insert(key) {
            debug!("Skipping duplicate remote candidate");
            return Ok(());
        }
        self.media.add_remote_candidate(candidate).await
    }
}

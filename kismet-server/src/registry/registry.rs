use kismet_core::{ChatMode, RoomId, SessionId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// Server-side state for one connected participant.
#[derive(Debug, Default)]
pub struct Session {
    pub mode: Option<ChatMode>,
    pub interests: Vec<String>,
    pub room: Option<RoomId>,
}

/// The two members of a live room, stored with their negotiation roles.
/// The caller is always the participant that was already waiting when
/// the match was made.
#[derive(Debug, Clone, Copy)]
pub struct RoomPair {
    pub caller: SessionId,
    pub callee: SessionId,
}

impl RoomPair {
    pub fn partner_of(&self, session: SessionId) -> Option<SessionId> {
        if self.caller == session {
            Some(self.callee)
        } else if self.callee == session {
            Some(self.caller)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct WaitingEntry {
    session: SessionId,
    mode: ChatMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A compatible waiting participant was found; a room now exists.
    Matched {
        room_id: RoomId,
        caller: SessionId,
        callee: SessionId,
    },
    /// Nobody compatible is waiting; the requester joined the pool.
    Enqueued,
}

/// Point-in-time counters for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub waiting: usize,
    pub rooms: usize,
}

/// Owns every session, the waiting pool and the room table. Mutated only
/// by the dispatcher task, one command at a time, so no operation here
/// needs interior locking.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, Session>,
    waiting: Vec<WaitingEntry>,
    rooms: HashMap<RoomId, RoomPair>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly connected session. No effect on the pool.
    pub fn connect(&mut self, session: SessionId) {
        self.sessions.insert(session, Session::default());
        self.assert_invariants();
    }

    /// Record the search parameters and either pair the requester with
    /// the first waiting participant of equal mode or enqueue it.
    ///
    /// The requester must not currently be in a room; callers tear the
    /// room down first (see `leave_room`).
    pub fn begin_search(
        &mut self,
        session: SessionId,
        mode: ChatMode,
        interests: Vec<String>,
    ) -> Result<SearchOutcome, RegistryError> {
        let record = self
            .sessions
            .get_mut(&session)
            .ok_or(RegistryError::UnknownSession(session))?;
        record.mode = Some(mode);
        record.interests = interests;

        // A re-search replaces any existing pool entry, it never stacks.
        self.waiting.retain(|entry| entry.session != session);

        let found = self
            .waiting
            .iter()
            .position(|entry| entry.mode == mode && entry.session != session);

        let outcome = match found {
            Some(index) => {
                let matched = self.waiting.remove(index);
                let room_id = RoomId::new();
                self.rooms.insert(
                    room_id,
                    RoomPair {
                        caller: matched.session,
                        callee: session,
                    },
                );
                if let Some(peer) = self.sessions.get_mut(&matched.session) {
                    peer.room = Some(room_id);
                }
                if let Some(me) = self.sessions.get_mut(&session) {
                    me.room = Some(room_id);
                }
                SearchOutcome::Matched {
                    room_id,
                    caller: matched.session,
                    callee: session,
                }
            }
            None => {
                self.waiting.push(WaitingEntry { session, mode });
                SearchOutcome::Enqueued
            }
        };

        self.assert_invariants();
        Ok(outcome)
    }

    /// Tear down the session's room, if any. Returns the deleted room id
    /// and the abandoned partner so the caller can notify it. Both
    /// members' room pointers are cleared.
    pub fn leave_room(&mut self, session: SessionId) -> Option<(RoomId, SessionId)> {
        let room_id = self.sessions.get(&session)?.room?;
        let pair = self.rooms.remove(&room_id)?;
        let partner = pair.partner_of(session)?;

        if let Some(record) = self.sessions.get_mut(&session) {
            record.room = None;
        }
        if let Some(record) = self.sessions.get_mut(&partner) {
            record.room = None;
        }

        self.assert_invariants();
        Some((room_id, partner))
    }

    /// Full cleanup for a closed transport. Idempotent: a second call
    /// for the same session finds nothing to remove. Returns the
    /// abandoned room partner, if the session held a room.
    pub fn disconnect(&mut self, session: SessionId) -> Option<SessionId> {
        self.waiting.retain(|entry| entry.session != session);
        let partner = self.leave_room(session).map(|(_, partner)| partner);
        self.sessions.remove(&session);
        self.assert_invariants();
        partner
    }

    /// The other occupant of the session's current room.
    pub fn partner_of(&self, session: SessionId) -> Option<SessionId> {
        let room_id = self.sessions.get(&session)?.room?;
        self.rooms.get(&room_id)?.partner_of(session)
    }

    /// Mode and interests from the session's last `begin_search`, used
    /// to re-enter the pool on skip.
    pub fn last_search(&self, session: SessionId) -> Option<(ChatMode, Vec<String>)> {
        let record = self.sessions.get(&session)?;
        Some((record.mode?, record.interests.clone()))
    }

    pub fn is_waiting(&self, session: SessionId) -> bool {
        self.waiting.iter().any(|entry| entry.session == session)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            sessions: self.sessions.len(),
            waiting: self.waiting.len(),
            rooms: self.rooms.len(),
        }
    }

    /// Structural invariants, checked after every mutation in debug
    /// builds: no duplicate pool entries, nobody both queued and roomed,
    /// every room references exactly two distinct live sessions that
    /// point back at it, and each session belongs to at most one room.
    fn assert_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            for (i, entry) in self.waiting.iter().enumerate() {
                debug_assert!(
                    !self.waiting[i + 1..]
                        .iter()
                        .any(|other| other.session == entry.session),
                    "session {} queued twice",
                    entry.session
                );
                let roomed = self
                    .sessions
                    .get(&entry.session)
                    .is_some_and(|s| s.room.is_some());
                debug_assert!(!roomed, "session {} queued while in a room", entry.session);
            }
            for (room_id, pair) in &self.rooms {
                debug_assert!(pair.caller != pair.callee, "room {room_id} pairs a session with itself");
                for member in [pair.caller, pair.callee] {
                    let back = self.sessions.get(&member).and_then(|s| s.room);
                    debug_assert_eq!(
                        back,
                        Some(*room_id),
                        "room {room_id} member {member} does not point back at it"
                    );
                }
            }
        }
    }
}

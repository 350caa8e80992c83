//! Session state machine
//!
//! Tracks a duplex session from connection to termination.
//!
//! ```text
//! AwaitingJoin ──Join{room≠0}──► Subscribed ──reader or queue ends──► Terminated
//!      │                                                                 ▲
//!      └──────────── anything else / end of input ───────────────────────┘
//! ```

use std::time::{Duration, Instant};

use crate::store::RoomId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, waiting for the join event
    AwaitingJoin,
    /// Joined a room and streaming
    Subscribed,
    /// Finished; terminal
    Terminated,
}

/// Per-connection session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Current phase
    pub phase: SessionPhase,

    /// Joined room (set on entering Subscribed)
    pub room_id: Option<RoomId>,

    /// Connection start time
    pub connected_at: Instant,

    /// Time the join was accepted
    pub joined_at: Option<Instant>,

    /// Messages this session submitted for persistence
    pub messages_sent: u64,

    /// Messages delivered to this session
    pub messages_delivered: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64) -> Self {
        Self {
            id,
            phase: SessionPhase::AwaitingJoin,
            room_id: None,
            connected_at: Instant::now(),
            joined_at: None,
            messages_sent: 0,
            messages_delivered: 0,
        }
    }

    /// Accept a join
    ///
    /// Returns false, leaving the state untouched, if the session is not
    /// awaiting a join or the room id is unset.
    pub fn join(&mut self, room_id: RoomId) -> bool {
        if self.phase != SessionPhase::AwaitingJoin || room_id.is_unset() {
            return false;
        }

        self.phase = SessionPhase::Subscribed;
        self.room_id = Some(room_id);
        self.joined_at = Some(Instant::now());
        true
    }

    /// Enter the terminal phase
    pub fn terminate(&mut self) {
        self.phase = SessionPhase::Terminated;
    }

    /// Check if the session is subscribed to a room
    pub fn is_subscribed(&self) -> bool {
        self.phase == SessionPhase::Subscribed
    }

    /// Check if the session has terminated
    pub fn is_terminated(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(1);
        assert_eq!(state.phase, SessionPhase::AwaitingJoin);

        assert!(state.join(RoomId(42)));
        assert!(state.is_subscribed());
        assert_eq!(state.room_id, Some(RoomId(42)));
        assert!(state.joined_at.is_some());

        state.terminate();
        assert!(state.is_terminated());
    }

    #[test]
    fn test_join_rejects_unset_room() {
        let mut state = SessionState::new(1);

        assert!(!state.join(RoomId(0)));
        assert_eq!(state.phase, SessionPhase::AwaitingJoin);
        assert!(state.room_id.is_none());
    }

    #[test]
    fn test_join_only_once() {
        let mut state = SessionState::new(1);

        assert!(state.join(RoomId(1)));
        assert!(!state.join(RoomId(2)));
        assert_eq!(state.room_id, Some(RoomId(1)));
    }

    #[test]
    fn test_no_join_after_termination() {
        let mut state = SessionState::new(1);
        state.terminate();

        assert!(!state.join(RoomId(1)));
        assert!(state.is_terminated());
    }
}

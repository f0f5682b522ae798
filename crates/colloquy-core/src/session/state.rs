//! Per-request session state.
//!
//! A [`StreamingSession`] lives for exactly one turn: created when the
//! controller accepts a request, discarded after completion or error,
//! never persisted or reused. The state enum makes each phase of the turn
//! explicit rather than tracking flags.

use uuid::Uuid;

use colloquy_types::adapter::Usage;

/// Phase of a single conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, nothing sent yet.
    Idle,
    /// Typing indicator raised.
    TypingStarted,
    /// Context assembled, adapter call about to start.
    Generating,
    /// Receiving incremental chunks.
    Streaming,
    /// Waiting on one full response.
    SingleShot,
    /// Terminal signal received, persisting the assistant turn.
    Completing,
    /// Turn finished normally.
    Done,
    /// Turn failed; fallback recovery takes over delivery.
    Errored,
}

impl SessionState {
    /// Whether the session can move from `self` to `next`.
    ///
    /// `Errored` is reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Errored {
            return true;
        }
        matches!(
            (*self, next),
            (Idle, TypingStarted)
                | (TypingStarted, Generating)
                | (Generating, Streaming)
                | (Generating, SingleShot)
                | (Streaming, Completing)
                | (SingleShot, Completing)
                | (Completing, Done)
        )
    }

    /// Whether this state ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Errored)
    }
}

/// Ephemeral state for one in-flight generation request.
#[derive(Debug)]
pub struct StreamingSession {
    pub user_id: String,
    pub message_id: Uuid,
    pub accumulated: String,
    pub usage: Option<Usage>,
    pub state: SessionState,
}

impl StreamingSession {
    /// Start a fresh session for a user's turn.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message_id: Uuid::now_v7(),
            accumulated: String::new(),
            usage: None,
            state: SessionState::Idle,
        }
    }

    /// Advance the state machine.
    ///
    /// The controller only drives legal transitions; an illegal one is a
    /// logic error caught in debug builds.
    pub fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Accumulate streamed content.
    pub fn push_content(&mut self, fragment: &str) {
        self.accumulated.push_str(fragment);
    }

    /// Discard accumulated content (cancellation or mid-stream failure);
    /// it must never be appended to the context.
    pub fn discard_content(&mut self) {
        self.accumulated.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_streaming_transitions() {
        use SessionState::*;
        let path = [Idle, TypingStarted, Generating, Streaming, Completing, Done];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_happy_path_single_shot_transitions() {
        use SessionState::*;
        assert!(Generating.can_transition_to(SingleShot));
        assert!(SingleShot.can_transition_to(Completing));
    }

    #[test]
    fn test_errored_reachable_from_non_terminal() {
        use SessionState::*;
        for state in [Idle, TypingStarted, Generating, Streaming, SingleShot, Completing] {
            assert!(state.can_transition_to(Errored));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        use SessionState::*;
        for next in [Idle, TypingStarted, Generating, Streaming, Errored] {
            assert!(!Done.can_transition_to(next));
            assert!(!Errored.can_transition_to(next));
        }
    }

    #[test]
    fn test_illegal_skips_rejected() {
        use SessionState::*;
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!TypingStarted.can_transition_to(Completing));
        assert!(!Streaming.can_transition_to(SingleShot));
    }

    #[test]
    fn test_session_accumulation_and_discard() {
        let mut session = StreamingSession::new("alice");
        assert_eq!(session.state, SessionState::Idle);
        session.push_content("partial ");
        session.push_content("reply");
        assert_eq!(session.accumulated, "partial reply");
        session.discard_content();
        assert!(session.accumulated.is_empty());
    }

    #[test]
    fn test_sessions_get_distinct_message_ids() {
        let a = StreamingSession::new("alice");
        let b = StreamingSession::new("alice");
        assert_ne!(a.message_id, b.message_id);
    }
}

//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state (no socket yet)
    Unestablished,

    /// TCP connect in progress (resolution and three-way handshake)
    Connecting,

    /// TLS handshake in progress on an established TCP socket
    HandshakingTls,

    /// Connected and ready for byte-stream I/O
    Established,

    /// Closed
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unestablished, Connecting)
                | (Connecting, HandshakingTls)
                | (Connecting, Established)
                | (HandshakingTls, Established)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unestablished => write!(f, "unestablished"),
            Self::Connecting => write!(f, "connecting"),
            Self::HandshakingTls => write!(f, "handshaking_tls"),
            Self::Established => write!(f, "established"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_plain_transitions() {
        let mut state = ConnectionState::Unestablished;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::Established).is_ok());
    }

    #[test]
    fn test_valid_tls_transitions() {
        let mut state = ConnectionState::Unestablished;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::HandshakingTls).is_ok());
        assert!(state.transition(ConnectionState::Established).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::Unestablished;
        assert!(state.transition(ConnectionState::Established).is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        for start in [
            ConnectionState::Unestablished,
            ConnectionState::Connecting,
            ConnectionState::HandshakingTls,
            ConnectionState::Established,
            ConnectionState::Closed,
        ] {
            let mut state = start;
            assert!(state.transition(ConnectionState::Closed).is_ok());
            assert_eq!(state, ConnectionState::Closed);
        }
    }

    #[test]
    fn test_no_reopen_after_close() {
        let state = ConnectionState::Closed;
        assert!(!state.can_transition_to(ConnectionState::Connecting));
        assert!(!state.can_transition_to(ConnectionState::Established));
    }

    #[test]
    fn test_no_handshake_without_socket() {
        let state = ConnectionState::Unestablished;
        assert!(!state.can_transition_to(ConnectionState::HandshakingTls));
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Established.to_string(), "established");
        assert_eq!(ConnectionState::HandshakingTls.to_string(), "handshaking_tls");
    }
}

//! Client lifecycle state machine.

/// Lifecycle state of the remote client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// No client object exists.
    #[default]
    NoSession,
    /// A create call is outstanding.
    CreatingSession,
    /// Configuration and a start call are outstanding.
    Starting,
    /// The client is started and subscribed to location updates.
    Started,
    /// A stop call is outstanding.
    Stopping,
}

impl ClientState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - NoSession -> CreatingSession
    /// - CreatingSession -> Starting
    /// - CreatingSession -> NoSession
    /// - Starting -> Started
    /// - Starting -> NoSession
    /// - Started -> Stopping
    /// - Stopping -> NoSession
    pub fn can_transition_to(&self, target: ClientState) -> bool {
        use ClientState::*;
        matches!(
            (*self, target),
            (NoSession, CreatingSession)
                | (CreatingSession, Starting)
                | (CreatingSession, NoSession)
                | (Starting, Started)
                | (Starting, NoSession)
                | (Started, Stopping)
                | (Stopping, NoSession)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: ClientState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::GeoclueError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if a client object is held in this state.
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            ClientState::Starting | ClientState::Started | ClientState::Stopping
        )
    }

    /// Check if a remote call is outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ClientState::CreatingSession | ClientState::Starting | ClientState::Stopping
        )
    }
}

/// The two independent sources of demand for a running client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demand {
    /// Continuous updates were requested.
    pub continuous: bool,
    /// A single-shot request is outstanding.
    pub deadline: bool,
}

impl Demand {
    /// The client must be running while this holds.
    pub fn is_active(&self) -> bool {
        self.continuous || self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ClientState::NoSession;
        assert!(state.transition_to(ClientState::CreatingSession).is_ok());
        assert!(state.transition_to(ClientState::Starting).is_ok());
        assert!(state.transition_to(ClientState::Started).is_ok());
        assert!(state.transition_to(ClientState::Stopping).is_ok());
        assert!(state.transition_to(ClientState::NoSession).is_ok());
        assert_eq!(state, ClientState::NoSession);
    }

    #[test]
    fn test_failure_paths() {
        let mut state = ClientState::CreatingSession;
        assert!(state.transition_to(ClientState::NoSession).is_ok());

        let mut state = ClientState::Starting;
        assert!(state.transition_to(ClientState::NoSession).is_ok());
    }

    #[test]
    fn test_invalid_no_session_to_started() {
        let mut state = ClientState::NoSession;
        assert!(state.transition_to(ClientState::Started).is_err());
        // State should remain unchanged
        assert_eq!(state, ClientState::NoSession);
    }

    #[test]
    fn test_invalid_from_stopping() {
        let mut state = ClientState::Stopping;
        assert!(state.transition_to(ClientState::Started).is_err());
        assert!(state.transition_to(ClientState::Starting).is_err());
        assert!(state.transition_to(ClientState::CreatingSession).is_err());
    }

    #[test]
    fn test_started_cannot_drop_without_stop() {
        let mut state = ClientState::Started;
        assert!(state.transition_to(ClientState::NoSession).is_err());
    }

    #[test]
    fn test_has_session() {
        assert!(!ClientState::NoSession.has_session());
        assert!(!ClientState::CreatingSession.has_session());
        assert!(ClientState::Starting.has_session());
        assert!(ClientState::Started.has_session());
        assert!(ClientState::Stopping.has_session());
    }

    #[test]
    fn test_is_pending() {
        assert!(!ClientState::NoSession.is_pending());
        assert!(ClientState::CreatingSession.is_pending());
        assert!(!ClientState::Started.is_pending());
        assert!(ClientState::Stopping.is_pending());
    }

    #[test]
    fn test_demand_gate() {
        assert!(!Demand::default().is_active());
        assert!(Demand {
            continuous: true,
            deadline: false
        }
        .is_active());
        assert!(Demand {
            continuous: false,
            deadline: true
        }
        .is_active());
    }

    #[test]
    fn test_default() {
        assert_eq!(ClientState::default(), ClientState::NoSession);
    }
}

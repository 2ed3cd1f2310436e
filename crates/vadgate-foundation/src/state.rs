use crate::error::SessionError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

/// Lifecycle of one recognition session.
///
/// `Preparing` is the initial state. `Stopped` is terminal; a stopped session
/// is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Preparing,
    Running,
    Stopping,
    Stopped,
}

/// Validated state machine for a session, with change notifications.
///
/// Once `Stopping` is entered the only legal move is to `Stopped`; there is no
/// way back to `Preparing` or `Running`.
pub struct SessionStateMachine {
    state: RwLock<SessionState>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: RwLock::new(SessionState::Preparing),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), SessionError> {
        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (SessionState::Preparing, SessionState::Running)
                | (SessionState::Preparing, SessionState::Stopping)
                | (SessionState::Running, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Stopped)
        );

        if !valid {
            return Err(SessionError::InvalidTransition {
                from: *current,
                to: new_state,
            });
        }

        tracing::info!("Session state: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    /// Atomically move an active session into `Stopping`.
    ///
    /// Returns true only for the single caller that wins the transition;
    /// every other caller (already stopping, already stopped) gets false.
    /// This is the arbitration point for racing `stop()`/`abort()` calls.
    pub fn begin_teardown(&self) -> bool {
        let mut current = self.state.write();
        match *current {
            SessionState::Preparing | SessionState::Running => {
                tracing::info!("Session state: {:?} -> Stopping", *current);
                *current = SessionState::Stopping;
                let _ = self.state_tx.send(SessionState::Stopping);
                true
            }
            SessionState::Stopping | SessionState::Stopped => false,
        }
    }

    pub fn current(&self) -> SessionState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_preparing() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.current(), SessionState::Preparing);
    }

    #[test]
    fn full_lifecycle_is_valid() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionState::Running).unwrap();
        sm.transition(SessionState::Stopping).unwrap();
        sm.transition(SessionState::Stopped).unwrap();
        assert_eq!(sm.current(), SessionState::Stopped);
    }

    #[test]
    fn preparing_can_stop_directly() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionState::Stopping).unwrap();
        sm.transition(SessionState::Stopped).unwrap();
    }

    #[test]
    fn stopped_is_terminal() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionState::Stopping).unwrap();
        sm.transition(SessionState::Stopped).unwrap();
        assert!(sm.transition(SessionState::Running).is_err());
        assert!(sm.transition(SessionState::Preparing).is_err());
        assert_eq!(sm.current(), SessionState::Stopped);
    }

    #[test]
    fn begin_teardown_wins_exactly_once() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionState::Running).unwrap();
        assert!(sm.begin_teardown());
        assert!(!sm.begin_teardown());
        sm.transition(SessionState::Stopped).unwrap();
        assert!(!sm.begin_teardown());
    }

    #[test]
    fn subscribers_see_transitions_in_order() {
        let sm = SessionStateMachine::new();
        let rx = sm.subscribe();
        sm.transition(SessionState::Running).unwrap();
        sm.transition(SessionState::Stopping).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SessionState::Running);
        assert_eq!(rx.try_recv().unwrap(), SessionState::Stopping);
    }
}

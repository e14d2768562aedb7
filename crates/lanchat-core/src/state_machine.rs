use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// High-level lifecycle of a chat session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionLifecycleState {
    /// Session created, nothing requested yet.
    Cold,
    /// Initial identity/peer/history loads are in flight.
    Starting,
    /// Initial peer snapshot landed; steady-state polling and events.
    Live,
    /// Torn down; late completions are discarded.
    ShutDown,
}

/// Actions validated against the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Issue the initial loads.
    Start,
    /// First successful peer snapshot arrived.
    MarkLive,
    /// Periodic poll or history reload.
    Refresh,
    /// Send/broadcast/greet initiated by the user.
    UserCall,
    /// Stop polling and discard in-flight completions.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionLifecycleState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            state: SessionLifecycleState::Cold,
        }
    }
}

impl SessionStateMachine {
    pub fn state(&self) -> SessionLifecycleState {
        self.state
    }

    /// Validate `action` and apply its transition. Returns `true` when the
    /// lifecycle state changed.
    pub fn apply(&mut self, action: SessionAction) -> Result<bool, GatewayError> {
        use SessionLifecycleState::*;

        match action {
            SessionAction::Start => self.transition_from_state(Cold, Starting, "start"),
            SessionAction::MarkLive => match self.state {
                Starting => {
                    self.state = Live;
                    Ok(true)
                }
                Live => Ok(false),
                current => Err(GatewayError::invalid_state(current, "mark_live")),
            },
            SessionAction::Refresh | SessionAction::UserCall => {
                if self.is_active() {
                    Ok(false)
                } else {
                    Err(GatewayError::invalid_state(self.state, "gateway call"))
                }
            }
            SessionAction::Shutdown => {
                self.transition_from_any_of(&[Cold, Starting, Live], ShutDown, "shutdown")
            }
        }
    }

    /// Whether results of in-flight calls may still be applied.
    pub fn accepts_completions(&self) -> bool {
        self.state != SessionLifecycleState::ShutDown
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionLifecycleState::Starting | SessionLifecycleState::Live
        )
    }

    fn transition_from_state(
        &mut self,
        expected: SessionLifecycleState,
        next: SessionLifecycleState,
        action: &str,
    ) -> Result<bool, GatewayError> {
        if self.state != expected {
            return Err(GatewayError::invalid_state(self.state, action));
        }
        self.state = next;
        Ok(true)
    }

    fn transition_from_any_of(
        &mut self,
        expected: &[SessionLifecycleState],
        next: SessionLifecycleState,
        action: &str,
    ) -> Result<bool, GatewayError> {
        if !expected.contains(&self.state) {
            return Err(GatewayError::invalid_state(self.state, action));
        }
        self.state = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_happy_path_transitions() {
        let mut sm = SessionStateMachine::default();
        assert!(sm.apply(SessionAction::Start).expect("start from cold"));
        assert_eq!(sm.state(), SessionLifecycleState::Starting);

        sm.apply(SessionAction::Refresh).expect("refresh while starting");
        assert!(sm.apply(SessionAction::MarkLive).expect("first snapshot"));
        assert!(!sm.apply(SessionAction::MarkLive).expect("repeat is harmless"));
        assert_eq!(sm.state(), SessionLifecycleState::Live);

        sm.apply(SessionAction::UserCall).expect("user call while live");
        sm.apply(SessionAction::Shutdown).expect("shutdown");
        assert_eq!(sm.state(), SessionLifecycleState::ShutDown);
        assert!(!sm.accepts_completions());
    }

    #[test]
    fn rejects_calls_before_start() {
        let mut sm = SessionStateMachine::default();
        let err = sm
            .apply(SessionAction::Refresh)
            .expect_err("refresh needs a started session");
        assert_eq!(err.code, "invalid_state_transition");
    }

    #[test]
    fn rejects_everything_after_shutdown() {
        let mut sm = SessionStateMachine::default();
        sm.apply(SessionAction::Start).expect("start");
        sm.apply(SessionAction::Shutdown).expect("shutdown");

        for action in [
            SessionAction::Start,
            SessionAction::MarkLive,
            SessionAction::Refresh,
            SessionAction::UserCall,
            SessionAction::Shutdown,
        ] {
            let err = sm.apply(action).expect_err("shut down session rejects actions");
            assert_eq!(err.code, "invalid_state_transition");
        }
    }

    #[test]
    fn start_is_one_shot() {
        let mut sm = SessionStateMachine::default();
        sm.apply(SessionAction::Start).expect("start");
        assert!(sm.apply(SessionAction::Start).is_err());
    }
}

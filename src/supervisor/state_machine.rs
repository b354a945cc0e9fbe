use serde::Serialize;
use thiserror::Error;

/// Bootstrap progress. Only single forward steps are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BootstrapState {
    NotStarted,
    FrameworkStarted,
    Discovered,
    Installed,
    Supervising,
    Waiting,
    Stopped,
}

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("invalid transition: {0:?} -> {1:?}")]
    InvalidTransition(BootstrapState, BootstrapState),
}

pub struct StateMachine {
    pub state: BootstrapState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: BootstrapState::NotStarted }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_transition(&self, to: &BootstrapState) -> bool {
        use BootstrapState::*;
        matches!(
            (&self.state, to),
            (NotStarted, FrameworkStarted)
                | (FrameworkStarted, Discovered)
                | (Discovered, Installed)
                | (Installed, Supervising)
                | (Supervising, Waiting)
                | (Waiting, Stopped)
        )
    }

    pub fn transition(&mut self, to: BootstrapState) -> Result<(), TransitionError> {
        if self.can_transition(&to) {
            tracing::info!("Bootstrap state: {:?} -> {:?}", self.state, to);
            self.state = to;
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition(self.state, to))
        }
    }
}

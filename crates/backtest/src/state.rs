//! Run lifecycle.
//!
//! ```text
//! INITIALIZED -> RUNNING -> COMPLETED           -> RESULT_COMPUTED
//!                        -> HALTED_STOP_LOSS    -> RESULT_COMPUTED
//!                        -> HALTED_MAX_DRAWDOWN -> RESULT_COMPUTED
//! ```

use betlab_core::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Initialized,
    Running,
    Completed,
    HaltedStopLoss,
    HaltedMaxDrawdown,
    ResultComputed,
}

impl RunState {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initialized, Self::Running)
                | (
                    Self::Running,
                    Self::Completed | Self::HaltedStopLoss | Self::HaltedMaxDrawdown
                )
                | (
                    Self::Completed | Self::HaltedStopLoss | Self::HaltedMaxDrawdown,
                    Self::ResultComputed
                )
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Invariant`] for a transition the lifecycle
    /// does not allow.
    pub fn transition(self, next: Self) -> Result<Self, EngineError> {
        if self.can_transition_to(next) {
            tracing::debug!("Run state {} -> {}", self, next);
            Ok(next)
        } else {
            Err(EngineError::Invariant(format!(
                "illegal run state transition {self} -> {next}"
            )))
        }
    }

    /// Only a running simulation may append bets.
    #[must_use]
    pub fn accepts_bets(self) -> bool {
        self == Self::Running
    }

    #[must_use]
    pub fn is_halted(self) -> bool {
        matches!(self, Self::HaltedStopLoss | Self::HaltedMaxDrawdown)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::ResultComputed
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initialized => "INITIALIZED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::HaltedStopLoss => "HALTED_STOP_LOSS",
            Self::HaltedMaxDrawdown => "HALTED_MAX_DRAWDOWN",
            Self::ResultComputed => "RESULT_COMPUTED",
        };
        write!(f, "{name}")
    }
}

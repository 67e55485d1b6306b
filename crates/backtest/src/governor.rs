//! Stop conditions evaluated after each bet and at each day boundary.

use betlab_core::RiskLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::BankrollState;
use crate::state::RunState;

/// Why a run was halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    StopLoss,
    MaxDrawdown,
}

impl HaltReason {
    /// Terminal state a run enters for this reason.
    #[must_use]
    pub fn terminal_state(self) -> RunState {
        match self {
            Self::StopLoss => RunState::HaltedStopLoss,
            Self::MaxDrawdown => RunState::HaltedMaxDrawdown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskGovernor {
    stop_loss_fraction: Decimal,
    max_drawdown_fraction: Decimal,
}

impl RiskGovernor {
    #[must_use]
    pub fn new(limits: &RiskLimits) -> Self {
        Self {
            stop_loss_fraction: limits.stop_loss_fraction,
            max_drawdown_fraction: limits.max_drawdown_fraction,
        }
    }

    /// Capital at or below which the stop-loss fires.
    #[must_use]
    pub fn stop_loss_floor(&self, initial: Decimal) -> Decimal {
        initial * (Decimal::ONE - self.stop_loss_fraction)
    }

    /// Returns the halt reason, if any. Stop-loss is checked first.
    #[must_use]
    pub fn check(&self, state: &BankrollState) -> Option<HaltReason> {
        if state.current <= self.stop_loss_floor(state.initial) {
            return Some(HaltReason::StopLoss);
        }
        if state.drawdown >= self.max_drawdown_fraction {
            return Some(HaltReason::MaxDrawdown);
        }
        None
    }
}

//! Bet lifecycle
//!
//! ```text
//! Queued --activate--> Active --collect--> Collected
//!    |                    `----lose-----> Lost
//!    `----cancel----> Cancelled
//! ```
//!
//! Every state change goes through [`Bet::transition`]; anything off this
//! graph is an [`InvariantViolation`] and leaves the bet untouched.

use crate::errors::InvariantViolation;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BetState {
    Queued { auto_collect_at: Option<f64> },
    Active { auto_collect_at: Option<f64> },
    Collected { multiplier: f64 },
    Lost,
    Cancelled,
}

impl BetState {
    pub fn name(&self) -> &'static str {
        match self {
            BetState::Queued { .. } => "queued",
            BetState::Active { .. } => "active",
            BetState::Collected { .. } => "collected",
            BetState::Lost => "lost",
            BetState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BetState::Collected { .. } | BetState::Lost | BetState::Cancelled
        )
    }

    fn allows(&self, next: &BetState) -> bool {
        matches!(
            (self, next),
            (BetState::Queued { .. }, BetState::Active { .. })
                | (BetState::Queued { .. }, BetState::Cancelled)
                | (BetState::Active { .. }, BetState::Collected { .. })
                | (BetState::Active { .. }, BetState::Lost)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub round_id: Uuid,
    pub slot: usize,
    pub stake: Money,
    state: BetState,
}

impl Bet {
    /// A bet waiting for its round to start
    pub fn queued(round_id: Uuid, slot: usize, stake: Money, auto_collect_at: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            round_id,
            slot,
            stake,
            state: BetState::Queued { auto_collect_at },
        }
    }

    /// A bet whose round is already running (action-driven and spin games)
    pub fn active(round_id: Uuid, stake: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            round_id,
            slot: 0,
            stake,
            state: BetState::Active { auto_collect_at: None },
        }
    }

    pub fn state(&self) -> BetState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, BetState::Active { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self.state, BetState::Queued { .. })
    }

    pub fn auto_collect_at(&self) -> Option<f64> {
        match self.state {
            BetState::Queued { auto_collect_at } | BetState::Active { auto_collect_at } => auto_collect_at,
            _ => None,
        }
    }

    fn transition(&mut self, next: BetState) -> Result<(), InvariantViolation> {
        if !self.state.allows(&next) {
            return Err(InvariantViolation::IllegalBetTransition {
                bet_id: self.id,
                from: self.state.name(),
                to: next.name(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), InvariantViolation> {
        let auto_collect_at = self.auto_collect_at();
        self.transition(BetState::Active { auto_collect_at })
    }

    pub fn cancel(&mut self) -> Result<(), InvariantViolation> {
        self.transition(BetState::Cancelled)
    }

    /// Settle at `multiplier`; returns the payout rounded to the cent
    pub fn collect(&mut self, multiplier: f64) -> Result<Money, InvariantViolation> {
        self.transition(BetState::Collected { multiplier })?;
        Ok(self.stake.scale(multiplier))
    }

    /// Settle at an exact payout (roulette, case sales)
    ///
    /// A zero payout is a loss.
    pub fn settle_payout(&mut self, payout: Money) -> Result<Money, InvariantViolation> {
        if !payout.is_positive() {
            self.lose()?;
            return Ok(Money::ZERO);
        }
        let multiplier = if self.stake.is_positive() {
            payout.cents() as f64 / self.stake.cents() as f64
        } else {
            0.0
        };
        self.transition(BetState::Collected { multiplier })?;
        Ok(payout)
    }

    pub fn lose(&mut self) -> Result<(), InvariantViolation> {
        self.transition(BetState::Lost)
    }
}

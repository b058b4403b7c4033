//! Round lifecycle shared by every game
//!
//! A round cycles `Waiting -> Running -> Resolved` and then hands over to a
//! fresh round with the next cycle number. Phase instants are the scheduled
//! ones, so a late tick never shifts the timeline.

pub mod bet;
pub mod slots;
pub mod watcher;
pub mod crash_round;
pub mod reveal_round;
pub mod spin_round;
pub mod driver;

pub use bet::{Bet, BetState};
pub use crash_round::CrashRoundMachine;
pub use driver::{drive_rounds, Tickable};
pub use reveal_round::{MinesRound, PumpOutcome, PumpRound, RevealOutcome};
pub use slots::BetSlots;
pub use spin_round::{
    CaseGame, CaseOpening, CaseOutcome, Disposition, RouletteGame, RouletteOutcome, SpinGame, SpinRoundMachine,
    SpinTicket, WheelBet, WheelGame, WheelOutcome,
};
pub use watcher::{AutoCollect, AutoResolutionWatcher};

use crate::errors::InvariantViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Waiting,
    Running,
    Resolved,
}

impl RoundPhase {
    pub fn can_transition_to(self, next: RoundPhase) -> bool {
        matches!(
            (self, next),
            (RoundPhase::Waiting, RoundPhase::Running)
                | (RoundPhase::Running, RoundPhase::Resolved)
                | (RoundPhase::Resolved, RoundPhase::Waiting)
        )
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Waiting => write!(f, "waiting"),
            RoundPhase::Running => write!(f, "running"),
            RoundPhase::Resolved => write!(f, "resolved"),
        }
    }
}

/// One cycle of a game
#[derive(Debug, Clone)]
pub struct Round {
    id: Uuid,
    cycle: u64,
    phase: RoundPhase,
    phase_started_at: Instant,
}

impl Round {
    pub fn new(cycle: u64, at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle,
            phase: RoundPhase::Waiting,
            phase_started_at: at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn phase_started_at(&self) -> Instant {
        self.phase_started_at
    }

    pub fn elapsed_in_phase(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_started_at)
    }

    /// Move to `next` within this cycle, stamped at `at`
    pub fn advance(&mut self, next: RoundPhase, at: Instant) -> Result<(), InvariantViolation> {
        if next == RoundPhase::Waiting || !self.phase.can_transition_to(next) {
            return Err(InvariantViolation::IllegalPhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(round_id = %self.id, cycle = self.cycle, from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        self.phase_started_at = at;
        Ok(())
    }

    /// The round that follows a resolved one
    pub fn next_cycle(&self, at: Instant) -> Result<Round, InvariantViolation> {
        if !self.phase.can_transition_to(RoundPhase::Waiting) {
            return Err(InvariantViolation::IllegalPhaseTransition {
                from: self.phase,
                to: RoundPhase::Waiting,
            });
        }
        Ok(Round::new(self.cycle + 1, at))
    }

    /// Round replacing one abandoned after a generator fault, from any phase
    pub fn successor_after_fault(&self, at: Instant) -> Round {
        Round::new(self.cycle + 1, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_legal_cycle() {
        let start = Instant::now();
        let mut round = Round::new(1, start);
        assert_eq!(round.phase(), RoundPhase::Waiting);

        round.advance(RoundPhase::Running, start + Duration::from_secs(5)).unwrap();
        round.advance(RoundPhase::Resolved, start + Duration::from_secs(9)).unwrap();
        assert_eq!(round.phase_started_at(), start + Duration::from_secs(9));

        let next = round.next_cycle(start + Duration::from_secs(12)).unwrap();
        assert_eq!(next.cycle(), 2);
        assert_eq!(next.phase(), RoundPhase::Waiting);
        assert_ne!(next.id(), round.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_transitions() {
        let now = Instant::now();
        let mut round = Round::new(1, now);
        assert!(round.advance(RoundPhase::Resolved, now).is_err());
        assert!(round.next_cycle(now).is_err());
        assert!(round.advance(RoundPhase::Waiting, now).is_err());

        round.advance(RoundPhase::Running, now).unwrap();
        assert_eq!(
            round.advance(RoundPhase::Running, now),
            Err(InvariantViolation::IllegalPhaseTransition {
                from: RoundPhase::Running,
                to: RoundPhase::Running,
            })
        );
    }
}

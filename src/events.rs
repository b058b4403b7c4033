//! Round events for external observers
//!
//! Rendering, sound and history panels listen here. Nothing published on this
//! channel feeds back into the engine.

use crate::games::crash::CrashPoint;
use crate::games::GameType;
use crate::money::Money;
use crate::round::RoundPhase;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    PhaseChanged {
        game: GameType,
        round_id: Uuid,
        cycle: u64,
        phase: RoundPhase,
    },
    BetPlaced {
        game: GameType,
        round_id: Uuid,
        bet_id: Uuid,
        slot: usize,
        stake: Money,
    },
    BetCancelled {
        game: GameType,
        round_id: Uuid,
        bet_id: Uuid,
        slot: usize,
        refunded: Money,
    },
    BetCollected {
        game: GameType,
        round_id: Uuid,
        bet_id: Uuid,
        slot: usize,
        multiplier: f64,
        payout: Money,
        automatic: bool,
    },
    BetLost {
        game: GameType,
        round_id: Uuid,
        bet_id: Uuid,
        slot: usize,
        stake: Money,
    },
    Crashed {
        game: GameType,
        round_id: Uuid,
        crash_point: CrashPoint,
    },
    SpinResolved {
        game: GameType,
        round_id: Uuid,
        /// Segment index, winning number or first case winner
        outcome: usize,
        payout: Money,
    },
    RoundAbandoned {
        game: GameType,
        round_id: Uuid,
        reason: String,
        refunded: Money,
    },
    CreditUnsettled {
        game: GameType,
        round_id: Uuid,
        amount: Money,
        error: String,
    },
}

/// Broadcast fan-out of [`RoundEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RoundEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish without caring whether anyone listens
    pub fn publish(&self, event: RoundEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1_024)
    }
}

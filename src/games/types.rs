use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Crash,
    Dino,
    Mines,
    Pump,
    Wheel,
    Roulette,
    Cases,
    Upgrader,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Crash => write!(f, "crash"),
            GameType::Dino => write!(f, "dino"),
            GameType::Mines => write!(f, "mines"),
            GameType::Pump => write!(f, "pump"),
            GameType::Wheel => write!(f, "wheel"),
            GameType::Roulette => write!(f, "roulette"),
            GameType::Cases => write!(f, "cases"),
            GameType::Upgrader => write!(f, "upgrader"),
        }
    }
}

/// Game outcome from the player's side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
}

/// Final money movement of one bet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub bet_id: Uuid,
    pub round_id: Uuid,
    pub game: GameType,
    pub stake: Money,
    /// Effective multiplier applied to the stake
    pub multiplier: f64,
    pub payout: Money,
}

impl Settlement {
    pub fn outcome(&self) -> GameOutcome {
        if self.payout.is_positive() {
            GameOutcome::Win
        } else {
            GameOutcome::Loss
        }
    }

    /// Payout minus stake
    pub fn net(&self) -> Money {
        self.payout - self.stake
    }
}

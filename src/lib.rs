//! Roundhouse - round-resolution engine for short games of chance
//!
//! Outcome generators for crash, mines, pump, wheel, roulette and case games,
//! the per-game round state machines that drive them, and the wallet that
//! debits stakes and credits payouts against an external balance ledger.

pub mod config;
pub mod errors;
pub mod events;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod round;
pub mod simulation;

pub use config::{ConfigLoader, EngineConfig};
pub use errors::{EngineError, EngineResult};
pub use events::{EventBus, RoundEvent};
pub use games::{GameOutcome, GameType, Settlement};
pub use ledger::{BalanceLedger, InMemoryLedger, Wallet};
pub use metrics::EngineMetrics;
pub use money::{BetLimits, Money, MAX_BET, MIN_BET};
pub use round::{
    drive_rounds, Bet, BetState, CrashRoundMachine, MinesRound, PumpRound, RoundPhase, SpinRoundMachine, Tickable,
};
pub use simulation::{SimulationConfig, SimulationReport, Simulator};

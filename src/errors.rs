//! Error types for the round-resolution engine
//!
//! One root error with a category per failure class. The category decides how
//! a caller reacts: validation errors are shown to the player, ledger errors
//! are rolled back or retried, invariant violations are swallowed, round
//! faults abandon the current round only.

use crate::money::Money;
use crate::round::RoundPhase;
use thiserror::Error;
use uuid::Uuid;

/// Root error type for all engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected synchronously, nothing was mutated
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Balance ledger call failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Defensive no-op, never shown to the player
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Generator could not produce an outcome for this round
    #[error("Round fault: {0}")]
    RoundFault(#[from] RoundFault),

    /// Configuration loading and validation
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Player input that cannot be accepted in the current state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Stake {stake} outside of bet limits [{min}, {max}]")]
    StakeOutOfBounds { stake: Money, min: Money, max: Money },

    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: Money, available: Money },

    #[error("Cannot {action} while the round is {phase}")]
    WrongPhase { action: &'static str, phase: RoundPhase },

    #[error("Unknown bet slot {0}")]
    UnknownSlot(usize),

    #[error("Bet slot {0} already holds a bet")]
    SlotOccupied(usize),

    #[error("No bet in slot {0}")]
    NoBetInSlot(usize),

    #[error("Bet in slot {slot} is already running and cannot be cancelled")]
    CancelWhileRunning { slot: usize },

    #[error("Auto-collect target {requested:.2}x is below the minimum {minimum:.2}x")]
    AutoCollectTooLow { requested: f64, minimum: f64 },

    #[error("Cell {cell} is outside of a {cells}-cell grid")]
    CellOutOfRange { cell: usize, cells: usize },

    #[error("Invalid mine count {mines} for a {cells}-cell grid")]
    InvalidMineCount { mines: usize, cells: usize },

    #[error("Nothing to collect yet")]
    NothingToCollect,

    #[error("Invalid bet area: {0}")]
    InvalidBetArea(String),

    #[error("No stake has been placed")]
    EmptyWager,

    #[error("Case must be opened at least once")]
    EmptyBatch,

    #[error("Cannot open {requested} cases at once (max {max})")]
    BatchTooLarge { requested: u32, max: u32 },

    #[error("Unknown case: {0}")]
    UnknownCase(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Item {0} is not in the inventory")]
    ItemNotInInventory(Uuid),

    #[error("No items staked for the upgrade")]
    NoItemsStaked,

    #[error("No upgrade preset at {0}x")]
    UnknownTargetMultiplier(f64),
}

/// Balance ledger failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: {requested} requested, {available} available")]
    InsufficientFunds { requested: Money, available: Money },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected the request: {0}")]
    Rejected(String),

    #[error("Credit of {amount} still unsettled after {attempts} attempts: {last_error}")]
    CreditUnsettled {
        amount: Money,
        attempts: u32,
        last_error: String,
    },
}

/// Transitions the engine refuses to perform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("Bet {bet_id} cannot move from {from} to {to}")]
    IllegalBetTransition {
        bet_id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("Round cannot move from {from} to {to}")]
    IllegalPhaseTransition { from: RoundPhase, to: RoundPhase },

    #[error("Cell {0} is already revealed")]
    CellAlreadyRevealed(usize),
}

/// An outcome generator failed; fatal to the current round only
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundFault {
    #[error("Invalid generator input: {0}")]
    InvalidGeneratorInput(String),

    #[error("Invalid weight table: {0}")]
    InvalidWeights(String),

    #[error("Outcome out of range: {0}")]
    OutcomeOutOfRange(String),
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl EngineError {
    /// Whether the error should reach the player
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, EngineError::Invariant(_))
    }
}

// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

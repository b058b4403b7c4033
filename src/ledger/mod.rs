//! Balance ledger seam
//!
//! The ledger is the single source of truth for a player's balance. The engine
//! never writes a balance itself: it asks the ledger to debit or credit and
//! keeps an optimistic copy in a [`Wallet`].

pub mod memory;
pub mod wallet;

pub use memory::InMemoryLedger;
pub use wallet::{UnsettledCredit, Wallet};

use crate::errors::LedgerError;
use crate::games::GameType;
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Stake,
    Payout,
    Refund,
    Sale,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Stake => write!(f, "stake"),
            TransactionKind::Payout => write!(f, "payout"),
            TransactionKind::Refund => write!(f, "refund"),
            TransactionKind::Sale => write!(f, "sale"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReason {
    pub kind: TransactionKind,
    pub game: GameType,
    pub round_id: Uuid,
    pub bet_id: Option<Uuid>,
}

impl TransactionReason {
    pub fn stake(game: GameType, round_id: Uuid, bet_id: Uuid) -> Self {
        Self {
            kind: TransactionKind::Stake,
            game,
            round_id,
            bet_id: Some(bet_id),
        }
    }

    pub fn payout(game: GameType, round_id: Uuid, bet_id: Uuid) -> Self {
        Self {
            kind: TransactionKind::Payout,
            game,
            round_id,
            bet_id: Some(bet_id),
        }
    }

    pub fn refund(game: GameType, round_id: Uuid, bet_id: Uuid) -> Self {
        Self {
            kind: TransactionKind::Refund,
            game,
            round_id,
            bet_id: Some(bet_id),
        }
    }

    pub fn sale(game: GameType, round_id: Uuid) -> Self {
        Self {
            kind: TransactionKind::Sale,
            game,
            round_id,
            bet_id: None,
        }
    }
}

/// A confirmed balance movement, produced by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: Uuid,
    /// Negative for debits
    pub delta: Money,
    pub reason: TransactionReason,
    pub balance_after: Money,
    pub timestamp: DateTime<Utc>,
}

/// External balance store
///
/// Calls are not idempotent. Callers must not issue the same mutation twice.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Withdraw `amount`; fails with `InsufficientFunds` when the balance is short
    async fn debit(&self, amount: Money, reason: TransactionReason) -> Result<BalanceTransaction, LedgerError>;

    /// Deposit `amount`
    async fn credit(&self, amount: Money, reason: TransactionReason) -> Result<BalanceTransaction, LedgerError>;

    /// Current confirmed balance
    async fn balance(&self) -> Result<Money, LedgerError>;
}

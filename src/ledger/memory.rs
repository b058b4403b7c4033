//! In-process ledger with a transaction journal and scripted faults

use super::{BalanceLedger, BalanceTransaction, TransactionReason};
use crate::errors::LedgerError;
use crate::money::Money;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LedgerState {
    balance: Money,
    journal: Vec<BalanceTransaction>,
    debit_faults: VecDeque<LedgerError>,
    credit_faults: VecDeque<LedgerError>,
}

/// Single-account ledger held in memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(opening_balance: Money) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                balance: opening_balance,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger state poisoned".to_string()))
    }

    /// Make the next `count` debits fail with `error`
    pub fn fail_next_debits(&self, count: usize, error: LedgerError) {
        if let Ok(mut state) = self.lock() {
            state.debit_faults.extend(std::iter::repeat(error).take(count));
        }
    }

    /// Make the next `count` credits fail with `error`
    pub fn fail_next_credits(&self, count: usize, error: LedgerError) {
        if let Ok(mut state) = self.lock() {
            state.credit_faults.extend(std::iter::repeat(error).take(count));
        }
    }

    /// Confirmed transactions in order
    pub fn journal(&self) -> Vec<BalanceTransaction> {
        self.lock().map(|s| s.journal.clone()).unwrap_or_default()
    }

    fn record(state: &mut LedgerState, delta: Money, reason: TransactionReason) -> BalanceTransaction {
        state.balance += delta;
        let tx = BalanceTransaction {
            id: Uuid::new_v4(),
            delta,
            reason,
            balance_after: state.balance,
            timestamp: Utc::now(),
        };
        state.journal.push(tx.clone());
        tx
    }
}

#[async_trait]
impl BalanceLedger for InMemoryLedger {
    async fn debit(&self, amount: Money, reason: TransactionReason) -> Result<BalanceTransaction, LedgerError> {
        let mut state = self.lock()?;
        if let Some(error) = state.debit_faults.pop_front() {
            return Err(error);
        }
        if !amount.is_positive() {
            return Err(LedgerError::Rejected(format!("debit of {}", amount)));
        }
        if state.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: state.balance,
            });
        }
        Ok(Self::record(&mut state, -amount, reason))
    }

    async fn credit(&self, amount: Money, reason: TransactionReason) -> Result<BalanceTransaction, LedgerError> {
        let mut state = self.lock()?;
        if let Some(error) = state.credit_faults.pop_front() {
            return Err(error);
        }
        if !amount.is_positive() {
            return Err(LedgerError::Rejected(format!("credit of {}", amount)));
        }
        Ok(Self::record(&mut state, amount, reason))
    }

    async fn balance(&self) -> Result<Money, LedgerError> {
        Ok(self.lock()?.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;

    fn reason() -> TransactionReason {
        TransactionReason::stake(GameType::Crash, Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let ledger = InMemoryLedger::new(Money::from_cents(1_000));
        let tx = ledger.debit(Money::from_cents(300), reason()).await.unwrap();
        assert_eq!(tx.delta, Money::from_cents(-300));
        assert_eq!(tx.balance_after, Money::from_cents(700));

        ledger.credit(Money::from_cents(50), reason()).await.unwrap();
        assert_eq!(ledger.balance().await.unwrap(), Money::from_cents(750));
        assert_eq!(ledger.journal().len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let ledger = InMemoryLedger::new(Money::from_cents(100));
        let err = ledger.debit(Money::from_cents(101), reason()).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                requested: Money::from_cents(101),
                available: Money::from_cents(100),
            }
        );
        assert!(ledger.journal().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_faults_are_consumed_in_order() {
        let ledger = InMemoryLedger::new(Money::from_cents(100));
        ledger.fail_next_credits(2, LedgerError::Unavailable("down".to_string()));

        assert!(ledger.credit(Money::from_cents(10), reason()).await.is_err());
        assert!(ledger.credit(Money::from_cents(10), reason()).await.is_err());
        assert!(ledger.credit(Money::from_cents(10), reason()).await.is_ok());
        assert_eq!(ledger.balance().await.unwrap(), Money::from_cents(110));
    }

    #[tokio::test]
    async fn test_zero_amounts_rejected() {
        let ledger = InMemoryLedger::new(Money::from_cents(100));
        assert!(matches!(
            ledger.credit(Money::ZERO, reason()).await,
            Err(LedgerError::Rejected(_))
        ));
    }
}

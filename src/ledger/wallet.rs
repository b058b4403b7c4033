//! Optimistic balance cache over a [`BalanceLedger`]

use super::{BalanceLedger, BalanceTransaction, TransactionReason};
use crate::config::LedgerConfig;
use crate::errors::{EngineError, EngineResult, LedgerError, ValidationError};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A credit the ledger never confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsettledCredit {
    pub amount: Money,
    pub reason: TransactionReason,
    pub attempts: u32,
    pub last_error: String,
    pub recorded_at: DateTime<Utc>,
}

/// Engine-side view of one player's balance
///
/// The cached value moves before the ledger call and is put back if the call
/// fails, so the UI never shows a balance the ledger has refused.
pub struct Wallet<L: BalanceLedger> {
    ledger: Arc<L>,
    cached: Money,
    credit_attempts: u32,
    retry_backoff: Duration,
    unsettled: Vec<UnsettledCredit>,
}

impl<L: BalanceLedger> Wallet<L> {
    pub fn new(ledger: Arc<L>, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            cached: Money::ZERO,
            credit_attempts: config.credit_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            unsettled: Vec::new(),
        }
    }

    /// Create a wallet and load the confirmed balance
    pub async fn open(ledger: Arc<L>, config: &LedgerConfig) -> Result<Self, LedgerError> {
        let mut wallet = Self::new(ledger, config);
        wallet.refresh().await?;
        Ok(wallet)
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn cached_balance(&self) -> Money {
        self.cached
    }

    pub fn unsettled(&self) -> &[UnsettledCredit] {
        &self.unsettled
    }

    /// Replace the cache with the ledger's balance
    pub async fn refresh(&mut self) -> Result<Money, LedgerError> {
        let balance = self.ledger.balance().await?;
        if balance != self.cached {
            debug!(cached = %self.cached, confirmed = %balance, "Wallet resynced");
        }
        self.cached = balance;
        Ok(balance)
    }

    /// Check the cache without touching the ledger
    pub fn ensure_covers(&self, amount: Money) -> Result<(), ValidationError> {
        if amount > self.cached {
            return Err(ValidationError::InsufficientBalance {
                required: amount,
                available: self.cached,
            });
        }
        Ok(())
    }

    /// Debit `amount`; nothing changes unless the ledger confirms
    pub async fn debit(&mut self, amount: Money, reason: TransactionReason) -> EngineResult<BalanceTransaction> {
        self.ensure_covers(amount)?;

        let previous = self.cached;
        self.cached -= amount;

        match self.ledger.debit(amount, reason).await {
            Ok(tx) => {
                self.cached = tx.balance_after;
                Ok(tx)
            }
            Err(LedgerError::InsufficientFunds { requested, available }) => {
                // the cache was stale
                self.cached = available;
                warn!(%requested, %available, cached = %previous, "Ledger reported insufficient funds");
                Err(ValidationError::InsufficientBalance {
                    required: requested,
                    available,
                }
                .into())
            }
            Err(e) => {
                self.cached = previous;
                warn!(%amount, kind = %reason.kind, error = %e, "Debit failed, rolled back");
                Err(e.into())
            }
        }
    }

    /// Credit `amount`, retrying with exponential backoff
    ///
    /// Zero amounts are skipped. A credit that still fails after every attempt
    /// is queued as unsettled and reported as `CreditUnsettled`.
    pub async fn credit(&mut self, amount: Money, reason: TransactionReason) -> EngineResult<Option<BalanceTransaction>> {
        if !amount.is_positive() {
            return Ok(None);
        }

        let mut backoff = self.retry_backoff;
        let mut last_error = String::new();

        for attempt in 1..=self.credit_attempts {
            let previous = self.cached;
            self.cached += amount;

            match self.ledger.credit(amount, reason).await {
                Ok(tx) => {
                    self.cached = tx.balance_after;
                    if attempt > 1 {
                        info!(%amount, attempt, "Credit settled after retry");
                    }
                    return Ok(Some(tx));
                }
                Err(e) => {
                    self.cached = previous;
                    warn!(%amount, attempt, error = %e, "Credit failed");
                    last_error = e.to_string();
                }
            }

            if attempt < self.credit_attempts {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }

        self.unsettled.push(UnsettledCredit {
            amount,
            reason,
            attempts: self.credit_attempts,
            last_error: last_error.clone(),
            recorded_at: Utc::now(),
        });

        Err(EngineError::Ledger(LedgerError::CreditUnsettled {
            amount,
            attempts: self.credit_attempts,
            last_error,
        }))
    }

    /// Replay unsettled credits once each; returns the ones that settled
    pub async fn retry_unsettled(&mut self) -> Vec<UnsettledCredit> {
        let pending = std::mem::take(&mut self.unsettled);
        let mut settled = Vec::new();

        for mut credit in pending {
            match self.ledger.credit(credit.amount, credit.reason).await {
                Ok(tx) => {
                    self.cached = tx.balance_after;
                    info!(amount = %credit.amount, "Unsettled credit replayed");
                    settled.push(credit);
                }
                Err(e) => {
                    credit.attempts += 1;
                    credit.last_error = e.to_string();
                    self.unsettled.push(credit);
                }
            }
        }

        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;
    use crate::ledger::InMemoryLedger;
    use uuid::Uuid;

    fn config() -> LedgerConfig {
        LedgerConfig {
            credit_attempts: 3,
            retry_backoff_ms: 10,
        }
    }

    fn reason() -> TransactionReason {
        TransactionReason::payout(GameType::Wheel, Uuid::new_v4(), Uuid::new_v4())
    }

    async fn wallet(cents: i64) -> Wallet<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new(Money::from_cents(cents)));
        Wallet::open(ledger, &config()).await.unwrap()
    }

    #[tokio::test]
    async fn test_debit_updates_cache() {
        let mut wallet = wallet(1_000).await;
        wallet.debit(Money::from_cents(400), reason()).await.unwrap();
        assert_eq!(wallet.cached_balance(), Money::from_cents(600));
    }

    #[tokio::test]
    async fn test_debit_rejected_by_cache_never_reaches_ledger() {
        let mut wallet = wallet(100).await;
        let err = wallet.debit(Money::from_cents(200), reason()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InsufficientBalance { .. })
        ));
        assert!(wallet.ledger().journal().is_empty());
    }

    #[tokio::test]
    async fn test_failed_debit_rolls_back() {
        let mut wallet = wallet(1_000).await;
        wallet
            .ledger()
            .fail_next_debits(1, LedgerError::Unavailable("timeout".to_string()));

        let err = wallet.debit(Money::from_cents(400), reason()).await.unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::Unavailable(_))));
        assert_eq!(wallet.cached_balance(), Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_stale_cache_resyncs_on_insufficient_funds() {
        let ledger = Arc::new(InMemoryLedger::new(Money::from_cents(1_000)));
        let mut wallet = Wallet::open(ledger.clone(), &config()).await.unwrap();

        // another surface spends from the same account
        ledger.debit(Money::from_cents(900), reason()).await.unwrap();

        let err = wallet.debit(Money::from_cents(500), reason()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.cached_balance(), Money::from_cents(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_credit_retries_then_settles() {
        let mut wallet = wallet(0).await;
        wallet
            .ledger()
            .fail_next_credits(2, LedgerError::Unavailable("flaky".to_string()));

        let tx = wallet.credit(Money::from_cents(1_500), reason()).await.unwrap();
        assert_eq!(tx.unwrap().balance_after, Money::from_cents(1_500));
        assert!(wallet.unsettled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_credit_exhausts_retries_and_is_queued() {
        let mut wallet = wallet(0).await;
        wallet
            .ledger()
            .fail_next_credits(3, LedgerError::Unavailable("down".to_string()));

        let err = wallet.credit(Money::from_cents(700), reason()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::CreditUnsettled { attempts: 3, .. })
        ));
        assert_eq!(wallet.cached_balance(), Money::ZERO);
        assert_eq!(wallet.unsettled().len(), 1);

        let settled = wallet.retry_unsettled().await;
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].amount, Money::from_cents(700));
        assert!(wallet.unsettled().is_empty());
        assert_eq!(wallet.cached_balance(), Money::from_cents(700));
    }

    #[tokio::test]
    async fn test_zero_credit_is_skipped() {
        let mut wallet = wallet(0).await;
        assert!(wallet.credit(Money::ZERO, reason()).await.unwrap().is_none());
        assert!(wallet.ledger().journal().is_empty());
    }
}

//! Engine counters and observed return-to-player

use crate::ledger::{TransactionKind, UnsettledCredit};
use crate::money::Money;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct EngineMetrics {
    start_time: Instant,
    rounds_resolved: AtomicU64,
    rounds_abandoned: AtomicU64,
    bets_placed: AtomicU64,
    staked_cents: AtomicI64,
    paid_cents: AtomicI64,
    refunded_cents: AtomicI64,
    unsettled_credits: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub rounds_resolved: u64,
    pub rounds_abandoned: u64,
    pub bets_placed: u64,
    pub staked: Money,
    pub paid: Money,
    pub refunded: Money,
    pub unsettled_credits: u64,
    pub observed_rtp: f64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_resolved: AtomicU64::new(0),
            rounds_abandoned: AtomicU64::new(0),
            bets_placed: AtomicU64::new(0),
            staked_cents: AtomicI64::new(0),
            paid_cents: AtomicI64::new(0),
            refunded_cents: AtomicI64::new(0),
            unsettled_credits: AtomicU64::new(0),
        }
    }

    pub fn record_stake(&self, amount: Money) {
        self.bets_placed.fetch_add(1, Ordering::SeqCst);
        self.staked_cents.fetch_add(amount.cents(), Ordering::SeqCst);
    }

    pub fn record_payout(&self, amount: Money) {
        self.paid_cents.fetch_add(amount.cents(), Ordering::SeqCst);
    }

    /// Count the payouts among credits that settled on replay
    pub fn record_replayed(&self, settled: &[UnsettledCredit]) {
        for credit in settled.iter().filter(|c| c.reason.kind == TransactionKind::Payout) {
            self.record_payout(credit.amount);
        }
    }

    /// A refund cancels a stake rather than paying out
    pub fn record_refund(&self, amount: Money) {
        self.refunded_cents.fetch_add(amount.cents(), Ordering::SeqCst);
    }

    pub fn record_round_resolved(&self) {
        self.rounds_resolved.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_round_abandoned(&self) {
        self.rounds_abandoned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_unsettled_credit(&self) {
        self.unsettled_credits.fetch_add(1, Ordering::SeqCst);
    }

    /// Paid divided by staked, refunds excluded from both sides
    pub fn observed_rtp(&self) -> f64 {
        let staked = self.staked_cents.load(Ordering::SeqCst) - self.refunded_cents.load(Ordering::SeqCst);
        if staked <= 0 {
            return 0.0;
        }
        self.paid_cents.load(Ordering::SeqCst) as f64 / staked as f64
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_resolved: self.rounds_resolved.load(Ordering::SeqCst),
            rounds_abandoned: self.rounds_abandoned.load(Ordering::SeqCst),
            bets_placed: self.bets_placed.load(Ordering::SeqCst),
            staked: Money::from_cents(self.staked_cents.load(Ordering::SeqCst)),
            paid: Money::from_cents(self.paid_cents.load(Ordering::SeqCst)),
            refunded: Money::from_cents(self.refunded_cents.load(Ordering::SeqCst)),
            unsettled_credits: self.unsettled_credits.load(Ordering::SeqCst),
            observed_rtp: self.observed_rtp(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;
    use crate::ledger::TransactionReason;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_observed_rtp() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.observed_rtp(), 0.0);

        metrics.record_stake(Money::from_cents(1_000));
        metrics.record_stake(Money::from_cents(1_000));
        metrics.record_payout(Money::from_cents(1_500));
        assert!((metrics.observed_rtp() - 0.75).abs() < 1e-12);

        metrics.record_refund(Money::from_cents(1_000));
        assert!((metrics.observed_rtp() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.record_round_resolved();
        metrics.record_round_abandoned();
        metrics.record_unsettled_credit();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds_resolved, 1);
        assert_eq!(snapshot.rounds_abandoned, 1);
        assert_eq!(snapshot.unsettled_credits, 1);
    }

    #[test]
    fn test_replayed_refunds_are_not_payouts() {
        let metrics = EngineMetrics::new();
        let credit = |amount: i64, reason: TransactionReason| UnsettledCredit {
            amount: Money::from_cents(amount),
            reason,
            attempts: 3,
            last_error: "down".to_string(),
            recorded_at: Utc::now(),
        };
        let settled = vec![
            credit(1_500, TransactionReason::payout(GameType::Crash, Uuid::new_v4(), Uuid::new_v4())),
            credit(400, TransactionReason::refund(GameType::Crash, Uuid::new_v4(), Uuid::new_v4())),
        ];

        metrics.record_replayed(&settled);
        assert_eq!(metrics.snapshot().paid, Money::from_cents(1_500));
    }
}

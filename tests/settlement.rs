//! Ledger failures, unsettled credits and generator faults

use rand::rngs::StdRng;
use rand::SeedableRng;
use roundhouse::errors::{LedgerError, ValidationError};
use roundhouse::games::MinesBoard;
use roundhouse::ledger::{BalanceLedger, InMemoryLedger, TransactionKind};
use roundhouse::round::{CrashRoundMachine, MinesRound, RevealOutcome};
use roundhouse::{EngineConfig, EngineError, GameType, Money, RoundEvent, RoundPhase, Wallet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

async fn crash_machine(
    opening: Money,
) -> (Arc<InMemoryLedger>, CrashRoundMachine<InMemoryLedger, StdRng>, Instant) {
    let config = EngineConfig::default();
    let ledger = Arc::new(InMemoryLedger::new(opening));
    let wallet = Wallet::open(ledger.clone(), &config.ledger).await.unwrap();
    let start = Instant::now();
    let machine = CrashRoundMachine::new(GameType::Crash, &config, wallet, StdRng::seed_from_u64(5), start).unwrap();
    (ledger, machine, start)
}

fn unavailable() -> LedgerError {
    LedgerError::Unavailable("ledger offline".to_string())
}

#[tokio::test(start_paused = true)]
async fn test_failed_debit_leaves_no_bet() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(50.0)).await;
    ledger.fail_next_debits(1, unavailable());

    let err = machine.place_bet(0, Money::from_decimal(5.0), None, start).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Unavailable(_))));
    assert!(machine.slots().get(0).unwrap().is_none());
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(50.0));
    assert!(ledger.journal().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_cache_resyncs_on_ledger_insufficient_funds() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(50.0)).await;
    ledger.fail_next_debits(
        1,
        LedgerError::InsufficientFunds {
            requested: Money::from_decimal(20.0),
            available: Money::from_decimal(3.0),
        },
    );

    let err = machine.place_bet(0, Money::from_decimal(20.0), None, start).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::InsufficientBalance { .. })
    ));
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(3.0));
    assert!(machine.slots().get(0).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_cached_balance_never_reaches_ledger() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(1.0)).await;
    ledger.fail_next_debits(1, unavailable());

    let err = machine.place_bet(0, Money::from_decimal(2.0), None, start).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::InsufficientBalance { .. })
    ));

    // the queued fault is still there for the next real call
    assert!(ledger.debit(Money::from_cents(10), reason()).await.is_err());
}

fn reason() -> roundhouse::ledger::TransactionReason {
    roundhouse::ledger::TransactionReason::stake(GameType::Crash, uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
}

#[tokio::test(start_paused = true)]
async fn test_credit_retry_recovers() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(50.0)).await;
    machine.queue_draw(0.5);
    machine.place_bet(0, Money::from_decimal(10.0), Some(1.5), start).await.unwrap();
    ledger.fail_next_credits(2, unavailable());

    machine.tick(start + Duration::from_secs(9)).await;
    assert!(machine.wallet().unsettled().is_empty());
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(55.0));
    assert_eq!(ledger.balance().await.unwrap(), Money::from_decimal(55.0));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_credit_is_kept_and_replayed_next_cycle() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(50.0)).await;
    let mut events = machine.subscribe();
    machine.queue_draw(0.5);
    machine.place_bet(0, Money::from_decimal(10.0), Some(1.5), start).await.unwrap();
    ledger.fail_next_credits(3, unavailable());

    machine.tick(start + Duration::from_secs(9)).await;
    let unsettled = machine.wallet().unsettled();
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].amount, Money::from_decimal(15.0));
    assert_eq!(unsettled[0].attempts, 3);
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(40.0));
    assert_eq!(machine.metrics().snapshot().unsettled_credits, 1);
    assert_eq!(machine.metrics().snapshot().paid, Money::ZERO);

    let mut reported = false;
    while let Ok(event) = events.try_recv() {
        if let RoundEvent::CreditUnsettled { amount, .. } = event {
            reported = amount == Money::from_decimal(15.0);
        }
    }
    assert!(reported);

    // next cycle replays it
    machine.tick(start + Duration::from_secs(11)).await;
    assert_eq!(machine.round().cycle(), 2);
    assert!(machine.wallet().unsettled().is_empty());
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(55.0));
    let payouts = ledger
        .journal()
        .into_iter()
        .filter(|tx| tx.reason.kind == TransactionKind::Payout)
        .count();
    assert_eq!(payouts, 1);
    assert_eq!(machine.metrics().snapshot().paid, Money::from_decimal(15.0));
}

#[tokio::test(start_paused = true)]
async fn test_generator_fault_refunds_every_stake() {
    let (ledger, mut machine, start) = crash_machine(Money::from_decimal(50.0)).await;
    let mut events = machine.subscribe();
    machine.place_bet(0, Money::from_decimal(10.0), Some(2.0), start).await.unwrap();
    machine.place_bet(1, Money::from_decimal(5.0), None, start).await.unwrap();
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(35.0));

    // r = 0 has no crash point
    machine.queue_draw(0.0);
    machine.tick(start + Duration::from_secs(5)).await;

    assert_eq!(machine.phase(), RoundPhase::Waiting);
    assert_eq!(machine.round().cycle(), 2);
    assert!(machine.slots().bets().next().is_none());
    assert_eq!(machine.wallet().cached_balance(), Money::from_decimal(50.0));
    assert_eq!(ledger.balance().await.unwrap(), Money::from_decimal(50.0));

    let refunds = ledger
        .journal()
        .into_iter()
        .filter(|tx| tx.reason.kind == TransactionKind::Refund)
        .count();
    assert_eq!(refunds, 2);

    let snapshot = machine.metrics().snapshot();
    assert_eq!(snapshot.rounds_abandoned, 1);
    assert_eq!(snapshot.refunded, Money::from_decimal(15.0));

    let mut abandoned = None;
    while let Ok(event) = events.try_recv() {
        if let RoundEvent::RoundAbandoned { refunded, .. } = event {
            abandoned = Some(refunded);
        }
    }
    assert_eq!(abandoned, Some(Money::from_decimal(15.0)));
}

#[tokio::test(start_paused = true)]
async fn test_mines_payout_survives_ledger_outage() {
    let config = EngineConfig::default();
    let ledger = Arc::new(InMemoryLedger::new(Money::from_decimal(20.0)));
    let wallet = Wallet::open(ledger.clone(), &config.ledger).await.unwrap();
    let now = Instant::now();
    let mut round = MinesRound::new(&config, wallet, StdRng::seed_from_u64(1), now).unwrap();

    let board = MinesBoard::from_layout(25, &[0, 1, 2, 3, 4]).unwrap();
    round.start_with_board(Money::from_decimal(10.0), board, now).await.unwrap();
    assert!(matches!(
        round.reveal(12, now).await.unwrap(),
        RevealOutcome::Safe { picks: 1, .. }
    ));

    ledger.fail_next_credits(3, unavailable());
    let err = round.cashout(now).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::CreditUnsettled { .. })));
    assert_eq!(round.phase(), RoundPhase::Resolved);
    assert_eq!(round.wallet().unsettled().len(), 1);

    // the bet is settled, a second cashout does not pay twice
    assert!(round.cashout(now).await.unwrap().is_none());
    assert_eq!(round.wallet().unsettled().len(), 1);

    // the next round pays it before taking the new stake
    round.start(Money::from_decimal(5.0), 3, now).await.unwrap();
    assert_eq!(round.round().cycle(), 2);
    assert!(round.wallet().unsettled().is_empty());
    assert_eq!(ledger.balance().await.unwrap(), Money::from_cents(1_738));
}

#[tokio::test(start_paused = true)]
async fn test_mines_failed_debit_leaves_resolved_round_alone() {
    let config = EngineConfig::default();
    let ledger = Arc::new(InMemoryLedger::new(Money::from_decimal(20.0)));
    let wallet = Wallet::open(ledger.clone(), &config.ledger).await.unwrap();
    let now = Instant::now();
    let mut round = MinesRound::new(&config, wallet, StdRng::seed_from_u64(2), now).unwrap();

    let board = MinesBoard::from_layout(25, &[6]).unwrap();
    round.start_with_board(Money::from_decimal(2.0), board, now).await.unwrap();
    assert!(matches!(round.reveal(6, now).await.unwrap(), RevealOutcome::Mine { .. }));
    let resolved = round.round().id();

    ledger.fail_next_debits(1, unavailable());
    let err = round.start(Money::from_decimal(2.0), 5, now).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Unavailable(_))));
    assert_eq!(round.round().id(), resolved);
    assert_eq!(round.round().cycle(), 1);
    assert_eq!(round.phase(), RoundPhase::Resolved);
    assert!(round.bet().is_some());
    assert_eq!(round.wallet().cached_balance(), Money::from_decimal(18.0));
}

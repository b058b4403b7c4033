//! Continuous multiplier round
//!
//! The crash point is drawn when the round starts running. From then on the
//! curve is a pure function of elapsed time, so every decision (auto-collect,
//! manual cashout, crash) is evaluated at the instant it belongs to, whatever
//! tick happened to observe it.

use super::bet::Bet;
use super::driver::Tickable;
use super::slots::BetSlots;
use super::watcher::{AutoCollect, AutoResolutionWatcher};
use super::{Round, RoundPhase};
use crate::config::{CrashConfig, EngineConfig};
use crate::errors::{EngineError, EngineResult, ValidationError};
use crate::events::{EventBus, RoundEvent};
use crate::games::crash::{CrashCurve, CrashPoint};
use crate::games::{GameType, Settlement};
use crate::ledger::{BalanceLedger, TransactionReason, Wallet};
use crate::metrics::EngineMetrics;
use crate::money::{BetLimits, Money};
use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct CrashRoundMachine<L: BalanceLedger, R: Rng> {
    game: GameType,
    config: CrashConfig,
    limits: BetLimits,
    curve: CrashCurve,
    wallet: Wallet<L>,
    rng: R,
    round: Round,
    slots: BetSlots,
    crash_point: Option<CrashPoint>,
    queued_draw: Option<f64>,
    history: VecDeque<CrashPoint>,
    events: EventBus,
    metrics: Arc<EngineMetrics>,
}

impl<L: BalanceLedger, R: Rng + Send> CrashRoundMachine<L, R> {
    /// Start in `Waiting` at `now`
    pub fn new(game: GameType, config: &EngineConfig, wallet: Wallet<L>, rng: R, now: Instant) -> EngineResult<Self> {
        config.validate()?;
        let curve = CrashCurve::from_config(&config.crash)?;

        Ok(Self {
            game,
            config: config.crash.clone(),
            limits: config.bets.limits(),
            curve,
            wallet,
            rng,
            round: Round::new(1, now),
            slots: BetSlots::new(config.crash.bet_slots),
            crash_point: None,
            queued_draw: None,
            history: VecDeque::with_capacity(config.crash.history_len),
            events: EventBus::new(config.monitoring.event_capacity),
            metrics: Arc::new(EngineMetrics::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    pub fn slots(&self) -> &BetSlots {
        &self.slots
    }

    pub fn wallet(&self) -> &Wallet<L> {
        &self.wallet
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Past crash points, newest first
    pub fn history(&self) -> impl Iterator<Item = &CrashPoint> {
        self.history.iter()
    }

    /// The crash point, once the round has resolved
    pub fn revealed_crash_point(&self) -> Option<CrashPoint> {
        match self.round.phase() {
            RoundPhase::Resolved => self.crash_point,
            _ => None,
        }
    }

    /// Use `r` instead of the RNG for the next crash point draw
    pub fn queue_draw(&mut self, r: f64) {
        self.queued_draw = Some(r);
    }

    fn crash_instant(&self, point: CrashPoint) -> Instant {
        self.round.phase_started_at() + self.curve.time_to_reach(point.value())
    }

    fn live_at(&self, at: Instant, point: CrashPoint) -> f64 {
        if at >= self.crash_instant(point) {
            return point.value();
        }
        let elapsed = self.round.elapsed_in_phase(at);
        self.curve.multiplier_at(elapsed).min(point.value())
    }

    /// Displayed multiplier at `now`; `None` before the round runs
    pub fn live_multiplier(&self, now: Instant) -> Option<f64> {
        let point = self.crash_point?;
        match self.round.phase() {
            RoundPhase::Waiting => None,
            RoundPhase::Running => Some(self.live_at(now, point)),
            RoundPhase::Resolved => Some(point.value()),
        }
    }

    /// Place a stake in `slot` for the upcoming run
    pub async fn place_bet(
        &mut self,
        slot: usize,
        stake: Money,
        auto_collect_at: Option<f64>,
        now: Instant,
    ) -> EngineResult<Uuid> {
        self.tick(now).await;

        let phase = self.round.phase();
        if phase != RoundPhase::Waiting {
            return Err(ValidationError::WrongPhase {
                action: "place a bet",
                phase,
            }
            .into());
        }
        self.limits.check(stake)?;
        if let Some(target) = auto_collect_at {
            // also rejects NaN
            if !(target >= self.config.min_auto_collect) {
                return Err(ValidationError::AutoCollectTooLow {
                    requested: target,
                    minimum: self.config.min_auto_collect,
                }
                .into());
            }
        }
        self.slots.ensure_free(slot)?;

        let round_id = self.round.id();
        let bet = Bet::queued(round_id, slot, stake, auto_collect_at);
        let bet_id = bet.id;
        self.wallet
            .debit(stake, TransactionReason::stake(self.game, round_id, bet_id))
            .await?;
        self.slots.insert(bet)?;

        self.metrics.record_stake(stake);
        self.events.publish(RoundEvent::BetPlaced {
            game: self.game,
            round_id,
            bet_id,
            slot,
            stake,
        });
        info!(game = %self.game, %round_id, %bet_id, slot, %stake, ?auto_collect_at, "Bet placed");

        Ok(bet_id)
    }

    /// Withdraw a queued bet and refund its stake
    ///
    /// Once the round runs the stake stays withheld until it resolves.
    pub async fn cancel_bet(&mut self, slot: usize, now: Instant) -> EngineResult<Money> {
        self.tick(now).await;

        let phase = self.round.phase();
        let bet = self.slots.get(slot)?.ok_or(ValidationError::NoBetInSlot(slot))?;
        if bet.is_active() {
            return Err(ValidationError::CancelWhileRunning { slot }.into());
        }
        if !bet.is_queued() || phase != RoundPhase::Waiting {
            return Err(ValidationError::WrongPhase {
                action: "cancel a bet",
                phase,
            }
            .into());
        }

        let (bet_id, stake) = (bet.id, bet.stake);
        let round_id = self.round.id();
        let refund = self
            .wallet
            .credit(stake, TransactionReason::refund(self.game, round_id, bet_id))
            .await;

        // cancelled either way; a failed refund waits in the unsettled queue
        if let Some(mut bet) = self.slots.take(slot) {
            if let Err(violation) = bet.cancel() {
                debug!(%violation, "Cancel ignored");
            }
        }
        self.metrics.record_refund(stake);
        self.events.publish(RoundEvent::BetCancelled {
            game: self.game,
            round_id,
            bet_id,
            slot,
            refunded: stake,
        });
        info!(game = %self.game, %round_id, %bet_id, slot, %stake, "Bet cancelled");

        match refund {
            Ok(_) => Ok(stake),
            Err(e) => {
                self.report_unsettled(stake, &e);
                Err(e)
            }
        }
    }

    /// Collect `slot` at the live multiplier
    ///
    /// Auto-collects crossed before `now` settle first. Returns `Ok(None)` when
    /// the bet was already settled.
    pub async fn cashout(&mut self, slot: usize, now: Instant) -> EngineResult<Option<Settlement>> {
        self.tick(now).await;

        let bet = self.slots.get(slot)?.ok_or(ValidationError::NoBetInSlot(slot))?;
        if bet.state().is_terminal() {
            debug!(slot, state = bet.state().name(), "Cashout on settled bet ignored");
            return Ok(None);
        }

        let phase = self.round.phase();
        let point = match (phase, self.crash_point) {
            (RoundPhase::Running, Some(point)) => point,
            _ => {
                return Err(ValidationError::WrongPhase {
                    action: "cash out",
                    phase,
                }
                .into())
            }
        };

        let live = self.live_at(now, point);
        self.settle(slot, live, false).await
    }

    async fn settle(&mut self, slot: usize, multiplier: f64, automatic: bool) -> EngineResult<Option<Settlement>> {
        let round_id = self.round.id();
        let bet = self.slots.bet_mut(slot)?;
        let payout = match bet.collect(multiplier) {
            Ok(payout) => payout,
            Err(violation) => {
                debug!(%violation, "Collect ignored");
                return Ok(None);
            }
        };

        let settlement = Settlement {
            bet_id: bet.id,
            round_id,
            game: self.game,
            stake: bet.stake,
            multiplier,
            payout,
        };

        self.events.publish(RoundEvent::BetCollected {
            game: self.game,
            round_id,
            bet_id: settlement.bet_id,
            slot,
            multiplier,
            payout,
            automatic,
        });
        info!(
            game = %self.game,
            %round_id,
            bet_id = %settlement.bet_id,
            slot,
            multiplier,
            %payout,
            automatic,
            "Bet collected"
        );

        match self
            .wallet
            .credit(payout, TransactionReason::payout(self.game, round_id, settlement.bet_id))
            .await
        {
            Ok(_) => {
                self.metrics.record_payout(payout);
                Ok(Some(settlement))
            }
            Err(e) => {
                self.report_unsettled(payout, &e);
                Err(e)
            }
        }
    }

    async fn settle_auto_collects(&mut self, live: f64) {
        let Some(point) = self.crash_point else {
            return;
        };
        let due = AutoResolutionWatcher::new(point.value()).due(&self.slots, live);
        for AutoCollect { slot, threshold } in due {
            if let Err(e) = self.settle(slot, threshold, true).await {
                warn!(slot, error = %e, "Auto-collect credit not confirmed");
            }
        }
    }

    fn report_unsettled(&self, amount: Money, error: &EngineError) {
        self.metrics.record_unsettled_credit();
        self.events.publish(RoundEvent::CreditUnsettled {
            game: self.game,
            round_id: self.round.id(),
            amount,
            error: error.to_string(),
        });
    }

    async fn start_running(&mut self, at: Instant) {
        let draw = match self.queued_draw.take() {
            Some(r) => self.curve.crash_point_for(r),
            None => self.curve.draw(&mut self.rng),
        };

        let point = match draw {
            Ok(point) => point,
            Err(fault) => {
                self.abandon(at, fault.to_string()).await;
                return;
            }
        };

        if let Err(violation) = self.round.advance(RoundPhase::Running, at) {
            self.abandon(at, violation.to_string()).await;
            return;
        }

        for bet in self.slots.bets_mut() {
            if let Err(violation) = bet.activate() {
                debug!(%violation, "Activation ignored");
            }
        }
        self.crash_point = Some(point);

        self.events.publish(RoundEvent::PhaseChanged {
            game: self.game,
            round_id: self.round.id(),
            cycle: self.round.cycle(),
            phase: RoundPhase::Running,
        });
        info!(
            game = %self.game,
            round_id = %self.round.id(),
            cycle = self.round.cycle(),
            bets = self.slots.bets().count(),
            "Round running"
        );
    }

    fn crash(&mut self, at: Instant, point: CrashPoint) {
        let round_id = self.round.id();
        let mut lost = Vec::new();
        for bet in self.slots.bets_mut().filter(|b| b.is_active()) {
            match bet.lose() {
                Ok(()) => lost.push((bet.id, bet.slot, bet.stake)),
                Err(violation) => debug!(%violation, "Loss ignored"),
            }
        }

        if let Err(violation) = self.round.advance(RoundPhase::Resolved, at) {
            debug!(%violation, "Crash transition ignored");
        }

        self.history.push_front(point);
        self.history.truncate(self.config.history_len);
        self.metrics.record_round_resolved();

        for (bet_id, slot, stake) in &lost {
            self.events.publish(RoundEvent::BetLost {
                game: self.game,
                round_id,
                bet_id: *bet_id,
                slot: *slot,
                stake: *stake,
            });
        }
        self.events.publish(RoundEvent::Crashed {
            game: self.game,
            round_id,
            crash_point: point,
        });
        self.events.publish(RoundEvent::PhaseChanged {
            game: self.game,
            round_id,
            cycle: self.round.cycle(),
            phase: RoundPhase::Resolved,
        });
        info!(game = %self.game, %round_id, crash_point = %point, lost = lost.len(), "Round crashed");
    }

    /// Refund every withheld stake and move to a fresh round
    async fn abandon(&mut self, at: Instant, reason: String) {
        let round_id = self.round.id();
        let mut refunded = Money::ZERO;

        for mut bet in self.slots.clear() {
            if !(bet.is_queued() || bet.is_active()) {
                continue;
            }
            if bet.is_queued() {
                if let Err(violation) = bet.cancel() {
                    debug!(%violation, "Cancel ignored");
                }
            }
            match self
                .wallet
                .credit(bet.stake, TransactionReason::refund(self.game, round_id, bet.id))
                .await
            {
                Ok(_) => {}
                Err(e) => self.report_unsettled(bet.stake, &e),
            }
            self.metrics.record_refund(bet.stake);
            refunded += bet.stake;
        }

        self.metrics.record_round_abandoned();
        self.events.publish(RoundEvent::RoundAbandoned {
            game: self.game,
            round_id,
            reason: reason.clone(),
            refunded,
        });
        warn!(game = %self.game, %round_id, %reason, %refunded, "Round abandoned");

        self.round = self.round.successor_after_fault(at);
        self.crash_point = None;
        self.publish_waiting();
    }

    async fn begin_next_cycle(&mut self, at: Instant) {
        self.round = match self.round.next_cycle(at) {
            Ok(next) => next,
            Err(violation) => {
                debug!(%violation, "Cycle handover forced");
                self.round.successor_after_fault(at)
            }
        };
        self.slots.clear();
        self.crash_point = None;

        if !self.wallet.unsettled().is_empty() {
            let settled = self.wallet.retry_unsettled().await;
            self.metrics.record_replayed(&settled);
            debug!(settled = settled.len(), remaining = self.wallet.unsettled().len(), "Replayed unsettled credits");
        }
        if let Err(e) = self.wallet.refresh().await {
            warn!(error = %e, "Balance refresh failed, keeping cached value");
        }

        self.publish_waiting();
    }

    fn publish_waiting(&self) {
        self.events.publish(RoundEvent::PhaseChanged {
            game: self.game,
            round_id: self.round.id(),
            cycle: self.round.cycle(),
            phase: RoundPhase::Waiting,
        });
    }

    /// Advance through every phase boundary at or before `now`
    pub async fn tick(&mut self, now: Instant) {
        loop {
            match self.round.phase() {
                RoundPhase::Waiting => {
                    let deadline = self.round.phase_started_at() + self.config.waiting();
                    if now < deadline {
                        break;
                    }
                    self.start_running(deadline).await;
                }
                RoundPhase::Running => {
                    let Some(point) = self.crash_point else {
                        self.abandon(now, "running without a crash point".to_string()).await;
                        continue;
                    };
                    let crash_at = self.crash_instant(point);
                    let live = self.live_at(now.min(crash_at), point);
                    self.settle_auto_collects(live).await;
                    if now < crash_at {
                        break;
                    }
                    self.crash(crash_at, point);
                }
                RoundPhase::Resolved => {
                    let deadline = self.round.phase_started_at() + self.config.cooldown();
                    if now < deadline {
                        break;
                    }
                    self.begin_next_cycle(deadline).await;
                }
            }
        }
    }
}

#[async_trait]
impl<L: BalanceLedger, R: Rng + Send> Tickable for CrashRoundMachine<L, R> {
    fn game(&self) -> GameType {
        self.game
    }

    fn cycle(&self) -> u64 {
        self.round.cycle()
    }

    async fn tick(&mut self, now: Instant) {
        CrashRoundMachine::tick(self, now).await
    }
}

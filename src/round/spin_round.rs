//! One-shot spin rounds: wheel, roulette and case opening
//!
//! The outcome and its payout are fixed when the spin starts. `Running` only
//! lasts as long as the animation, and the payout is credited once on entering
//! `Resolved`.

use super::bet::Bet;
use super::driver::Tickable;
use super::{Round, RoundPhase};
use crate::config::{CaseConfig, EngineConfig, RouletteConfig, SpinTiming, WheelConfig};
use crate::errors::{EngineError, EngineResult, RoundFault, ValidationError};
use crate::events::{EventBus, RoundEvent};
use crate::games::cases::{Case, CaseItem, Inventory};
use crate::games::roulette::{self, PocketColor, RouletteLayout};
use crate::games::upgrader::{self, UpgradeOutcome};
use crate::games::wheel::{RiskLevel, SegmentCount, Wheel};
use crate::games::GameType;
use crate::ledger::{BalanceLedger, TransactionReason, Wallet};
use crate::metrics::EngineMetrics;
use crate::money::{BetLimits, Money};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A game whose whole outcome is drawn in one step
pub trait SpinGame: Send {
    type Wager: Clone + fmt::Debug + Send + Sync;
    type Outcome: Clone + fmt::Debug + Send + Sync;

    fn game(&self) -> GameType;

    /// Amount debited for `wager`
    fn stake(&self, wager: &Self::Wager) -> Result<Money, ValidationError>;

    fn timing(&self, wager: &Self::Wager) -> SpinTiming;

    fn draw<R: Rng + ?Sized>(&mut self, wager: &Self::Wager, rng: &mut R) -> Result<Self::Outcome, RoundFault>;

    /// Value won by `wager` on `outcome`
    fn payout(&self, wager: &Self::Wager, outcome: &Self::Outcome) -> Result<Money, RoundFault>;

    /// Index reported on the event stream
    fn outcome_index(&self, outcome: &Self::Outcome) -> usize;

    /// Whether the payout is credited as balance rather than paid in kind
    fn credits_balance(&self, _wager: &Self::Wager) -> bool {
        true
    }

    fn on_resolved(&mut self, _wager: &Self::Wager, _outcome: &Self::Outcome) {}
}

/// What the caller learns as soon as a spin starts
#[derive(Debug, Clone, Serialize)]
pub struct SpinTicket<O> {
    pub bet_id: Uuid,
    pub round_id: Uuid,
    pub stake: Money,
    pub outcome: O,
    pub payout: Money,
    #[serde(skip)]
    pub resolves_at: Instant,
}

struct Spin<G: SpinGame> {
    bet: Bet,
    wager: G::Wager,
    outcome: G::Outcome,
    payout: Money,
}

pub struct SpinRoundMachine<G: SpinGame, L: BalanceLedger, R: Rng> {
    game: G,
    limits: BetLimits,
    wallet: Wallet<L>,
    rng: R,
    round: Round,
    timing: SpinTiming,
    current: Option<Spin<G>>,
    events: EventBus,
    metrics: Arc<EngineMetrics>,
}

impl<G: SpinGame, L: BalanceLedger, R: Rng + Send> SpinRoundMachine<G, L, R> {
    pub fn new(game: G, config: &EngineConfig, wallet: Wallet<L>, rng: R, now: Instant) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            game,
            limits: config.bets.limits(),
            wallet,
            rng,
            round: Round::new(1, now),
            timing: SpinTiming::new(0, 0),
            current: None,
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

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    pub fn wallet(&self) -> &Wallet<L> {
        &self.wallet
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Bet of the current or most recent spin
    pub fn bet(&self) -> Option<&Bet> {
        self.current.as_ref().map(|spin| &spin.bet)
    }

    /// Outcome of the current or most recent spin
    pub fn outcome(&self) -> Option<&G::Outcome> {
        self.current.as_ref().map(|spin| &spin.outcome)
    }

    /// Debit the wager, draw the outcome and start the animation
    pub async fn spin(&mut self, wager: G::Wager, now: Instant) -> EngineResult<SpinTicket<G::Outcome>> {
        self.tick(now).await;

        let phase = self.round.phase();
        if phase != RoundPhase::Waiting {
            return Err(ValidationError::WrongPhase { action: "spin", phase }.into());
        }
        let stake = self.game.stake(&wager)?;
        self.limits.check(stake)?;

        let game = self.game.game();
        let round_id = self.round.id();
        let bet = Bet::active(round_id, stake);
        let bet_id = bet.id;
        self.wallet
            .debit(stake, TransactionReason::stake(game, round_id, bet_id))
            .await?;
        self.metrics.record_stake(stake);
        self.events.publish(RoundEvent::BetPlaced {
            game,
            round_id,
            bet_id,
            slot: 0,
            stake,
        });

        let drawn = match self.game.draw(&wager, &mut self.rng) {
            Ok(outcome) => self.game.payout(&wager, &outcome).map(|payout| (outcome, payout)),
            Err(fault) => Err(fault),
        };
        let (outcome, payout) = match drawn {
            Ok(drawn) => drawn,
            Err(fault) => {
                self.abandon(bet, now, fault.to_string()).await;
                return Err(fault.into());
            }
        };

        self.round.advance(RoundPhase::Running, now)?;
        self.timing = self.game.timing(&wager);
        self.current = Some(Spin {
            bet,
            wager,
            outcome: outcome.clone(),
            payout,
        });
        self.publish_phase();
        info!(%game, %round_id, %bet_id, %stake, ?outcome, %payout, "Spin started");

        Ok(SpinTicket {
            bet_id,
            round_id,
            stake,
            outcome,
            payout,
            resolves_at: now + self.timing.spin,
        })
    }

    async fn abandon(&mut self, bet: Bet, at: Instant, reason: String) {
        let game = self.game.game();
        let round_id = self.round.id();
        if let Err(e) = self
            .wallet
            .credit(bet.stake, TransactionReason::refund(game, round_id, bet.id))
            .await
        {
            self.report_unsettled(bet.stake, &e);
        }
        self.metrics.record_refund(bet.stake);
        self.metrics.record_round_abandoned();
        self.events.publish(RoundEvent::RoundAbandoned {
            game,
            round_id,
            reason: reason.clone(),
            refunded: bet.stake,
        });
        warn!(%game, %round_id, %reason, refunded = %bet.stake, "Spin abandoned");

        self.round = self.round.successor_after_fault(at);
        self.publish_phase();
    }

    async fn resolve(&mut self, at: Instant) {
        let game = self.game.game();
        let round_id = self.round.id();
        if let Err(violation) = self.round.advance(RoundPhase::Resolved, at) {
            debug!(%violation, "Resolve ignored");
            return;
        }
        self.metrics.record_round_resolved();

        let Some(spin) = self.current.as_mut() else {
            self.publish_phase();
            return;
        };
        if let Err(violation) = spin.bet.settle_payout(spin.payout) {
            debug!(%violation, "Settlement ignored");
        }
        let (bet_id, payout) = (spin.bet.id, spin.payout);
        let credits = self.game.credits_balance(&spin.wager);
        let outcome = self.game.outcome_index(&spin.outcome);
        self.game.on_resolved(&spin.wager, &spin.outcome);

        let credited = if credits && payout.is_positive() {
            match self
                .wallet
                .credit(payout, TransactionReason::payout(game, round_id, bet_id))
                .await
            {
                Ok(_) => self.metrics.record_payout(payout),
                Err(e) => {
                    warn!(%game, %round_id, error = %e, "Spin payout not confirmed");
                    self.report_unsettled(payout, &e);
                }
            }
            payout
        } else {
            Money::ZERO
        };

        self.events.publish(RoundEvent::SpinResolved {
            game,
            round_id,
            outcome,
            payout: credited,
        });
        self.publish_phase();
        info!(%game, %round_id, %bet_id, outcome, payout = %credited, "Spin resolved");
    }

    async fn begin_next_cycle(&mut self, at: Instant) {
        self.round = match self.round.next_cycle(at) {
            Ok(next) => next,
            Err(violation) => {
                debug!(%violation, "Cycle handover forced");
                self.round.successor_after_fault(at)
            }
        };

        if !self.wallet.unsettled().is_empty() {
            let settled = self.wallet.retry_unsettled().await;
            self.metrics.record_replayed(&settled);
            debug!(settled = settled.len(), remaining = self.wallet.unsettled().len(), "Replayed unsettled credits");
        }
        if let Err(e) = self.wallet.refresh().await {
            warn!(error = %e, "Balance refresh failed, keeping cached value");
        }
        self.publish_phase();
    }

    fn report_unsettled(&self, amount: Money, error: &EngineError) {
        self.metrics.record_unsettled_credit();
        self.events.publish(RoundEvent::CreditUnsettled {
            game: self.game.game(),
            round_id: self.round.id(),
            amount,
            error: error.to_string(),
        });
    }

    fn publish_phase(&self) {
        self.events.publish(RoundEvent::PhaseChanged {
            game: self.game.game(),
            round_id: self.round.id(),
            cycle: self.round.cycle(),
            phase: self.round.phase(),
        });
    }

    /// Advance through every phase boundary at or before `now`
    pub async fn tick(&mut self, now: Instant) {
        loop {
            match self.round.phase() {
                RoundPhase::Waiting => break,
                RoundPhase::Running => {
                    let deadline = self.round.phase_started_at() + self.timing.spin;
                    if now < deadline {
                        break;
                    }
                    self.resolve(deadline).await;
                }
                RoundPhase::Resolved => {
                    let deadline = self.round.phase_started_at() + self.timing.cooldown;
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
impl<G: SpinGame, L: BalanceLedger, R: Rng + Send> Tickable for SpinRoundMachine<G, L, R> {
    fn game(&self) -> GameType {
        self.game.game()
    }

    fn cycle(&self) -> u64 {
        self.round.cycle()
    }

    async fn tick(&mut self, now: Instant) {
        SpinRoundMachine::tick(self, now).await
    }
}

// Wheel

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelBet {
    pub stake: Money,
    pub risk: RiskLevel,
    pub segments: SegmentCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WheelOutcome {
    pub segment: usize,
    pub multiplier: f64,
}

pub struct WheelGame {
    config: WheelConfig,
}

impl WheelGame {
    pub fn new(config: &WheelConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Bet on the configured default wheel
    pub fn bet(&self, stake: Money) -> WheelBet {
        WheelBet {
            stake,
            risk: self.config.default_risk,
            segments: self.config.default_segments,
        }
    }
}

impl SpinGame for WheelGame {
    type Wager = WheelBet;
    type Outcome = WheelOutcome;

    fn game(&self) -> GameType {
        GameType::Wheel
    }

    fn stake(&self, wager: &WheelBet) -> Result<Money, ValidationError> {
        Ok(wager.stake)
    }

    fn timing(&self, _wager: &WheelBet) -> SpinTiming {
        self.config.phase_timing()
    }

    fn draw<R: Rng + ?Sized>(&mut self, wager: &WheelBet, rng: &mut R) -> Result<WheelOutcome, RoundFault> {
        let wheel = Wheel::new(wager.risk, wager.segments);
        let segment = wheel.spin(rng);
        Ok(WheelOutcome {
            segment,
            multiplier: wheel.multiplier(segment)?,
        })
    }

    fn payout(&self, wager: &WheelBet, outcome: &WheelOutcome) -> Result<Money, RoundFault> {
        Wheel::new(wager.risk, wager.segments).payout(wager.stake, outcome.segment)
    }

    fn outcome_index(&self, outcome: &WheelOutcome) -> usize {
        outcome.segment
    }
}

// Roulette

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouletteOutcome {
    pub number: u8,
    pub color: PocketColor,
}

pub struct RouletteGame {
    config: RouletteConfig,
    layout: RouletteLayout,
    history: VecDeque<u8>,
}

impl RouletteGame {
    pub fn new(config: &RouletteConfig) -> Self {
        Self {
            config: config.clone(),
            layout: RouletteLayout::new(),
            history: VecDeque::with_capacity(config.history_len),
        }
    }

    pub fn layout(&self) -> &RouletteLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut RouletteLayout {
        &mut self.layout
    }

    /// Winning numbers, newest first
    pub fn history(&self) -> impl Iterator<Item = &u8> {
        self.history.iter()
    }
}

impl SpinGame for RouletteGame {
    type Wager = RouletteLayout;
    type Outcome = RouletteOutcome;

    fn game(&self) -> GameType {
        GameType::Roulette
    }

    fn stake(&self, wager: &RouletteLayout) -> Result<Money, ValidationError> {
        if wager.is_empty() {
            return Err(ValidationError::EmptyWager);
        }
        Ok(wager.total())
    }

    fn timing(&self, _wager: &RouletteLayout) -> SpinTiming {
        self.config.phase_timing()
    }

    fn draw<R: Rng + ?Sized>(&mut self, _wager: &RouletteLayout, rng: &mut R) -> Result<RouletteOutcome, RoundFault> {
        let number = roulette::spin(rng);
        if number >= roulette::POCKETS {
            return Err(RoundFault::OutcomeOutOfRange(format!("pocket {}", number)));
        }
        Ok(RouletteOutcome {
            number,
            color: roulette::pocket_color(number),
        })
    }

    fn payout(&self, wager: &RouletteLayout, outcome: &RouletteOutcome) -> Result<Money, RoundFault> {
        Ok(wager.payout(outcome.number))
    }

    fn outcome_index(&self, outcome: &RouletteOutcome) -> usize {
        outcome.number as usize
    }

    fn on_resolved(&mut self, _wager: &RouletteLayout, outcome: &RouletteOutcome) {
        self.history.push_front(outcome.number);
        self.history.truncate(self.config.history_len);
    }
}

impl<L: BalanceLedger, R: Rng + Send> SpinRoundMachine<RouletteGame, L, R> {
    /// Spin the chips on the table, then clear it and keep them for a rebet
    pub async fn spin_table(&mut self, now: Instant) -> EngineResult<SpinTicket<RouletteOutcome>> {
        let layout = self.game.layout.clone();
        let ticket = self.spin(layout, now).await?;
        self.game.layout.commit();
        self.game.layout.clear();
        Ok(ticket)
    }
}

// Cases

/// What happens to opened items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Credit the item prices
    Sell,
    /// Add the items to the inventory
    Keep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOpening {
    pub case_id: String,
    pub count: u32,
    pub disposition: Disposition,
    /// Shortened animation
    pub quick: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub case_id: String,
    /// Winning item index per unit opened
    pub winners: Vec<usize>,
    pub items: Vec<CaseItem>,
    /// One animation strip per unit, winner at the fixed index
    pub reels: Vec<Vec<usize>>,
}

impl CaseOutcome {
    pub fn value(&self) -> Money {
        self.items.iter().map(|item| item.price).sum()
    }
}

pub struct CaseGame {
    config: CaseConfig,
    cases: Vec<Case>,
    inventory: Inventory,
}

impl CaseGame {
    pub fn new(config: &CaseConfig, cases: Vec<Case>) -> Self {
        Self {
            config: config.clone(),
            cases,
            inventory: Inventory::new(),
        }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, id: &str) -> Result<&Case, ValidationError> {
        self.cases
            .iter()
            .find(|case| case.id() == id)
            .ok_or_else(|| ValidationError::UnknownCase(id.to_string()))
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Every item obtainable from the listed cases
    pub fn catalog(&self) -> Vec<CaseItem> {
        let mut items: Vec<CaseItem> = Vec::new();
        for item in self.cases.iter().flat_map(|case| case.items()) {
            if !items.iter().any(|known| known.id == item.id) {
                items.push(item.clone());
            }
        }
        items
    }
}

impl SpinGame for CaseGame {
    type Wager = CaseOpening;
    type Outcome = CaseOutcome;

    fn game(&self) -> GameType {
        GameType::Cases
    }

    fn stake(&self, wager: &CaseOpening) -> Result<Money, ValidationError> {
        if wager.count == 0 {
            return Err(ValidationError::EmptyBatch);
        }
        if wager.count > self.config.max_batch {
            return Err(ValidationError::BatchTooLarge {
                requested: wager.count,
                max: self.config.max_batch,
            });
        }
        Ok(self.case(&wager.case_id)?.price().times(wager.count))
    }

    fn timing(&self, wager: &CaseOpening) -> SpinTiming {
        self.config.phase_timing(wager.quick)
    }

    fn draw<R: Rng + ?Sized>(&mut self, wager: &CaseOpening, rng: &mut R) -> Result<CaseOutcome, RoundFault> {
        let case = self
            .case(&wager.case_id)
            .map_err(|e| RoundFault::InvalidGeneratorInput(e.to_string()))?;
        let winners = case
            .open_batch(wager.count, rng)
            .map_err(|e| RoundFault::InvalidGeneratorInput(e.to_string()))?;

        let mut items = Vec::with_capacity(winners.len());
        let mut reels = Vec::with_capacity(winners.len());
        for &winner in &winners {
            let item = case
                .item(winner)
                .ok_or_else(|| RoundFault::OutcomeOutOfRange(format!("item {} in case {}", winner, case.id())))?;
            items.push(item.clone());
            reels.push(case.cosmetic_reel(winner, rng));
        }

        Ok(CaseOutcome {
            case_id: wager.case_id.clone(),
            winners,
            items,
            reels,
        })
    }

    fn payout(&self, _wager: &CaseOpening, outcome: &CaseOutcome) -> Result<Money, RoundFault> {
        Ok(outcome.value())
    }

    fn outcome_index(&self, outcome: &CaseOutcome) -> usize {
        outcome.winners.first().copied().unwrap_or_default()
    }

    fn credits_balance(&self, wager: &CaseOpening) -> bool {
        wager.disposition == Disposition::Sell
    }

    fn on_resolved(&mut self, wager: &CaseOpening, outcome: &CaseOutcome) {
        if wager.disposition == Disposition::Keep {
            for item in &outcome.items {
                self.inventory.add(item.clone());
            }
        }
    }
}

impl<L: BalanceLedger, R: Rng + Send> SpinRoundMachine<CaseGame, L, R> {
    /// Sell one inventory item for its listed price
    pub async fn sell_item(&mut self, instance_id: Uuid) -> EngineResult<Money> {
        let sold = self.game.inventory.remove(instance_id)?;
        let price = sold.item.price;
        let round_id = self.round.id();
        info!(item = %sold.item.id, %price, "Item sold");

        match self
            .wallet
            .credit(price, TransactionReason::sale(GameType::Cases, round_id))
            .await
        {
            Ok(_) => Ok(price),
            Err(e) => {
                self.report_unsettled(price, &e);
                Err(e)
            }
        }
    }

    /// Upgrade targets for the staked items, cheapest first
    pub fn upgrade_targets(&self, staked: &[Uuid], preset: Option<f64>) -> Result<Vec<CaseItem>, ValidationError> {
        let value: Money = staked
            .iter()
            .filter_map(|id| self.game.inventory.get(*id))
            .map(|owned| owned.item.price)
            .sum();
        let catalog = self.game.catalog();
        Ok(upgrader::eligible_targets(&catalog, value, preset)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn upgrade(&mut self, staked: &[Uuid], target_id: &str) -> EngineResult<UpgradeOutcome> {
        let roll = self.rng.gen::<f64>() * 100.0;
        self.upgrade_with_roll(staked, target_id, roll)
    }

    /// Upgrade with a fixed roll in `[0, 100)`
    pub fn upgrade_with_roll(&mut self, staked: &[Uuid], target_id: &str, roll: f64) -> EngineResult<UpgradeOutcome> {
        let target = self
            .game
            .catalog()
            .into_iter()
            .find(|item| item.id == target_id)
            .ok_or_else(|| ValidationError::UnknownItem(target_id.to_string()))?;
        let outcome = upgrader::upgrade_with(&mut self.game.inventory, staked, &target, roll)?;
        info!(
            game = %GameType::Upgrader,
            target = %target.id,
            chance = outcome.chance,
            won = outcome.won,
            "Upgrade resolved"
        );
        Ok(outcome)
    }
}

//! Action-driven rounds: mines and pump
//!
//! The player drives `Running` one reveal or pump at a time. A bad draw loses
//! the stake, a cashout collects the current multiplier, and clearing the
//! whole sequence collects the final multiplier without a cashout.

use super::bet::Bet;
use super::{Round, RoundPhase};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, RoundFault, ValidationError};
use crate::events::{EventBus, RoundEvent};
use crate::games::mines::{Cell, MinesBoard, MultiplierTable};
use crate::games::pump::{Difficulty, PumpTable};
use crate::games::{GameType, Settlement};
use crate::ledger::{BalanceLedger, TransactionReason, Wallet};
use crate::metrics::EngineMetrics;
use crate::money::{BetLimits, Money};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bookkeeping shared by the reveal-style games
struct ActionRound<L: BalanceLedger> {
    game: GameType,
    limits: BetLimits,
    wallet: Wallet<L>,
    round: Round,
    bet: Option<Bet>,
    events: EventBus,
    metrics: Arc<EngineMetrics>,
}

impl<L: BalanceLedger> ActionRound<L> {
    fn new(game: GameType, config: &EngineConfig, wallet: Wallet<L>, now: Instant) -> Self {
        Self {
            game,
            limits: config.bets.limits(),
            wallet,
            round: Round::new(1, now),
            bet: None,
            events: EventBus::new(config.monitoring.event_capacity),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    fn ensure_running(&self, action: &'static str) -> Result<(), ValidationError> {
        let phase = self.round.phase();
        if phase != RoundPhase::Running {
            return Err(ValidationError::WrongPhase { action, phase });
        }
        Ok(())
    }

    /// Debit the stake and enter `Running`
    async fn open(&mut self, stake: Money, now: Instant) -> EngineResult<Uuid> {
        let phase = self.round.phase();
        if phase == RoundPhase::Running {
            return Err(ValidationError::WrongPhase {
                action: "start a round",
                phase,
            }
            .into());
        }
        self.limits.check(stake)?;

        // the round and bet only change once the debit is confirmed
        let mut round = if phase == RoundPhase::Resolved {
            self.replay_unsettled().await;
            if let Err(e) = self.wallet.refresh().await {
                warn!(error = %e, "Balance refresh failed, keeping cached value");
            }
            self.round.next_cycle(now)?
        } else {
            self.round.clone()
        };
        round.advance(RoundPhase::Running, now)?;

        let round_id = round.id();
        let bet = Bet::active(round_id, stake);
        let bet_id = bet.id;
        self.wallet
            .debit(stake, TransactionReason::stake(self.game, round_id, bet_id))
            .await?;

        self.round = round;
        self.bet = Some(bet);
        self.metrics.record_stake(stake);

        self.events.publish(RoundEvent::BetPlaced {
            game: self.game,
            round_id,
            bet_id,
            slot: 0,
            stake,
        });
        self.publish_phase();
        info!(game = %self.game, %round_id, %bet_id, %stake, "Round started");

        Ok(bet_id)
    }

    async fn replay_unsettled(&mut self) {
        if self.wallet.unsettled().is_empty() {
            return;
        }
        let settled = self.wallet.retry_unsettled().await;
        self.metrics.record_replayed(&settled);
        debug!(settled = settled.len(), remaining = self.wallet.unsettled().len(), "Replayed unsettled credits");
    }

    /// Collect at `multiplier` and resolve the round
    async fn settle(&mut self, multiplier: f64, now: Instant) -> EngineResult<Option<Settlement>> {
        let round_id = self.round.id();
        let Some(bet) = self.bet.as_mut() else {
            return Err(ValidationError::NoBetInSlot(0).into());
        };
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
            slot: 0,
            multiplier,
            payout,
            automatic: false,
        });
        info!(game = %self.game, %round_id, multiplier, %payout, "Round cashed out");
        self.resolve(now);

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
                self.metrics.record_unsettled_credit();
                self.events.publish(RoundEvent::CreditUnsettled {
                    game: self.game,
                    round_id,
                    amount: payout,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn bust(&mut self, now: Instant) {
        let round_id = self.round.id();
        if let Some(bet) = self.bet.as_mut() {
            match bet.lose() {
                Ok(()) => {
                    self.events.publish(RoundEvent::BetLost {
                        game: self.game,
                        round_id,
                        bet_id: bet.id,
                        slot: 0,
                        stake: bet.stake,
                    });
                    info!(game = %self.game, %round_id, stake = %bet.stake, "Round busted");
                }
                Err(violation) => debug!(%violation, "Loss ignored"),
            }
        }
        self.resolve(now);
    }

    fn resolve(&mut self, now: Instant) {
        match self.round.advance(RoundPhase::Resolved, now) {
            Ok(()) => {
                self.metrics.record_round_resolved();
                self.publish_phase();
            }
            Err(violation) => debug!(%violation, "Resolve ignored"),
        }
    }

    fn publish_phase(&self) {
        self.events.publish(RoundEvent::PhaseChanged {
            game: self.game,
            round_id: self.round.id(),
            cycle: self.round.cycle(),
            phase: self.round.phase(),
        });
    }

    /// Settled bet re-queried after resolve
    fn settled_again(&self) -> bool {
        self.round.phase() == RoundPhase::Resolved
            && self.bet.as_ref().map_or(false, |b| b.state().is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RevealOutcome {
    Safe {
        picks: usize,
        multiplier: f64,
        /// Present when the last safe cell was revealed
        settled: Option<Settlement>,
    },
    Mine {
        mines: Vec<usize>,
    },
    /// Cell was already revealed
    Ignored,
}

/// Mines grid round
pub struct MinesRound<L: BalanceLedger, R: Rng> {
    core: ActionRound<L>,
    cells: usize,
    rtp: f64,
    rng: R,
    board: Option<MinesBoard>,
    table: Option<Arc<MultiplierTable>>,
    tables: HashMap<usize, Arc<MultiplierTable>>,
}

impl<L: BalanceLedger, R: Rng + Send> MinesRound<L, R> {
    pub fn new(config: &EngineConfig, wallet: Wallet<L>, rng: R, now: Instant) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            core: ActionRound::new(GameType::Mines, config, wallet, now),
            cells: config.mines.grid_size,
            rtp: config.mines.rtp,
            rng,
            board: None,
            table: None,
            tables: HashMap::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.core.metrics = metrics;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.core.events.subscribe()
    }

    pub fn phase(&self) -> RoundPhase {
        self.core.round.phase()
    }

    pub fn round(&self) -> &Round {
        &self.core.round
    }

    pub fn bet(&self) -> Option<&Bet> {
        self.core.bet.as_ref()
    }

    pub fn wallet(&self) -> &Wallet<L> {
        &self.core.wallet
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.core.metrics
    }

    pub fn board(&self) -> Option<&MinesBoard> {
        self.board.as_ref()
    }

    /// Multiplier table for `mines`, built on first use
    pub fn table_for(&mut self, mines: usize) -> Result<Arc<MultiplierTable>, ValidationError> {
        if let Some(table) = self.tables.get(&mines) {
            return Ok(table.clone());
        }
        let table = Arc::new(MultiplierTable::new(self.cells, mines, self.rtp)?);
        self.tables.insert(mines, table.clone());
        Ok(table)
    }

    /// Multiplier a cashout would pay right now
    pub fn current_multiplier(&self) -> Option<f64> {
        let picks = self.board.as_ref()?.safe_picks();
        if picks == 0 {
            return None;
        }
        self.table.as_ref()?.multiplier(picks)
    }

    pub async fn start(&mut self, stake: Money, mines: usize, now: Instant) -> EngineResult<Uuid> {
        let board = MinesBoard::generate(self.cells, mines, &mut self.rng)?;
        self.start_with_board(stake, board, now).await
    }

    /// Start on a prepared board
    pub async fn start_with_board(&mut self, stake: Money, board: MinesBoard, now: Instant) -> EngineResult<Uuid> {
        if board.len() != self.cells {
            return Err(RoundFault::InvalidGeneratorInput(format!(
                "board has {} cells, grid has {}",
                board.len(),
                self.cells
            ))
            .into());
        }
        let table = self.table_for(board.mine_count())?;
        let bet_id = self.core.open(stake, now).await?;
        self.board = Some(board);
        self.table = Some(table);
        Ok(bet_id)
    }

    pub async fn reveal(&mut self, cell: usize, now: Instant) -> EngineResult<RevealOutcome> {
        self.core.ensure_running("reveal a cell")?;
        let (Some(board), Some(table)) = (self.board.as_mut(), self.table.clone()) else {
            return Err(ValidationError::NoBetInSlot(0).into());
        };

        let kind = match board.reveal(cell) {
            Ok(kind) => kind,
            Err(EngineError::Invariant(violation)) => {
                debug!(%violation, "Reveal ignored");
                return Ok(RevealOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        match kind {
            Cell::Mine => {
                let mines = board.mine_positions();
                self.core.bust(now);
                Ok(RevealOutcome::Mine { mines })
            }
            Cell::Safe => {
                let picks = board.safe_picks();
                let exhausted = board.all_safe_revealed();
                let multiplier = table.multiplier(picks).ok_or_else(|| {
                    RoundFault::OutcomeOutOfRange(format!("no multiplier for {} picks", picks))
                })?;
                let settled = if exhausted {
                    self.core.settle(multiplier, now).await?
                } else {
                    None
                };
                Ok(RevealOutcome::Safe {
                    picks,
                    multiplier,
                    settled,
                })
            }
        }
    }

    pub async fn cashout(&mut self, now: Instant) -> EngineResult<Option<Settlement>> {
        if self.core.settled_again() {
            debug!("Cashout on settled round ignored");
            return Ok(None);
        }
        self.core.ensure_running("cash out")?;
        let multiplier = self.current_multiplier().ok_or(ValidationError::NothingToCollect)?;
        self.core.settle(multiplier, now).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum PumpOutcome {
    Survived {
        steps: usize,
        multiplier: f64,
        /// Present when the last step was survived
        settled: Option<Settlement>,
    },
    Popped,
}

/// Balloon pump round
pub struct PumpRound<L: BalanceLedger, R: Rng> {
    core: ActionRound<L>,
    rng: R,
    difficulty: Difficulty,
    steps: usize,
    table: Option<Arc<PumpTable>>,
    tables: HashMap<Difficulty, Arc<PumpTable>>,
}

impl<L: BalanceLedger, R: Rng + Send> PumpRound<L, R> {
    pub fn new(config: &EngineConfig, wallet: Wallet<L>, rng: R, now: Instant) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            core: ActionRound::new(GameType::Pump, config, wallet, now),
            rng,
            difficulty: config.pump.default_difficulty,
            steps: 0,
            table: None,
            tables: HashMap::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.core.metrics = metrics;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.core.events.subscribe()
    }

    pub fn phase(&self) -> RoundPhase {
        self.core.round.phase()
    }

    pub fn bet(&self) -> Option<&Bet> {
        self.core.bet.as_ref()
    }

    pub fn wallet(&self) -> &Wallet<L> {
        &self.core.wallet
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.core.metrics
    }

    pub fn round(&self) -> &Round {
        &self.core.round
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Step table for `difficulty`, built on first use
    fn table_for(&mut self, difficulty: Difficulty) -> Result<Arc<PumpTable>, RoundFault> {
        if let Some(table) = self.tables.get(&difficulty) {
            return Ok(table.clone());
        }
        let table = Arc::new(PumpTable::new(difficulty)?);
        self.tables.insert(difficulty, table.clone());
        Ok(table)
    }

    /// Multiplier a cashout would pay right now
    pub fn current_multiplier(&self) -> Option<f64> {
        if self.steps == 0 {
            return None;
        }
        self.table.as_ref()?.step(self.steps - 1).map(|s| s.multiplier)
    }

    pub async fn start(&mut self, stake: Money, difficulty: Difficulty, now: Instant) -> EngineResult<Uuid> {
        let table = self.table_for(difficulty)?;
        let bet_id = self.core.open(stake, now).await?;
        self.difficulty = difficulty;
        self.table = Some(table);
        self.steps = 0;
        Ok(bet_id)
    }

    pub async fn pump(&mut self, now: Instant) -> EngineResult<PumpOutcome> {
        let u = self.rng.gen::<f64>();
        self.pump_with(u, now).await
    }

    /// Pump with a fixed unit draw
    pub async fn pump_with(&mut self, u: f64, now: Instant) -> EngineResult<PumpOutcome> {
        self.core.ensure_running("pump")?;
        let Some(table) = self.table.clone() else {
            return Err(ValidationError::NoBetInSlot(0).into());
        };

        if table.pops_with(self.steps, u)? {
            self.core.bust(now);
            return Ok(PumpOutcome::Popped);
        }

        self.steps += 1;
        let multiplier = table
            .step(self.steps - 1)
            .map(|s| s.multiplier)
            .ok_or_else(|| RoundFault::OutcomeOutOfRange(format!("no step {}", self.steps)))?;
        let settled = if self.steps == table.len() {
            self.core.settle(multiplier, now).await?
        } else {
            None
        };

        Ok(PumpOutcome::Survived {
            steps: self.steps,
            multiplier,
            settled,
        })
    }

    pub async fn cashout(&mut self, now: Instant) -> EngineResult<Option<Settlement>> {
        if self.core.settled_again() {
            debug!("Cashout on settled round ignored");
            return Ok(None);
        }
        self.core.ensure_running("cash out")?;
        let multiplier = self.current_multiplier().ok_or(ValidationError::NothingToCollect)?;
        self.core.settle(multiplier, now).await
    }
}

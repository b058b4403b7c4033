//! Monte-Carlo return-to-player measurement
//!
//! Drives the outcome generators directly with a fixed strategy per game and
//! a seeded RNG, so a report is reproducible from its seed.

use crate::config::{CrashConfig, EngineConfig};
use crate::errors::{EngineResult, RoundFault};
use crate::games::cases::{starter_case, Case};
use crate::games::crash::{truncate_hundredths, CrashCurve};
use crate::games::mines::{MinesBoard, MultiplierTable};
use crate::games::pump::{Difficulty, PumpTable};
use crate::games::roulette::{self, BetArea, RouletteLayout};
use crate::games::upgrader;
use crate::games::wheel::{RiskLevel, SegmentCount, Wheel};
use crate::games::{Cell, GameType};
use crate::money::Money;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Strategy and size of one simulation run
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub game: GameType,
    pub rounds: u64,
    pub seed: u64,
    pub stake: Money,
    /// Crash and dino auto-collect target
    pub crash_target: f64,
    pub mines: usize,
    /// Safe reveals before cashing out
    pub picks: usize,
    pub difficulty: Difficulty,
    /// Pumps before cashing out
    pub pump_steps: usize,
    pub risk: RiskLevel,
    pub segments: SegmentCount,
    /// Roulette area covered by every spin
    pub roulette_area: BetArea,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            game: GameType::Crash,
            rounds: 100_000,
            seed: 42,
            stake: Money::from_cents(100),
            crash_target: 2.0,
            mines: 5,
            picks: 3,
            difficulty: Difficulty::Medium,
            pump_steps: 3,
            risk: RiskLevel::Medium,
            segments: SegmentCount::Thirty,
            roulette_area: BetArea::Red,
        }
    }
}

impl SimulationConfig {
    pub fn for_game(game: GameType) -> Self {
        Self {
            game,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub game: GameType,
    pub rounds: u64,
    pub seed: u64,
    pub staked: Money,
    pub returned: Money,
    pub wins: u64,
    pub observed_rtp: f64,
    /// Analytic return of the simulated strategy
    pub expected_rtp: f64,
    pub duration: Duration,
}

impl SimulationReport {
    pub fn hit_rate(&self) -> f64 {
        if self.rounds == 0 {
            return 0.0;
        }
        self.wins as f64 / self.rounds as f64
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} over {} rounds (seed {})", self.game, self.rounds, self.seed)?;
        writeln!(f, "  staked:       {}", self.staked)?;
        writeln!(f, "  returned:     {}", self.returned)?;
        writeln!(f, "  hit rate:     {:.2}%", self.hit_rate() * 100.0)?;
        writeln!(f, "  observed RTP: {:.4}", self.observed_rtp)?;
        writeln!(f, "  expected RTP: {:.4}", self.expected_rtp)?;
        write!(f, "  took:         {:?}", self.duration)
    }
}

/// Runs strategies against the configured generators
pub struct Simulator {
    config: EngineConfig,
    case: Case,
}

impl Simulator {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            case: starter_case()?,
        })
    }

    pub fn run(&self, sim: &SimulationConfig) -> EngineResult<SimulationReport> {
        let started = Instant::now();
        let mut rng = StdRng::seed_from_u64(sim.seed);
        let mut tally = Tally::default();

        let expected_rtp = match sim.game {
            GameType::Crash | GameType::Dino => self.crash(sim, &mut rng, &mut tally)?,
            GameType::Mines => self.mines(sim, &mut rng, &mut tally)?,
            GameType::Pump => self.pump(sim, &mut rng, &mut tally)?,
            GameType::Wheel => self.wheel(sim, &mut rng, &mut tally)?,
            GameType::Roulette => self.roulette(sim, &mut rng, &mut tally)?,
            GameType::Cases => self.cases(sim, &mut rng, &mut tally),
            GameType::Upgrader => self.upgrader(sim, &mut rng, &mut tally)?,
        };

        let report = SimulationReport {
            game: sim.game,
            rounds: sim.rounds,
            seed: sim.seed,
            staked: tally.staked,
            returned: tally.returned,
            wins: tally.wins,
            observed_rtp: tally.rtp(),
            expected_rtp,
            duration: started.elapsed(),
        };
        info!(
            game = %report.game,
            rounds = report.rounds,
            observed_rtp = report.observed_rtp,
            expected_rtp = report.expected_rtp,
            "Simulation finished"
        );
        Ok(report)
    }

    fn crash(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        let crash = match sim.game {
            GameType::Dino => CrashConfig::dino(),
            _ => self.config.crash.clone(),
        };
        let curve = CrashCurve::from_config(&crash)?;
        let target = truncate_hundredths(sim.crash_target);
        if target < crash.min_auto_collect {
            return Err(RoundFault::InvalidGeneratorInput(format!("auto-collect target {}", target)).into());
        }

        for _ in 0..sim.rounds {
            let point = curve.draw(rng)?;
            let multiplier = if target < point.value() { target } else { 0.0 };
            tally.record(sim.stake, sim.stake.scale(multiplier));
        }

        // wins need C >= target + 0.01 after truncation
        Ok(target * curve.survival(target + 0.01))
    }

    fn mines(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        let cells = self.config.mines.grid_size;
        let table = MultiplierTable::new(cells, sim.mines, self.config.mines.rtp)?;
        let picks = sim.picks.clamp(1, table.max_picks());
        let multiplier = table
            .multiplier(picks)
            .ok_or_else(|| RoundFault::OutcomeOutOfRange(format!("{} picks", picks)))?;

        for _ in 0..sim.rounds {
            // the layout is shuffled, so revealing in index order is a uniform strategy
            let mut board = MinesBoard::generate(cells, sim.mines, rng)?;
            let mut survived = true;
            for cell in 0..picks {
                if board.reveal(cell)? == Cell::Mine {
                    survived = false;
                    break;
                }
            }
            let payout = if survived { sim.stake.scale(multiplier) } else { Money::ZERO };
            tally.record(sim.stake, payout);
        }

        Ok(self.config.mines.rtp)
    }

    fn pump(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        let table = PumpTable::new(sim.difficulty)?;
        let steps = sim.pump_steps.clamp(1, table.len());
        let multiplier = table
            .step(steps - 1)
            .map(|s| s.multiplier)
            .ok_or_else(|| RoundFault::OutcomeOutOfRange(format!("{} steps", steps)))?;

        for _ in 0..sim.rounds {
            let mut survived = true;
            for index in 0..steps {
                if table.pops(index, rng)? {
                    survived = false;
                    break;
                }
            }
            let payout = if survived { sim.stake.scale(multiplier) } else { Money::ZERO };
            tally.record(sim.stake, payout);
        }

        Ok(table.expected_return(steps))
    }

    fn wheel(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        let wheel = Wheel::new(sim.risk, sim.segments);
        for _ in 0..sim.rounds {
            let segment = wheel.spin(rng);
            tally.record(sim.stake, wheel.payout(sim.stake, segment)?);
        }
        Ok(wheel.expected_return())
    }

    fn roulette(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        let mut layout = RouletteLayout::new();
        layout.add_chip(sim.roulette_area, sim.stake)?;
        for _ in 0..sim.rounds {
            let number = roulette::spin(rng);
            tally.record(layout.total(), layout.payout(number));
        }

        let area = sim.roulette_area;
        let covered = area.covered_numbers().len() as f64;
        Ok(covered * area.multiplier() as f64 / roulette::POCKETS as f64)
    }

    fn cases(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> f64 {
        let case = &self.case;
        for _ in 0..sim.rounds {
            let winner = case.pick_winner(rng);
            let value = case.item(winner).map(|item| item.price).unwrap_or(Money::ZERO);
            tally.record(case.price(), value);
        }
        case.expected_return()
    }

    /// Stake the case price in value and aim for the most expensive item
    fn upgrader(&self, sim: &SimulationConfig, rng: &mut StdRng, tally: &mut Tally) -> EngineResult<f64> {
        use rand::Rng;

        let staked = sim.stake;
        let target = self
            .case
            .items()
            .iter()
            .max_by_key(|item| item.price)
            .ok_or_else(|| RoundFault::InvalidWeights("empty case".to_string()))?;
        let chance = upgrader::upgrade_chance(staked, target.price);

        for _ in 0..sim.rounds {
            let roll = rng.gen::<f64>() * 100.0;
            let value = if roll < chance { target.price } else { Money::ZERO };
            tally.record(staked, value);
        }

        Ok(chance / 100.0 * target.price.as_decimal() / staked.as_decimal())
    }
}

#[derive(Default)]
struct Tally {
    staked: Money,
    returned: Money,
    wins: u64,
}

impl Tally {
    fn record(&mut self, stake: Money, payout: Money) {
        self.staked += stake;
        self.returned += payout;
        if payout.is_positive() {
            self.wins += 1;
        }
    }

    fn rtp(&self) -> f64 {
        if !self.staked.is_positive() {
            return 0.0;
        }
        self.returned.cents() as f64 / self.staked.cents() as f64
    }
}

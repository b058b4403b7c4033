//! Pump difficulty tables
//!
//! Each step carries the multiplier reached after surviving it and the chance
//! of surviving. Both come from fixed published tables, so the pop roll for a
//! step is a two-way weighted choice built once per difficulty.

use crate::errors::RoundFault;
use crate::games::weighted::WeightedTable;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

const EASY_MULTIPLIERS: [f64; 24] = [
    1.02, 1.07, 1.11, 1.17, 1.23, 1.29, 1.36, 1.44, 1.53, 1.63, 1.75, 1.88, 2.04, 2.23, 2.45, 2.72,
    3.06, 3.50, 4.08, 4.90, 6.10, 8.10, 12.20, 24.50,
];

const EASY_SURVIVAL: [f64; 24] = [
    0.96, 0.92, 0.88, 0.84, 0.80, 0.76, 0.72, 0.68, 0.64, 0.60, 0.56, 0.52, 0.48, 0.44, 0.40, 0.36,
    0.32, 0.28, 0.24, 0.20, 0.16, 0.12, 0.08, 0.04,
];

const MEDIUM_MULTIPLIERS: [f64; 22] = [
    1.11, 1.27, 1.46, 1.69, 1.98, 2.33, 2.76, 3.31, 4.03, 4.95, 6.19, 7.88, 10.25, 13.6, 18.0, 26.83,
    40.25, 64.4, 112.0, 225.40, 563.50, 2254.0,
];

const MEDIUM_SURVIVAL: [f64; 22] = [
    0.88, 0.77, 0.66956522, 0.57826087, 0.49565217, 0.42130435, 0.35478261, 0.29565217, 0.2434651,
    0.19782609, 0.15826087, 0.12434783, 0.09565216, 0.0717751, 0.0512675, 0.03652174, 0.0243483,
    0.01521739, 0.00869565, 0.00434783, 0.00173913, 0.000434738,
];

const HARD_MULTIPLIERS: [f64; 20] = [
    1.23, 1.55, 1.98, 2.56, 3.36, 4.48, 6.08, 8.41, 11.92, 17.34, 26.01, 40.46, 65.0, 112.70, 206.0,
    413.23, 929.77, 2479.40, 8677.90, 52060.0,
];

const HARD_SURVIVAL: [f64; 20] = [
    0.80, 0.63333333, 0.49565217, 0.38300, 0.29181254, 0.21885940, 0.1612485, 0.11646904,
    0.08221344, 0.0575217, 0.03768116, 0.02422360, 0.014906, 0.00869565, 0.004485, 0.002317154,
    0.00105402, 0.00039656, 0.00011293, 0.00001882,
];

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    fn raw_tables(self) -> (&'static [f64], &'static [f64]) {
        match self {
            Difficulty::Easy => (&EASY_MULTIPLIERS, &EASY_SURVIVAL),
            Difficulty::Medium => (&MEDIUM_MULTIPLIERS, &MEDIUM_SURVIVAL),
            Difficulty::Hard => (&HARD_MULTIPLIERS, &HARD_SURVIVAL),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpStep {
    /// Multiplier reached after surviving this step
    pub multiplier: f64,
    /// Chance of surviving this step
    pub survive: f64,
}

impl PumpStep {
    pub fn pop_chance(&self) -> f64 {
        1.0 - self.survive
    }
}

/// Precomputed steps and pop rolls for one difficulty
#[derive(Debug, Clone)]
pub struct PumpTable {
    difficulty: Difficulty,
    steps: Vec<PumpStep>,
    rolls: Vec<WeightedTable<bool>>,
}

impl PumpTable {
    pub fn new(difficulty: Difficulty) -> Result<Self, RoundFault> {
        let (multipliers, survival) = difficulty.raw_tables();
        let mut steps = Vec::with_capacity(multipliers.len());
        let mut rolls = Vec::with_capacity(multipliers.len());

        for (&multiplier, &survive) in multipliers.iter().zip(survival) {
            if !(survive > 0.0 && survive <= 1.0) {
                return Err(RoundFault::InvalidGeneratorInput(format!(
                    "{} step survival {} not in (0, 1]",
                    difficulty, survive
                )));
            }
            // popped first, so u < 1 - survive pops
            rolls.push(WeightedTable::new(vec![(true, 1.0 - survive), (false, survive)])?);
            steps.push(PumpStep { multiplier, survive });
        }

        Ok(Self {
            difficulty,
            steps,
            rolls,
        })
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&PumpStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[PumpStep] {
        &self.steps
    }

    /// Whether step `index` pops for a unit draw `u ∈ [0, 1)`
    pub fn pops_with(&self, index: usize, u: f64) -> Result<bool, RoundFault> {
        let roll = self.rolls.get(index).ok_or_else(|| {
            RoundFault::OutcomeOutOfRange(format!(
                "{} has no step {}",
                self.difficulty, index
            ))
        })?;
        Ok(*roll.select_unit(u))
    }

    pub fn pops<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<bool, RoundFault> {
        self.pops_with(index, rng.gen::<f64>())
    }

    /// Expected return of a player who always cashes out after `steps` pumps
    pub fn expected_return(&self, steps: usize) -> f64 {
        if steps == 0 || steps > self.steps.len() {
            return 0.0;
        }
        let survive: f64 = self.steps[..steps].iter().map(|s| s.survive).product();
        survive * self.steps[steps - 1].multiplier
    }
}

//! Weighted choice by cumulative walk
//!
//! Every game that picks among unequal outcomes goes through [`WeightedTable`]:
//! case winners, the cosmetic reel pool and the pump pop roll.

use crate::errors::RoundFault;
use rand::Rng;

/// Immutable table of `(value, weight)` entries
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    entries: Vec<(T, f64)>,
    total: f64,
}

impl<T> WeightedTable<T> {
    /// Build a table; rejects empty input, negative or non-finite weights and a zero total
    pub fn new(entries: Vec<(T, f64)>) -> Result<Self, RoundFault> {
        if entries.is_empty() {
            return Err(RoundFault::InvalidWeights("table is empty".to_string()));
        }

        let mut total = 0.0;
        for (index, (_, weight)) in entries.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RoundFault::InvalidWeights(format!(
                    "entry {} has weight {}",
                    index, weight
                )));
            }
            total += weight;
        }

        if total <= 0.0 {
            return Err(RoundFault::InvalidWeights("weights sum to zero".to_string()));
        }

        Ok(Self { entries, total })
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(value, _)| value)
    }

    pub fn weight(&self, index: usize) -> Option<f64> {
        self.entries.get(index).map(|(_, weight)| *weight)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(value, _)| value)
    }

    /// Index selected by a point in `[0, total)`
    ///
    /// Subtracts each weight from `point` until the remainder falls inside the
    /// current entry. Points at or past the total (float drift) land on the last
    /// entry with a positive weight.
    pub fn select_index(&self, point: f64) -> usize {
        let mut remainder = point.max(0.0);
        for (index, (_, weight)) in self.entries.iter().enumerate() {
            if remainder < *weight {
                return index;
            }
            remainder -= weight;
        }

        self.entries
            .iter()
            .rposition(|(_, weight)| *weight > 0.0)
            .unwrap_or(self.entries.len() - 1)
    }

    /// Value selected by a point in `[0, total)`
    pub fn select(&self, point: f64) -> &T {
        &self.entries[self.select_index(point)].0
    }

    /// Value selected by a unit-interval draw `u ∈ [0, 1)`
    pub fn select_unit(&self, u: f64) -> &T {
        self.select(u * self.total)
    }

    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.select_index(rng.gen::<f64>() * self.total)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.entries[self.sample_index(rng)].0
    }
}

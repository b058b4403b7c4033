//! Reveal grid: hypergeometric multipliers and mine placement

use crate::errors::{EngineResult, InvariantViolation, ValidationError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Safe,
    Mine,
}

/// Probability of `picks` consecutive safe reveals without replacement
pub fn survival_probability(cells: usize, mines: usize, picks: usize) -> f64 {
    if mines >= cells || picks > cells - mines {
        return 0.0;
    }
    (0..picks).fold(1.0, |acc, i| {
        acc * (cells - mines - i) as f64 / (cells - i) as f64
    })
}

fn check_mine_count(cells: usize, mines: usize) -> Result<(), ValidationError> {
    if mines == 0 || mines >= cells {
        return Err(ValidationError::InvalidMineCount { mines, cells });
    }
    Ok(())
}

/// `M(p) = rtp / survival(p)` for every reachable pick count
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplierTable {
    cells: usize,
    mines: usize,
    rtp: f64,
    multipliers: Vec<f64>,
}

impl MultiplierTable {
    pub fn new(cells: usize, mines: usize, rtp: f64) -> Result<Self, ValidationError> {
        check_mine_count(cells, mines)?;

        let safe = cells - mines;
        let mut multipliers = Vec::with_capacity(safe + 1);
        let mut product = 1.0;
        multipliers.push(rtp);
        for i in 0..safe {
            product *= (cells - i) as f64 / (cells - mines - i) as f64;
            multipliers.push(rtp * product);
        }

        Ok(Self {
            cells,
            mines,
            rtp,
            multipliers,
        })
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn mines(&self) -> usize {
        self.mines
    }

    pub fn rtp(&self) -> f64 {
        self.rtp
    }

    /// Largest pick count: every safe cell revealed
    pub fn max_picks(&self) -> usize {
        self.cells - self.mines
    }

    pub fn multiplier(&self, picks: usize) -> Option<f64> {
        self.multipliers.get(picks).copied()
    }
}

/// One hidden board with its reveal order
#[derive(Debug, Clone)]
pub struct MinesBoard {
    cells: Vec<Cell>,
    revealed: Vec<bool>,
    sequence: Vec<usize>,
}

impl MinesBoard {
    /// Place `mines` bad cells by uniform shuffle
    pub fn generate<R: Rng + ?Sized>(cells: usize, mines: usize, rng: &mut R) -> Result<Self, ValidationError> {
        check_mine_count(cells, mines)?;
        let mut layout = vec![Cell::Safe; cells];
        layout[..mines].fill(Cell::Mine);
        layout.shuffle(rng);
        Ok(Self::with_cells(layout))
    }

    /// Board with mines at fixed positions
    pub fn from_layout(cells: usize, mine_positions: &[usize]) -> Result<Self, ValidationError> {
        let mut layout = vec![Cell::Safe; cells];
        for &position in mine_positions {
            if position >= cells {
                return Err(ValidationError::CellOutOfRange { cell: position, cells });
            }
            layout[position] = Cell::Mine;
        }
        let mines = layout.iter().filter(|c| **c == Cell::Mine).count();
        check_mine_count(cells, mines)?;
        Ok(Self::with_cells(layout))
    }

    fn with_cells(cells: Vec<Cell>) -> Self {
        let revealed = vec![false; cells.len()];
        Self {
            cells,
            revealed,
            sequence: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Mine).count()
    }

    pub fn mine_positions(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Mine)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_revealed(&self, cell: usize) -> bool {
        self.revealed.get(cell).copied().unwrap_or(false)
    }

    /// Cells in the order they were revealed
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    /// Number of safe cells revealed so far
    pub fn safe_picks(&self) -> usize {
        self.sequence
            .iter()
            .filter(|&&i| self.cells[i] == Cell::Safe)
            .count()
    }

    pub fn all_safe_revealed(&self) -> bool {
        self.safe_picks() == self.cells.len() - self.mine_count()
    }

    pub fn reveal(&mut self, cell: usize) -> EngineResult<Cell> {
        let cells = self.cells.len();
        let kind = *self
            .cells
            .get(cell)
            .ok_or(ValidationError::CellOutOfRange { cell, cells })?;

        if self.revealed[cell] {
            return Err(InvariantViolation::CellAlreadyRevealed(cell).into());
        }

        self.revealed[cell] = true;
        self.sequence.push(cell);
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_first_pick_multiplier() {
        let table = MultiplierTable::new(25, 5, 0.99).unwrap();
        assert!((table.multiplier(1).unwrap() - 1.2375).abs() < 1e-12);
        assert_eq!(table.max_picks(), 20);
        assert!(table.multiplier(21).is_none());
    }

    #[test]
    fn test_multiplier_is_rtp_over_survival() {
        for (cells, mines) in [(25, 1), (25, 5), (25, 24), (16, 3), (9, 4)] {
            let table = MultiplierTable::new(cells, mines, 0.99).unwrap();
            for picks in 0..=table.max_picks() {
                let expected = 0.99 / survival_probability(cells, mines, picks);
                let actual = table.multiplier(picks).unwrap();
                assert!(
                    (actual - expected).abs() / expected < 1e-9,
                    "N={} K={} p={}: {} vs {}",
                    cells,
                    mines,
                    picks,
                    actual,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_invalid_mine_counts() {
        assert!(MultiplierTable::new(25, 0, 0.99).is_err());
        assert!(MultiplierTable::new(25, 25, 0.99).is_err());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(MinesBoard::generate(25, 30, &mut rng).is_err());
    }

    #[test]
    fn test_generated_board_has_exact_mine_count() {
        let mut rng = StdRng::seed_from_u64(99);
        for mines in 1..25 {
            let board = MinesBoard::generate(25, mines, &mut rng).unwrap();
            assert_eq!(board.mine_count(), mines);
        }
    }

    #[test]
    fn test_reveal_sequence() {
        let mut board = MinesBoard::from_layout(9, &[4]).unwrap();
        assert_eq!(board.reveal(0).unwrap(), Cell::Safe);
        assert_eq!(board.reveal(8).unwrap(), Cell::Safe);
        assert_eq!(board.reveal(4).unwrap(), Cell::Mine);
        assert_eq!(board.sequence(), &[0, 8, 4]);
        assert_eq!(board.safe_picks(), 2);
    }

    #[test]
    fn test_rereveal_is_invariant_violation() {
        let mut board = MinesBoard::from_layout(9, &[4]).unwrap();
        board.reveal(0).unwrap();
        match board.reveal(0) {
            Err(EngineError::Invariant(InvariantViolation::CellAlreadyRevealed(0))) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(board.reveal(9), Err(EngineError::Validation(_))));
        assert_eq!(board.safe_picks(), 1);
    }
}

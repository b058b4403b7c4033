//! Single-zero roulette: bet areas, payouts and the chip layout
//!
//! Multipliers include the returned stake (straight pays 36x the chip), so the
//! payout of a spin is an exact integer-cent sum over every covering area.

use crate::errors::ValidationError;
use crate::money::{Money, MAX_BET};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Red numbers on a roulette wheel
const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

pub const POCKETS: u8 = 37;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PocketColor {
    Green,
    Red,
    Black,
}

pub fn pocket_color(number: u8) -> PocketColor {
    if number == 0 {
        PocketColor::Green
    } else if RED_NUMBERS.contains(&number) {
        PocketColor::Red
    } else {
        PocketColor::Black
    }
}

/// Uniform winning number in `[0, 36]`
pub fn spin<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(0..POCKETS)
}

/// A region of the betting table.
///
/// Rows are numbered 1..=12 from the zero end (row `r` holds `3r-2, 3r-1, 3r`).
/// Columns are numbered 1..=3 with column 1 holding `1, 4, 7, ..., 34`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "area", content = "at", rename_all = "lowercase")]
pub enum BetArea {
    Straight(u8),
    /// Two adjacent numbers, smaller first
    Split(u8, u8),
    Street(u8),
    /// Four numbers identified by their smallest member
    Corner(u8),
    /// Two adjacent rows identified by the first
    Line(u8),
    Dozen(u8),
    Column(u8),
    Red,
    Black,
    Even,
    Odd,
    Low,
    High,
}

impl BetArea {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ok = match *self {
            BetArea::Straight(n) => n <= 36,
            BetArea::Split(a, b) => is_adjacent(a, b),
            BetArea::Street(row) => (1..=12).contains(&row),
            BetArea::Corner(n) => (1..=32).contains(&n) && n % 3 != 0,
            BetArea::Line(row) => (1..=11).contains(&row),
            BetArea::Dozen(d) => (1..=3).contains(&d),
            BetArea::Column(c) => (1..=3).contains(&c),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidBetArea(self.to_string()))
        }
    }

    pub fn covers(&self, number: u8) -> bool {
        if number > 36 {
            return false;
        }
        match *self {
            BetArea::Straight(n) => number == n,
            BetArea::Split(a, b) => number == a || number == b,
            BetArea::Street(row) => number != 0 && (number - 1) / 3 + 1 == row,
            BetArea::Corner(n) => [0, 1, 3, 4].iter().any(|d| n.checked_add(*d) == Some(number)),
            BetArea::Line(row) => {
                number != 0 && {
                    let r = (number - 1) / 3 + 1;
                    r == row || Some(r) == row.checked_add(1)
                }
            }
            BetArea::Dozen(d) => number != 0 && (number - 1) / 12 + 1 == d,
            BetArea::Column(c) => number != 0 && (number - 1) % 3 + 1 == c,
            BetArea::Red => pocket_color(number) == PocketColor::Red,
            BetArea::Black => pocket_color(number) == PocketColor::Black,
            BetArea::Even => number != 0 && number % 2 == 0,
            BetArea::Odd => number % 2 == 1,
            BetArea::Low => (1..=18).contains(&number),
            BetArea::High => (19..=36).contains(&number),
        }
    }

    pub fn covered_numbers(&self) -> Vec<u8> {
        (0..POCKETS).filter(|n| self.covers(*n)).collect()
    }

    /// Total return per unit staked, stake included
    pub fn multiplier(&self) -> u32 {
        match self {
            BetArea::Straight(_) => 36,
            BetArea::Split(..) => 18,
            BetArea::Street(_) => 12,
            BetArea::Corner(_) => 9,
            BetArea::Line(_) => 6,
            BetArea::Dozen(_) | BetArea::Column(_) => 3,
            BetArea::Red
            | BetArea::Black
            | BetArea::Even
            | BetArea::Odd
            | BetArea::Low
            | BetArea::High => 2,
        }
    }
}

fn is_adjacent(a: u8, b: u8) -> bool {
    if a >= b || b > 36 {
        return false;
    }
    if a == 0 {
        return b <= 3;
    }
    // same row, or same column in the next row
    (b == a + 1 && a % 3 != 0) || b == a + 3
}

impl fmt::Display for BetArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetArea::Straight(n) => write!(f, "straight-{}", n),
            BetArea::Split(a, b) => write!(f, "split-{}-{}", a, b),
            BetArea::Street(r) => write!(f, "street-{}", r),
            BetArea::Corner(n) => write!(f, "corner-{}", n),
            BetArea::Line(r) => write!(f, "line-{}", r),
            BetArea::Dozen(d) => write!(f, "dozen-{}", d),
            BetArea::Column(c) => write!(f, "col-{}", c),
            BetArea::Red => write!(f, "red"),
            BetArea::Black => write!(f, "black"),
            BetArea::Even => write!(f, "even"),
            BetArea::Odd => write!(f, "odd"),
            BetArea::Low => write!(f, "1-18"),
            BetArea::High => write!(f, "19-36"),
        }
    }
}

/// Chips currently on the table plus the last committed layout
#[derive(Debug, Clone, Default)]
pub struct RouletteLayout {
    stakes: BTreeMap<BetArea, Money>,
    placements: Vec<(BetArea, Money)>,
    previous: Vec<(BetArea, Money)>,
}

impl RouletteLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chip(&mut self, area: BetArea, chip: Money) -> Result<(), ValidationError> {
        area.validate()?;
        if !chip.is_positive() || chip > MAX_BET {
            return Err(ValidationError::StakeOutOfBounds {
                stake: chip,
                min: Money::from_cents(1),
                max: MAX_BET,
            });
        }
        *self.stakes.entry(area).or_insert(Money::ZERO) += chip;
        self.placements.push((area, chip));
        Ok(())
    }

    /// Remove the most recent chip
    pub fn undo(&mut self) -> Option<(BetArea, Money)> {
        let (area, chip) = self.placements.pop()?;
        if let Some(stake) = self.stakes.get_mut(&area) {
            *stake -= chip;
            if !stake.is_positive() {
                self.stakes.remove(&area);
            }
        }
        Some((area, chip))
    }

    pub fn clear(&mut self) {
        self.stakes.clear();
        self.placements.clear();
    }

    /// Replace the table with the last committed layout
    pub fn rebet(&mut self) -> Result<Money, ValidationError> {
        if self.previous.is_empty() {
            return Err(ValidationError::EmptyWager);
        }
        self.clear();
        for (area, chip) in self.previous.clone() {
            self.add_chip(area, chip)?;
        }
        Ok(self.total())
    }

    /// Remember the current layout for the next rebet
    pub fn commit(&mut self) {
        self.previous = self.placements.clone();
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    pub fn total(&self) -> Money {
        self.stakes.values().sum()
    }

    pub fn stake_on(&self, area: &BetArea) -> Money {
        self.stakes.get(area).copied().unwrap_or(Money::ZERO)
    }

    pub fn stakes(&self) -> impl Iterator<Item = (&BetArea, &Money)> {
        self.stakes.iter()
    }

    /// Sum of `stake * multiplier` over every area covering `winning`
    pub fn payout(&self, winning: u8) -> Money {
        self.stakes
            .iter()
            .filter(|(area, _)| area.covers(winning))
            .map(|(area, stake)| stake.times(area.multiplier()))
            .sum()
    }
}

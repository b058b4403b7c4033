//! Wheel segment tables and uniform segment draw
//!
//! Tables are fixed per (risk, segment count) and each one averages 0.99.

use crate::errors::RoundFault;
use crate::money::Money;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];
}

/// Number of segments on the wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SegmentCount {
    Ten,
    Twenty,
    Thirty,
    Forty,
    Fifty,
}

impl SegmentCount {
    pub const ALL: [SegmentCount; 5] = [
        SegmentCount::Ten,
        SegmentCount::Twenty,
        SegmentCount::Thirty,
        SegmentCount::Forty,
        SegmentCount::Fifty,
    ];

    pub fn get(self) -> u32 {
        match self {
            SegmentCount::Ten => 10,
            SegmentCount::Twenty => 20,
            SegmentCount::Thirty => 30,
            SegmentCount::Forty => 40,
            SegmentCount::Fifty => 50,
        }
    }
}

impl TryFrom<u32> for SegmentCount {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(SegmentCount::Ten),
            20 => Ok(SegmentCount::Twenty),
            30 => Ok(SegmentCount::Thirty),
            40 => Ok(SegmentCount::Forty),
            50 => Ok(SegmentCount::Fifty),
            other => Err(format!("unsupported segment count {}", other)),
        }
    }
}

impl From<SegmentCount> for u32 {
    fn from(count: SegmentCount) -> u32 {
        count.get()
    }
}

impl fmt::Display for SegmentCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

const LOW_TEN: [f64; 10] = [
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
];

const LOW_TWENTY: [f64; 20] = [
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
];

const LOW_THIRTY: [f64; 30] = [
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
];

const LOW_FORTY: [f64; 40] = [
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
];

const LOW_FIFTY: [f64; 50] = [
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
    1.5, 1.2, 1.2, 1.2, 0.0, 1.2, 1.2, 1.2, 1.2, 0.0,
];

const MEDIUM_TEN: [f64; 10] = [
    0.0, 1.9, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 3.0,
];

const MEDIUM_TWENTY: [f64; 20] = [
    1.5, 0.0, 2.0, 0.0, 2.0, 0.0, 2.0, 0.0, 1.5, 0.0,
    3.0, 0.0, 1.8, 0.0, 2.0, 0.0, 2.0, 0.0, 2.0, 0.0,
];

const MEDIUM_THIRTY: [f64; 30] = [
    1.5, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 2.0, 0.0,
    2.0, 0.0, 1.5, 0.0, 3.0, 0.0, 1.5, 0.0, 2.0, 0.0,
    2.0, 0.0, 1.7, 0.0, 4.0, 0.0, 1.5, 0.0, 2.0, 0.0,
];

const MEDIUM_FORTY: [f64; 40] = [
    2.0, 0.0, 3.0, 0.0, 2.0, 0.0, 1.5, 0.0, 3.0, 0.0,
    1.5, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 3.0, 0.0,
    1.5, 0.0, 2.0, 0.0, 2.0, 0.0, 1.6, 0.0, 2.0, 0.0,
    1.5, 0.0, 3.0, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0,
];

const MEDIUM_FIFTY: [f64; 50] = [
    2.0, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 3.0, 0.0,
    1.5, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 3.0, 0.0,
    1.5, 0.0, 2.0, 0.0, 1.5, 0.0, 2.0, 0.0, 2.0, 0.0,
    1.5, 0.0, 3.0, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0,
    1.5, 0.0, 5.0, 0.0, 1.5, 0.0, 2.0, 0.0, 1.5, 0.0,
];

const HIGH_TEN: [f64; 10] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 9.9,
];

const HIGH_TWENTY: [f64; 20] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 19.8,
];

const HIGH_THIRTY: [f64; 30] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 29.7,
];

const HIGH_FORTY: [f64; 40] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 39.6,
];

const HIGH_FIFTY: [f64; 50] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 49.5,
];

fn table_for(risk: RiskLevel, segments: SegmentCount) -> &'static [f64] {
    use SegmentCount::*;
    match (risk, segments) {
        (RiskLevel::Low, Ten) => &LOW_TEN,
        (RiskLevel::Low, Twenty) => &LOW_TWENTY,
        (RiskLevel::Low, Thirty) => &LOW_THIRTY,
        (RiskLevel::Low, Forty) => &LOW_FORTY,
        (RiskLevel::Low, Fifty) => &LOW_FIFTY,
        (RiskLevel::Medium, Ten) => &MEDIUM_TEN,
        (RiskLevel::Medium, Twenty) => &MEDIUM_TWENTY,
        (RiskLevel::Medium, Thirty) => &MEDIUM_THIRTY,
        (RiskLevel::Medium, Forty) => &MEDIUM_FORTY,
        (RiskLevel::Medium, Fifty) => &MEDIUM_FIFTY,
        (RiskLevel::High, Ten) => &HIGH_TEN,
        (RiskLevel::High, Twenty) => &HIGH_TWENTY,
        (RiskLevel::High, Thirty) => &HIGH_THIRTY,
        (RiskLevel::High, Forty) => &HIGH_FORTY,
        (RiskLevel::High, Fifty) => &HIGH_FIFTY,
    }
}

/// One wheel configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wheel {
    risk: RiskLevel,
    segments: SegmentCount,
    multipliers: &'static [f64],
}

impl Wheel {
    pub fn new(risk: RiskLevel, segments: SegmentCount) -> Self {
        Self {
            risk,
            segments,
            multipliers: table_for(risk, segments),
        }
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    pub fn segment_count(&self) -> SegmentCount {
        self.segments
    }

    pub fn multipliers(&self) -> &'static [f64] {
        self.multipliers
    }

    /// Uniform segment index in `[0, S)`
    pub fn spin<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.multipliers.len())
    }

    pub fn multiplier(&self, index: usize) -> Result<f64, RoundFault> {
        self.multipliers.get(index).copied().ok_or_else(|| {
            RoundFault::OutcomeOutOfRange(format!(
                "segment {} on a {}-segment wheel",
                index, self.segments
            ))
        })
    }

    pub fn payout(&self, stake: Money, index: usize) -> Result<Money, RoundFault> {
        Ok(stake.scale(self.multiplier(index)?))
    }

    /// Chance of landing on a segment paying exactly `multiplier`
    pub fn chance_of(&self, multiplier: f64) -> f64 {
        let hits = self
            .multipliers
            .iter()
            .filter(|m| (**m - multiplier).abs() < 1e-9)
            .count();
        hits as f64 / self.multipliers.len() as f64
    }

    /// Distinct multipliers in ascending order
    pub fn distinct_multipliers(&self) -> Vec<f64> {
        let mut values = self.multipliers.to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        values
    }

    pub fn expected_return(&self) -> f64 {
        self.multipliers.iter().sum::<f64>() / self.multipliers.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_every_table_returns_099() {
        for risk in RiskLevel::ALL {
            for segments in SegmentCount::ALL {
                let wheel = Wheel::new(risk, segments);
                assert_eq!(wheel.multipliers().len() as u32, segments.get());
                assert!(
                    (wheel.expected_return() - 0.99).abs() < 1e-9,
                    "{} / {}",
                    risk,
                    segments
                );
            }
        }
    }

    #[test]
    fn test_index_maps_to_table_entry() {
        let wheel = Wheel::new(RiskLevel::Medium, SegmentCount::Ten);
        assert_eq!(wheel.multiplier(3).unwrap(), 1.5);
        assert_eq!(wheel.payout(Money::from_cents(1_000), 3).unwrap(), Money::from_cents(1_500));
        assert_eq!(wheel.payout(Money::from_cents(1_000), 0).unwrap(), Money::ZERO);
        assert!(wheel.multiplier(10).is_err());
    }

    #[test]
    fn test_chance_of_multiplier() {
        let wheel = Wheel::new(RiskLevel::High, SegmentCount::Fifty);
        assert!((wheel.chance_of(49.5) - 0.02).abs() < 1e-12);
        assert!((wheel.chance_of(0.0) - 0.98).abs() < 1e-12);
        assert_eq!(wheel.distinct_multipliers(), vec![0.0, 49.5]);
    }

    #[test]
    fn test_spin_is_in_range() {
        let wheel = Wheel::new(RiskLevel::Low, SegmentCount::Twenty);
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; 20];
        for _ in 0..2_000 {
            seen[wheel.spin(&mut rng)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_segment_count_serde() {
        let json = serde_json::to_string(&SegmentCount::Forty).unwrap();
        assert_eq!(json, "40");
        let parsed: SegmentCount = serde_json::from_str("20").unwrap();
        assert_eq!(parsed, SegmentCount::Twenty);
        assert!(serde_json::from_str::<SegmentCount>("25").is_err());
    }
}

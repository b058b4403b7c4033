//! Continuous multiplier curve and crash point draw

use crate::config::CrashConfig;
use crate::errors::RoundFault;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lowest accepted auto-collect target
pub const MIN_AUTO_COLLECT: f64 = 1.01;

/// Truncate (not round) to two decimals
pub fn truncate_hundredths(value: f64) -> f64 {
    ((value * 100.0) + 1e-9).floor() / 100.0
}

/// Multiplier at which a round ends
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashPoint(f64);

impl CrashPoint {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for CrashPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

/// Inverse-transform crash point generator and `exp(t / tau)` growth curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashCurve {
    rtp: f64,
    cap: f64,
    tau: Duration,
}

impl CrashCurve {
    pub fn new(rtp: f64, cap: f64, tau: Duration) -> Result<Self, RoundFault> {
        if !(rtp > 0.0 && rtp <= 1.0) {
            return Err(RoundFault::InvalidGeneratorInput(format!("rtp {} not in (0, 1]", rtp)));
        }
        if !(cap >= 1.0 && cap.is_finite()) {
            return Err(RoundFault::InvalidGeneratorInput(format!("cap {} below 1.00", cap)));
        }
        if tau.is_zero() {
            return Err(RoundFault::InvalidGeneratorInput("zero growth constant".to_string()));
        }
        Ok(Self { rtp, cap, tau })
    }

    pub fn from_config(config: &CrashConfig) -> Result<Self, RoundFault> {
        Self::new(config.rtp, config.cap, config.growth_tau())
    }

    pub fn rtp(&self) -> f64 {
        self.rtp
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Crash point for a uniform draw `r ∈ (0, 1]`: `rtp / r` clamped to `[1, cap]`
    pub fn crash_point_for(&self, r: f64) -> Result<CrashPoint, RoundFault> {
        if !(r > 0.0 && r <= 1.0) {
            return Err(RoundFault::InvalidGeneratorInput(format!(
                "uniform draw {} not in (0, 1]",
                r
            )));
        }
        let raw = (self.rtp / r).clamp(1.0, self.cap);
        Ok(CrashPoint(truncate_hundredths(raw).max(1.0)))
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CrashPoint, RoundFault> {
        // gen::<f64>() is [0, 1); flip it to (0, 1]
        let r = 1.0 - rng.gen::<f64>();
        self.crash_point_for(r)
    }

    /// Uncapped curve value after `elapsed` of running time
    pub fn multiplier_at(&self, elapsed: Duration) -> f64 {
        (elapsed.as_secs_f64() / self.tau.as_secs_f64()).exp()
    }

    /// Running time after which the curve reaches `multiplier`
    pub fn time_to_reach(&self, multiplier: f64) -> Duration {
        if !(multiplier > 1.0) {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.tau.as_secs_f64() * multiplier.ln())
    }

    /// `P(C >= x)` under this generator
    pub fn survival(&self, x: f64) -> f64 {
        if x <= 1.0 {
            1.0
        } else if x > self.cap {
            0.0
        } else {
            (self.rtp / x).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn curve() -> CrashCurve {
        CrashCurve::new(0.99, 10_000.0, Duration::from_millis(4_000)).unwrap()
    }

    #[test]
    fn test_inverse_transform_points() {
        let curve = curve();
        assert_eq!(curve.crash_point_for(0.5).unwrap().value(), 1.98);
        assert_eq!(curve.crash_point_for(0.99).unwrap().value(), 1.0);
        assert_eq!(curve.crash_point_for(1.0).unwrap().value(), 1.0);
        assert_eq!(curve.crash_point_for(1e-12).unwrap().value(), 10_000.0);
        // 0.99 / 0.3 = 3.3 exactly, 0.99 / 0.7 = 1.41428... truncates
        assert_eq!(curve.crash_point_for(0.3).unwrap().value(), 3.3);
        assert_eq!(curve.crash_point_for(0.7).unwrap().value(), 1.41);
    }

    #[test]
    fn test_invalid_draw_is_a_fault() {
        let curve = curve();
        assert!(curve.crash_point_for(0.0).is_err());
        assert!(curve.crash_point_for(1.5).is_err());
        assert!(curve.crash_point_for(f64::NAN).is_err());
    }

    #[test]
    fn test_curve_timing() {
        let curve = curve();
        assert_eq!(curve.multiplier_at(Duration::ZERO), 1.0);
        let t = curve.time_to_reach(2.0);
        assert!((curve.multiplier_at(t) - 2.0).abs() < 1e-9);
        assert_eq!(curve.time_to_reach(1.0), Duration::ZERO);
    }

    #[test]
    fn test_draws_stay_in_range() {
        let curve = curve();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let point = curve.draw(&mut rng).unwrap().value();
            assert!((1.0..=10_000.0).contains(&point));
        }
    }

    #[test]
    fn test_survival_matches_rtp_over_x() {
        let curve = curve();
        assert_eq!(curve.survival(1.0), 1.0);
        assert!((curve.survival(2.0) - 0.495).abs() < 1e-12);
        assert_eq!(curve.survival(20_000.0), 0.0);
    }
}

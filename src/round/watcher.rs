//! Auto-collect evaluation against the live multiplier

use super::slots::BetSlots;

/// An auto-collect that has been crossed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoCollect {
    pub slot: usize,
    pub threshold: f64,
}

/// Finds Active bets whose target the curve has reached
///
/// A target counts only when it is at or below the live value and strictly
/// below the round's crash point. A target equal to the crash point loses.
#[derive(Debug, Clone, Copy)]
pub struct AutoResolutionWatcher {
    ceiling: f64,
}

impl AutoResolutionWatcher {
    pub fn new(crash_point: f64) -> Self {
        Self { ceiling: crash_point }
    }

    /// Due collections in the order the curve crossed them
    pub fn due(&self, slots: &BetSlots, live: f64) -> Vec<AutoCollect> {
        let mut due: Vec<AutoCollect> = slots
            .bets()
            .filter(|bet| bet.is_active())
            .filter_map(|bet| {
                let threshold = bet.auto_collect_at()?;
                (threshold <= live && threshold < self.ceiling).then_some(AutoCollect {
                    slot: bet.slot,
                    threshold,
                })
            })
            .collect();
        due.sort_by(|a, b| a.threshold.total_cmp(&b.threshold).then(a.slot.cmp(&b.slot)));
        due
    }
}

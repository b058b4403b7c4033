//! Periodic tick loop for the timed round machines

use crate::games::GameType;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A round machine advanced by the passage of time
#[async_trait]
pub trait Tickable: Send {
    fn game(&self) -> GameType;

    fn cycle(&self) -> u64;

    /// Apply every transition due at `now`
    async fn tick(&mut self, now: Instant);
}

/// Tick `machine` every `period` until `cycles` further rounds have started
pub async fn drive_rounds<M: Tickable + ?Sized>(machine: &mut M, period: Duration, cycles: u64) {
    let target = machine.cycle().saturating_add(cycles);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(game = %machine.game(), from = machine.cycle(), to = target, "Driving rounds");
    while machine.cycle() < target {
        let now = ticker.tick().await;
        machine.tick(now).await;
        debug!(game = %machine.game(), cycle = machine.cycle(), "Tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown {
        started: Instant,
        cycle: u64,
        ticks: usize,
    }

    #[async_trait]
    impl Tickable for Countdown {
        fn game(&self) -> GameType {
            GameType::Crash
        }

        fn cycle(&self) -> u64 {
            self.cycle
        }

        async fn tick(&mut self, now: Instant) {
            self.ticks += 1;
            self.cycle = 1 + (now - self.started).as_secs();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_after_cycles() {
        let mut machine = Countdown {
            started: Instant::now(),
            cycle: 1,
            ticks: 0,
        };
        drive_rounds(&mut machine, Duration::from_millis(100), 3).await;

        assert_eq!(machine.cycle, 4);
        // first interval tick fires immediately
        assert_eq!(machine.ticks, 31);
    }
}

//! # Room Tick Clock
//!
//! Fixed-timestep pacing for `Engine::step`.
//!
//! The engine itself knows nothing about wall time; whoever drives a room
//! asks this clock whether a step is due, steps, and reports how long the
//! step took. A room that falls far behind drops the backlog instead of
//! replaying it in a burst.

use std::time::{Duration, Instant};

use tracing::warn;

use bullion_shared::constants::{TICK_DURATION_MICROS, TICK_RATE};

/// Backlog, in ticks, after which pending ticks are dropped.
const MAX_BACKLOG_TICKS: u32 = 5;

/// Fixed-timestep clock.
pub struct TickLoop {
    tick_duration: Duration,
    last_tick: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

/// Step timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Fastest step, in microseconds.
    pub min_tick_us: u64,
    /// Slowest step, in microseconds.
    pub max_tick_us: u64,
    /// Rolling average, in microseconds.
    pub avg_tick_us: u64,
    /// Steps that overran their budget.
    pub late_ticks: u64,
    /// Steps measured.
    pub total_ticks: u64,
    /// Ticks skipped after falling behind.
    pub dropped_ticks: u64,
}

impl TickStats {
    fn fresh(tick_us: u64) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: tick_us,
            late_ticks: 0,
            total_ticks: 0,
            dropped_ticks: 0,
        }
    }
}

impl TickLoop {
    /// Clock running at `tick_rate` steps per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(duration_us(tick_duration)),
        }
    }

    /// Clock at the room rate (20Hz).
    #[must_use]
    pub fn room() -> Self {
        Self::new(TICK_RATE)
    }

    /// True while at least one step is due. Call in a loop until false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;

        let limit = self.tick_duration * MAX_BACKLOG_TICKS;
        if self.accumulator > limit {
            let dropped = (self.accumulator - self.tick_duration).as_micros()
                / self.tick_duration.as_micros().max(1);
            self.stats.dropped_ticks += u64::try_from(dropped).unwrap_or(u64::MAX);
            warn!(dropped = %dropped, "room fell behind, dropping backlog");
            self.accumulator = self.tick_duration;
        }

        self.accumulator >= self.tick_duration
    }

    /// Marks the start of a step and returns its start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Records how long the step started at `start` took.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let us = duration_us(duration);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next step is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_tick.elapsed() + self.accumulator;
        if elapsed < self.tick_duration {
            std::thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Steps begun so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing so far.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Budget per step.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Clears timing.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(TICK_DURATION_MICROS);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::room()
    }
}

fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_rate() {
        let clock = TickLoop::room();
        assert_eq!(clock.tick_count(), 0);
        assert_eq!(clock.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_tick_execution() {
        let mut clock = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.should_tick());

        let start = clock.begin_tick();
        clock.end_tick(start);
        assert_eq!(clock.tick_count(), 1);
        assert_eq!(clock.stats().total_ticks, 1);
    }

    #[test]
    fn test_backlog_is_dropped() {
        let mut clock = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(30));
        assert!(clock.should_tick());
        assert!(clock.stats().dropped_ticks > 0);
        assert!(clock.accumulator <= clock.tick_duration * MAX_BACKLOG_TICKS);
    }
}

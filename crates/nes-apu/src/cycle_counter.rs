//! Drift-free cycle distribution
//!
//! Spreads a whole number of units (CPU cycles, output samples) over a fixed
//! number of ticks so that every full round adds up exactly.

/// Cycle counter distributing `max_cycle` units over `max_count` ticks
#[derive(Debug, Clone, Copy)]
pub struct CycleCounter {
    /// Units to distribute per round
    max_cycle: u32,
    /// Ticks per round
    max_count: u32,
    /// Ticks taken in the current round
    count: u32,
    /// Units handed out in the current round
    cycles: u32,
}

impl CycleCounter {
    /// Create a counter handing out one unit per tick
    pub fn new() -> Self {
        CycleCounter {
            max_cycle: 1,
            max_count: 1,
            count: 0,
            cycles: 0,
        }
    }

    /// Reconfigure the counter and restart the round
    ///
    /// # Arguments
    ///
    /// * `max_cycle` - Units to distribute per round (e.g. sample rate)
    /// * `max_count` - Ticks per round (e.g. frame rate); zero is treated as one
    pub fn set_param(&mut self, max_cycle: u32, max_count: u32) {
        self.max_cycle = max_cycle;
        self.max_count = max_count.max(1);
        self.reset();
    }

    /// Advance by one tick
    ///
    /// # Returns
    ///
    /// Units belonging to this tick
    pub fn tick(&mut self) -> u32 {
        self.count += 1;
        let previous = self.cycles;
        if self.count >= self.max_count {
            self.count = 0;
            self.cycles = 0;
            return self.max_cycle - previous;
        }
        self.cycles =
            ((self.max_cycle as u64 * self.count as u64) / self.max_count as u64) as u32;
        self.cycles - previous
    }

    /// Units handed out so far in the current round
    pub fn cycle_count(&self) -> u32 {
        self.cycles
    }

    /// Units per round
    pub fn max_cycle(&self) -> u32 {
        self.max_cycle
    }

    /// Restart the round
    pub fn reset(&mut self) {
        self.count = 0;
        self.cycles = 0;
    }
}

impl Default for CycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

use std::time::Duration;

/// (tick count, spacing in milliseconds) for each phase of a movement
const PHASES: [(u32, u64); 5] = [(7, 300), (6, 500), (5, 1_000), (5, 2_000), (6, 5_000)];

/// Decaying status poll offsets, measured from the start of a command.
///
/// Dense right after a command is issued, when a device is most likely to be
/// moving, then spreading out until the schedule is exhausted.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    phase: usize,
    tick: u32,
    elapsed: Duration,
}

impl PollSchedule {
    pub fn new() -> Self {
        Self {
            phase: 0,
            tick: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn restart(&mut self) {
        *self = Self::new();
    }

    /// Total number of ticks in a full schedule
    pub fn len() -> usize {
        PHASES.iter().map(|(count, _)| *count as usize).sum()
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for PollSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        while let Some(&(count, spacing)) = PHASES.get(self.phase) {
            if self.tick < count {
                self.tick += 1;
                self.elapsed += Duration::from_millis(spacing);
                return Some(self.elapsed);
            }

            self.phase += 1;
            self.tick = 0;
        }

        None
    }
}

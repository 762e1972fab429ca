use crate::world::state::{SaveReport, World};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval_seconds: u64,
}

impl AutosaveConfig {
    /// `None` when autosave is disabled.
    pub fn interval(self) -> Option<Duration> {
        if self.interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_seconds))
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutosaveState {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl AutosaveState {
    pub fn new(config: AutosaveConfig, now: Instant) -> Self {
        let interval = config.interval();
        let next_due = interval.map(|interval| now + interval);
        Self { interval, next_due }
    }

    pub fn due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|next| now >= next)
    }

    pub fn mark_saved(&mut self, now: Instant) {
        if let Some(interval) = self.interval {
            self.next_due = Some(now + interval);
        }
    }
}

#[derive(Debug, Default)]
pub struct AutosaveReport {
    pub saved: SaveReport,
    pub error: Option<String>,
}

/// Runs one full save and folds the outcome into a report for the loop to log.
pub fn autosave_world(world: &mut World) -> AutosaveReport {
    match world.save() {
        Ok(saved) => AutosaveReport { saved, error: None },
        Err(err) => AutosaveReport {
            saved: SaveReport::default(),
            error: Some(err.to_string()),
        },
    }
}

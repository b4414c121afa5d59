//! Transition detection across poll ticks.
//!
//! The detector remembers the last *known* power state. An unknown reading is
//! reported back as an error and leaves that memory untouched, so a sensor
//! hiccup never produces a spurious outage.

use super::state::{PowerState, TransitionEvent};
use crate::error::{BotError, Result};
use chrono::Local;

/// Tracks the last known power state and reports changes.
///
/// Owned by the poll loop and driven from a single task, so it needs no
/// synchronization.
///
/// # Example
/// ```ignore
/// let mut detector = TransitionDetector::new();
/// assert!(detector.observe(PowerState::Plugged)?.is_none()); // baseline
/// let event = detector.observe(PowerState::Unplugged)?.unwrap();
/// assert!(event.is_outage());
/// ```
#[derive(Debug, Default)]
pub struct TransitionDetector {
    /// `None` until the first known reading establishes a baseline.
    last_known: Option<PowerState>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self { last_known: None }
    }

    /// Feed one reading. Returns an event only when a known state differs
    /// from the previous known state.
    pub fn observe(&mut self, current: PowerState) -> Result<Option<TransitionEvent>> {
        if !current.is_known() {
            return Err(BotError::SensorUnavailable(
                "no power supply reported".to_string(),
            ));
        }

        let Some(previous) = self.last_known else {
            self.last_known = Some(current);
            return Ok(None);
        };

        if previous == current {
            return Ok(None);
        }

        self.last_known = Some(current);
        Ok(Some(TransitionEvent {
            from: previous,
            to: current,
            timestamp: Local::now(),
        }))
    }

    /// The last known state, if a baseline has been established.
    pub fn baseline(&self) -> Option<PowerState> {
        self.last_known
    }

    /// Forget the baseline; the next known reading becomes the new one.
    pub fn reset(&mut self) {
        self.last_known = None;
    }
}

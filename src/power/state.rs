//! Power state and transition event types.

use chrono::{DateTime, Local};
use std::fmt;

/// A single reading of the AC adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Plugged,
    Unplugged,
    /// No power supply could be read.
    Unknown,
}

impl PowerState {
    /// `Some(true)` when plugged, `Some(false)` when unplugged, `None` when unknown.
    pub fn as_plugged(self) -> Option<bool> {
        match self {
            PowerState::Plugged => Some(true),
            PowerState::Unplugged => Some(false),
            PowerState::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != PowerState::Unknown
    }
}

impl From<bool> for PowerState {
    fn from(plugged: bool) -> Self {
        if plugged {
            PowerState::Plugged
        } else {
            PowerState::Unplugged
        }
    }
}

impl From<Option<bool>> for PowerState {
    fn from(plugged: Option<bool>) -> Self {
        plugged.map_or(PowerState::Unknown, PowerState::from)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Plugged => write!(f, "plugged"),
            PowerState::Unplugged => write!(f, "unplugged"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A change between two consecutive known readings.
///
/// Both `from` and `to` are always known and always differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub from: PowerState,
    pub to: PowerState,
    pub timestamp: DateTime<Local>,
}

impl TransitionEvent {
    /// Power came back.
    pub fn is_restored(&self) -> bool {
        self.to == PowerState::Plugged
    }

    /// Power went out.
    pub fn is_outage(&self) -> bool {
        self.to == PowerState::Unplugged
    }
}

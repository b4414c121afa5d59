//! Power sensors.
//!
//! The production sensor reads the Linux power supply class in sysfs. Each
//! supply is a directory containing a `type` file plus either an `online`
//! file (mains/USB adapters) or a `status` file (batteries).

use super::state::PowerState;
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of power readings, sampled once per poll tick.
#[async_trait]
pub trait PowerSensor: Send + Sync {
    /// Read the current state. `Unknown` means no supply could be observed.
    async fn read(&self) -> Result<PowerState>;
}

pub const DEFAULT_POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Reads AC adapter state from `/sys/class/power_supply`.
pub struct SysfsPowerSensor {
    root: PathBuf,
}

impl SysfsPowerSensor {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_POWER_SUPPLY_DIR)
    }

    /// Use a different power supply directory (tests, containers with a bind mount).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scan all supplies. An adapter's `online` flag wins over battery status.
    fn scan(&self) -> PowerState {
        let Ok(entries) = fs::read_dir(&self.root) else {
            debug!("Power supply directory {:?} not readable", self.root);
            return PowerState::Unknown;
        };

        let mut battery_state = PowerState::Unknown;
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            let Some(kind) = read_attr(&path, "type") else {
                continue;
            };

            match kind.as_str() {
                "Mains" | "USB" => {
                    if let Some(online) = read_attr(&path, "online") {
                        match online.as_str() {
                            "1" => return PowerState::Plugged,
                            "0" => return PowerState::Unplugged,
                            _ => {}
                        }
                    }
                }
                "Battery" if battery_state == PowerState::Unknown => {
                    if let Some(status) = read_attr(&path, "status") {
                        battery_state = battery_status_to_state(&status);
                    }
                }
                _ => {}
            }
        }

        battery_state
    }
}

impl Default for SysfsPowerSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PowerSensor for SysfsPowerSensor {
    async fn read(&self) -> Result<PowerState> {
        Ok(self.scan())
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Map a battery `status` attribute to a power state.
fn battery_status_to_state(status: &str) -> PowerState {
    match status {
        "Discharging" => PowerState::Unplugged,
        "Charging" | "Full" | "Not charging" => PowerState::Plugged,
        _ => PowerState::Unknown,
    }
}

//! Simulated power sensor for development and testing.
//!
//! Lets the bot run on hosts without a battery or AC adapter. The state can
//! be set directly or flipped periodically by [`run_power_simulation`].

use super::sensor::PowerSensor;
use super::state::PowerState;
use crate::error::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Thread-safe simulated adapter.
pub struct SimulatedPowerSensor {
    plugged: AtomicBool,
    /// When false, reads report `Unknown` as if no supply were present.
    available: AtomicBool,
}

impl SimulatedPowerSensor {
    pub fn new(plugged: bool) -> Self {
        Self {
            plugged: AtomicBool::new(plugged),
            available: AtomicBool::new(true),
        }
    }

    pub fn set(&self, plugged: bool) {
        self.plugged.store(plugged, Ordering::SeqCst);
    }

    /// Flip the adapter and return the new value.
    pub fn toggle(&self) -> bool {
        // fetch_xor with true flips the bit
        !self.plugged.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn state(&self) -> PowerState {
        if self.available.load(Ordering::SeqCst) {
            PowerState::from(self.plugged.load(Ordering::SeqCst))
        } else {
            PowerState::Unknown
        }
    }
}

#[async_trait]
impl PowerSensor for SimulatedPowerSensor {
    async fn read(&self) -> Result<PowerState> {
        Ok(self.state())
    }
}

/// Spawn a task that toggles the simulated adapter every `period`.
///
/// The first toggle happens one full period after start so the poll loop
/// sees a baseline first.
pub fn run_power_simulation(
    sensor: Arc<SimulatedPowerSensor>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; swallow that tick
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let plugged = sensor.toggle();
                    info!("[Sim] Power adapter toggled to: {}", PowerState::from(plugged));
                }
            }
        }
    })
}

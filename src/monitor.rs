//! Power monitor poll loop.
//!
//! Samples the sensor at a fixed interval, runs the reading through the
//! transition detector and hands any transition to the notifier. A failing
//! tick is logged and skipped; only cancellation ends the loop.

use crate::notifier::{DeliveryOutcome, Notifier};
use crate::power::{PowerSensor, PowerState, TransitionDetector, TransitionEvent};
use crate::subscribers::SubscriberStore;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// What a single tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub event: Option<TransitionEvent>,
    pub outcomes: Vec<DeliveryOutcome>,
}

pub struct PowerMonitor {
    sensor: Arc<dyn PowerSensor>,
    detector: TransitionDetector,
    notifier: Notifier,
    subscribers: Arc<SubscriberStore>,
    poll_interval: Duration,
}

impl PowerMonitor {
    pub fn new(
        sensor: Arc<dyn PowerSensor>,
        notifier: Notifier,
        subscribers: Arc<SubscriberStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            sensor,
            detector: TransitionDetector::new(),
            notifier,
            subscribers,
            poll_interval,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "[Monitor] Checking power every {:?}",
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // A partial fan-out is dropped on cancel
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.tick() => {}
            }
        }
        info!("[Monitor] Stopping power monitor");
    }

    /// Sample once and notify on a transition.
    pub async fn tick(&mut self) -> TickReport {
        let reading = match self.sensor.read().await {
            Ok(reading) => reading,
            Err(e) => {
                error!("[Monitor] Error checking power status: {}", e);
                return TickReport::default();
            }
        };

        let event = match self.detector.observe(reading) {
            Ok(Some(event)) => event,
            Ok(None) => return TickReport::default(),
            Err(e) => {
                error!("[Monitor] Failed to get power status: {}", e);
                return TickReport::default();
            }
        };

        match event.to {
            PowerState::Plugged => warn!("[Monitor] Power restored - connected to AC power"),
            _ => warn!("[Monitor] Power outage detected"),
        }

        let recipients = self.subscribers.snapshot();
        let outcomes = self.notifier.notify(&event, &recipients).await;

        TickReport {
            event: Some(event),
            outcomes,
        }
    }

    pub fn detector(&self) -> &TransitionDetector {
        &self.detector
    }
}

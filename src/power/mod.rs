//! Power state observation.
//!
//! Sensors produce a fresh [`PowerState`] every poll tick; the
//! [`TransitionDetector`] turns the stream of readings into
//! [`TransitionEvent`]s.

pub mod detector;
pub mod sensor;
pub mod simulation;
pub mod state;

pub use detector::TransitionDetector;
pub use sensor::{PowerSensor, SysfsPowerSensor};
pub use simulation::SimulatedPowerSensor;
pub use state::{PowerState, TransitionEvent};

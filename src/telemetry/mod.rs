//! Periodic telemetry: when to publish and what to read.

pub mod scheduler;
pub mod sensor;

pub use scheduler::{ScheduleTimer, TelemetryScheduler};
pub use sensor::{SensorReadings, SensorSource, SimulatedSensors};

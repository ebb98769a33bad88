use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Elapsed-time trigger for one periodic task.
///
/// Fires when at least `interval` passed since the previous firing. The
/// reference point is reset to the firing tick, so a stalled loop delays the
/// next firing instead of producing a burst of catch-up firings.
#[derive(Debug, Clone)]
pub struct ScheduleTimer {
    interval: Duration,
    last_fired: Instant,
}

impl ScheduleTimer {
    /// Armed at `start`: the first firing is one interval later.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last_fired: start,
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_fired) >= self.interval {
            self.last_fired = now;
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_fired(&self) -> Instant {
        self.last_fired
    }
}

/// The two periodic publish tasks of the bridge.
#[derive(Debug, Clone)]
pub struct TelemetryScheduler {
    sensor: ScheduleTimer,
    mirror: ScheduleTimer,
}

impl TelemetryScheduler {
    pub fn new(sensor_interval: Duration, mirror_interval: Duration, start: Instant) -> Self {
        debug!(
            "Telemetry every {:?}, state mirror every {:?}",
            sensor_interval, mirror_interval
        );
        Self {
            sensor: ScheduleTimer::new(sensor_interval, start),
            mirror: ScheduleTimer::new(mirror_interval, start),
        }
    }

    /// Whether the sensor readings are due for publishing.
    pub fn sensor_due(&mut self, now: Instant) -> bool {
        self.sensor.poll(now)
    }

    /// Whether the actuator state is due for mirroring.
    pub fn mirror_due(&mut self, now: Instant) -> bool {
        self.mirror.poll(now)
    }
}

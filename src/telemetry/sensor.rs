use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// One reading of the four sensor channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub temperature: f32,
    pub pressure: f32,
    pub air_quality: f32,
    pub light: f32,
}

impl SensorReadings {
    /// Wire format of the telemetry topic, channels in fixed order.
    pub fn to_payload(&self) -> String {
        format!(
            "{:.2},{:.2},{:.2},{:.2}",
            self.temperature, self.pressure, self.air_quality, self.light
        )
    }
}

impl fmt::Display for SensorReadings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "temperature {:.2}, pressure {:.2}, air {:.2}, light {:.2}",
            self.temperature, self.pressure, self.air_quality, self.light
        )
    }
}

pub trait SensorSource: Send {
    fn read(&mut self) -> SensorReadings;
}

/// Stand-in for real probes: uniform integer part plus uniform hundredths.
pub struct SimulatedSensors {
    rng: StdRng,
}

impl SimulatedSensors {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sequence, used by tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn channel(&mut self, whole_max: u32) -> f32 {
        let whole = self.rng.random_range(0..whole_max);
        let hundredths = self.rng.random_range(0..100u32);
        whole as f32 + hundredths as f32 / 100.0
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SimulatedSensors {
    fn read(&mut self) -> SensorReadings {
        SensorReadings {
            temperature: self.channel(100),
            pressure: self.channel(1000),
            air_quality: self.channel(500),
            light: self.channel(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        let readings = SensorReadings {
            temperature: 23.45,
            pressure: 812.1,
            air_quality: 137.6,
            light: 54.2,
        };
        assert_eq!(readings.to_payload(), "23.45,812.10,137.60,54.20");
    }

    #[test]
    fn test_simulated_ranges() {
        let mut sensors = SimulatedSensors::seeded(7);
        for _ in 0..1000 {
            let r = sensors.read();
            assert!((0.0..100.0).contains(&r.temperature), "{r}");
            assert!((0.0..1000.0).contains(&r.pressure), "{r}");
            assert!((0.0..500.0).contains(&r.air_quality), "{r}");
            assert!((0.0..100.0).contains(&r.light), "{r}");
            assert_eq!(r.to_payload().split(',').count(), 4);
        }
    }

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = SimulatedSensors::seeded(42);
        let mut b = SimulatedSensors::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.read(), b.read());
        }
    }
}

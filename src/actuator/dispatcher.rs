//! Applies decoded commands to the actuator bank.

use super::hardware::{DigitalOutput, HardwareError, OutputFactory, ServoOutput};
use super::{ActuatorId, ActuatorKind, ActuatorState, SERVO_CLOSED_DEGREES, SERVO_OPEN_DEGREES};
use crate::config::PinConfig;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown actuator: {0:?}")]
    UnknownActuator(String),

    #[error("Hardware error on {actuator}: {source}")]
    Hardware {
        actuator: ActuatorId,
        #[source]
        source: HardwareError,
    },
}

enum Driver {
    Switch(Box<dyn DigitalOutput>),
    Servo(Box<dyn ServoOutput>),
}

struct Actuator {
    id: ActuatorId,
    pin: u8,
    state: ActuatorState,
    driver: Driver,
}

/// Owns every actuator together with its driver and logical state.
///
/// The logical state only changes after the driver accepted the write, so a
/// failed write leaves the last known good state in place.
pub struct ActuatorBank {
    actuators: Vec<Actuator>,
}

impl ActuatorBank {
    /// Claims one output per actuator from `factory`.
    pub fn open(pins: &PinConfig, factory: &mut dyn OutputFactory) -> Result<Self, HardwareError> {
        let mut actuators = Vec::with_capacity(ActuatorId::ALL.len());

        // ALL is in index order, so actuators[id.index()] is id
        for id in ActuatorId::ALL {
            let pin = pins.pin_for(id);
            let driver = match id.kind() {
                ActuatorKind::Switch => Driver::Switch(factory.digital(pin)?),
                ActuatorKind::TwoPosition => Driver::Servo(factory.servo(pin)?),
            };
            info!("Actuator {} on GPIO {}", id, pin);
            actuators.push(Actuator {
                id,
                pin,
                state: ActuatorState::rest(id.kind()),
                driver,
            });
        }

        Ok(Self { actuators })
    }

    /// Resolves `target` and applies `value` to it.
    ///
    /// Switched outputs go high for any non-zero value. The servo moves to
    /// 180° for any non-zero value and to 0° otherwise.
    pub fn dispatch(&mut self, target: &str, value: i32) -> Result<ActuatorState, DispatchError> {
        let id = ActuatorId::from_name(target)
            .ok_or_else(|| DispatchError::UnknownActuator(target.to_string()))?;

        let state = match id.kind() {
            ActuatorKind::Switch => ActuatorState::Switch(value != 0),
            ActuatorKind::TwoPosition if value == 0 => ActuatorState::Angle(SERVO_CLOSED_DEGREES),
            ActuatorKind::TwoPosition => ActuatorState::Angle(SERVO_OPEN_DEGREES),
        };

        self.apply(id, state)?;
        Ok(state)
    }

    /// Drives a switched output directly. Used by the cloud feed path.
    pub fn set_switch(&mut self, id: ActuatorId, on: bool) -> Result<(), DispatchError> {
        self.apply(id, ActuatorState::Switch(on))
    }

    /// Returns every actuator to its rest state. Stops at the first failure.
    pub fn reset_all(&mut self) -> Result<(), DispatchError> {
        for id in ActuatorId::ALL {
            self.apply(id, ActuatorState::rest(id.kind()))?;
        }
        info!("All actuators at rest");
        Ok(())
    }

    pub fn state(&self, id: ActuatorId) -> ActuatorState {
        self.actuators[id.index()].state
    }

    pub fn is_on(&self, id: ActuatorId) -> bool {
        self.state(id).is_active()
    }

    /// What the driver reports for the physical output, independent of the
    /// logical state.
    pub fn output_level(&self, id: ActuatorId) -> ActuatorState {
        match &self.actuators[id.index()].driver {
            Driver::Switch(output) => ActuatorState::Switch(output.is_high()),
            Driver::Servo(servo) => ActuatorState::Angle(servo.angle()),
        }
    }

    pub fn pin(&self, id: ActuatorId) -> u8 {
        self.actuators[id.index()].pin
    }

    fn apply(&mut self, id: ActuatorId, state: ActuatorState) -> Result<(), DispatchError> {
        let actuator = &mut self.actuators[id.index()];
        debug_assert_eq!(actuator.id, id);

        let written = match (&mut actuator.driver, state) {
            (Driver::Switch(output), ActuatorState::Switch(on)) => output.write(on),
            (Driver::Servo(servo), ActuatorState::Angle(degrees)) => servo.set_angle(degrees),
            (Driver::Switch(output), ActuatorState::Angle(degrees)) => output.write(degrees != 0),
            (Driver::Servo(servo), ActuatorState::Switch(on)) => servo.set_angle(if on {
                SERVO_OPEN_DEGREES
            } else {
                SERVO_CLOSED_DEGREES
            }),
        };
        written.map_err(|source| DispatchError::Hardware {
            actuator: id,
            source,
        })?;

        let previous = std::mem::replace(&mut actuator.state, state);
        if previous != state {
            info!("{} (GPIO {}): {} -> {}", id, actuator.pin, previous, state);
        } else {
            debug!("{} (GPIO {}) unchanged: {}", id, actuator.pin, state);
        }
        Ok(())
    }
}

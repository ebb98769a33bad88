//! # Actuators
//!
//! The five physical outputs the bridge drives and the dispatcher that maps
//! decoded commands onto them.
//!
//! ```text
//! Command ──► ActuatorId::from_name ──► ActuatorBank ──► DigitalOutput / ServoOutput
//!                                           ▲
//!                      cloud feed path ─────┘ (set_switch)
//! ```
//!
//! Four actuators are plain switched GPIO outputs. `air` sits on a hobby servo
//! that is only ever moved between its two end positions (0° and 180°).

pub mod dispatcher;
pub mod hardware;

pub use dispatcher::{ActuatorBank, DispatchError};
pub use hardware::{
    DigitalOutput, HardwareError, OutputFactory, RppalOutputs, ServoOutput, SimulatedOutputs,
};

use std::fmt;

/// Servo angle for a zero command value.
pub const SERVO_CLOSED_DEGREES: u8 = 0;
/// Servo angle for any non-zero command value.
pub const SERVO_OPEN_DEGREES: u8 = 180;

/// Closed set of actuators addressable over the command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    Temperature,
    Pressure,
    Air,
    Light,
    Fan,
}

/// How an actuator interprets a command value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    /// 0 = low, anything else = high
    Switch,
    /// 0 = closed angle, anything else = open angle
    TwoPosition,
}

/// Logical state as last applied to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Switch(bool),
    Angle(u8),
}

impl ActuatorId {
    pub const ALL: [ActuatorId; 5] = [
        ActuatorId::Temperature,
        ActuatorId::Pressure,
        ActuatorId::Air,
        ActuatorId::Light,
        ActuatorId::Fan,
    ];

    /// Exact, case-sensitive lookup of a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "temperature" => Some(ActuatorId::Temperature),
            "pressure" => Some(ActuatorId::Pressure),
            "air" => Some(ActuatorId::Air),
            "light" => Some(ActuatorId::Light),
            "fan" => Some(ActuatorId::Fan),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ActuatorId::Temperature => "temperature",
            ActuatorId::Pressure => "pressure",
            ActuatorId::Air => "air",
            ActuatorId::Light => "light",
            ActuatorId::Fan => "fan",
        }
    }

    pub fn kind(self) -> ActuatorKind {
        match self {
            ActuatorId::Air => ActuatorKind::TwoPosition,
            ActuatorId::Temperature
            | ActuatorId::Pressure
            | ActuatorId::Light
            | ActuatorId::Fan => ActuatorKind::Switch,
        }
    }

    fn index(self) -> usize {
        match self {
            ActuatorId::Temperature => 0,
            ActuatorId::Pressure => 1,
            ActuatorId::Air => 2,
            ActuatorId::Light => 3,
            ActuatorId::Fan => 4,
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ActuatorState {
    /// Rest state an actuator of `kind` is driven to at startup and shutdown.
    pub fn rest(kind: ActuatorKind) -> Self {
        match kind {
            ActuatorKind::Switch => ActuatorState::Switch(false),
            ActuatorKind::TwoPosition => ActuatorState::Angle(SERVO_CLOSED_DEGREES),
        }
    }

    pub fn is_active(self) -> bool {
        match self {
            ActuatorState::Switch(on) => on,
            ActuatorState::Angle(degrees) => degrees != SERVO_CLOSED_DEGREES,
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::Switch(true) => write!(f, "ON"),
            ActuatorState::Switch(false) => write!(f, "OFF"),
            ActuatorState::Angle(degrees) => write!(f, "{degrees}°"),
        }
    }
}

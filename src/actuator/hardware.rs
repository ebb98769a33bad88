//! GPIO seam for the actuator bank.
//!
//! [`RppalOutputs`] drives real pins on a Raspberry Pi through `rppal`.
//! [`SimulatedOutputs`] keeps levels in memory so the bridge runs on any
//! machine (`hardware.simulated = true`) and so tests can observe what was
//! written.

use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Hobby servo frame period (50 Hz).
const SERVO_PERIOD: Duration = Duration::from_millis(20);
/// Pulse width at 0°.
const SERVO_MIN_PULSE_US: u64 = 544;
/// Pulse width at 180°.
const SERVO_MAX_PULSE_US: u64 = 2400;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("GPIO error on pin {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: rppal::gpio::Error,
    },

    #[error("GPIO controller unavailable: {0}")]
    Unavailable(#[from] rppal::gpio::Error),

    #[error("Servo angle {0}° out of range (0-180)")]
    AngleOutOfRange(u8),
}

/// A single switched output.
pub trait DigitalOutput: Send {
    fn write(&mut self, high: bool) -> Result<(), HardwareError>;

    /// Level currently driven on the pin.
    fn is_high(&self) -> bool;
}

/// A positional servo output.
pub trait ServoOutput: Send {
    fn set_angle(&mut self, degrees: u8) -> Result<(), HardwareError>;

    /// Last angle successfully commanded.
    fn angle(&self) -> u8;
}

/// Hands out output drivers for BCM pin numbers.
pub trait OutputFactory {
    fn digital(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, HardwareError>;

    fn servo(&mut self, pin: u8) -> Result<Box<dyn ServoOutput>, HardwareError>;
}

/// Pulse width for `degrees`, linear between the servo end points.
pub fn servo_pulse_width(degrees: u8) -> Result<Duration, HardwareError> {
    if degrees > 180 {
        return Err(HardwareError::AngleOutOfRange(degrees));
    }
    let span = SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US;
    let micros = SERVO_MIN_PULSE_US + span * u64::from(degrees) / 180;
    Ok(Duration::from_micros(micros))
}

pub struct RppalOutputs {
    gpio: Gpio,
}

impl RppalOutputs {
    pub fn new() -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        info!("GPIO controller opened");
        Ok(Self { gpio })
    }

    fn output_pin(&self, pin: u8) -> Result<OutputPin, HardwareError> {
        let output = self
            .gpio
            .get(pin)
            .map_err(|source| HardwareError::Gpio { pin, source })?
            .into_output_low();
        Ok(output)
    }
}

impl OutputFactory for RppalOutputs {
    fn digital(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, HardwareError> {
        debug!("Claiming GPIO {} as digital output", pin);
        Ok(Box::new(RppalPin {
            pin,
            output: self.output_pin(pin)?,
        }))
    }

    fn servo(&mut self, pin: u8) -> Result<Box<dyn ServoOutput>, HardwareError> {
        debug!("Claiming GPIO {} as servo output", pin);
        Ok(Box::new(RppalServo {
            pin,
            output: self.output_pin(pin)?,
            degrees: 0,
        }))
    }
}

struct RppalPin {
    pin: u8,
    output: OutputPin,
}

impl DigitalOutput for RppalPin {
    fn write(&mut self, high: bool) -> Result<(), HardwareError> {
        if high {
            self.output.set_high();
        } else {
            self.output.set_low();
        }
        debug!("GPIO {} -> {}", self.pin, if high { "HIGH" } else { "LOW" });
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.output.is_set_high()
    }
}

/// Servo on software PWM.
struct RppalServo {
    pin: u8,
    output: OutputPin,
    degrees: u8,
}

impl ServoOutput for RppalServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), HardwareError> {
        let pulse = servo_pulse_width(degrees)?;
        self.output
            .set_pwm(SERVO_PERIOD, pulse)
            .map_err(|source| HardwareError::Gpio {
                pin: self.pin,
                source,
            })?;
        self.degrees = degrees;
        debug!("Servo on GPIO {} -> {}° ({:?})", self.pin, degrees, pulse);
        Ok(())
    }

    fn angle(&self) -> u8 {
        self.degrees
    }
}

#[derive(Debug, Default)]
pub struct SimulatedOutputs;

impl OutputFactory for SimulatedOutputs {
    fn digital(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, HardwareError> {
        Ok(Box::new(SimulatedPin { pin, high: false }))
    }

    fn servo(&mut self, pin: u8) -> Result<Box<dyn ServoOutput>, HardwareError> {
        Ok(Box::new(SimulatedServo { pin, degrees: 0 }))
    }
}

#[derive(Debug)]
struct SimulatedPin {
    pin: u8,
    high: bool,
}

impl DigitalOutput for SimulatedPin {
    fn write(&mut self, high: bool) -> Result<(), HardwareError> {
        self.high = high;
        debug!("[SIM] GPIO {} -> {}", self.pin, if high { "HIGH" } else { "LOW" });
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.high
    }
}

#[derive(Debug)]
struct SimulatedServo {
    pin: u8,
    degrees: u8,
}

impl ServoOutput for SimulatedServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), HardwareError> {
        servo_pulse_width(degrees)?;
        self.degrees = degrees;
        debug!("[SIM] Servo on GPIO {} -> {}°", self.pin, degrees);
        Ok(())
    }

    fn angle(&self) -> u8 {
        self.degrees
    }
}

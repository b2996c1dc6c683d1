//! # Actuator interface
//!
//! The capability boundary between the drive controller and the physical
//! drive train. The controller only ever talks to an [`Actuators`]
//! implementation: the simulation model here ([`sim::SimVehicle`]) or, on
//! the vehicle, the motor-controller driver.
//!
//! The drive train is a four wheel differential layout. The front motor on
//! each side is the master and carries the demand; the rear motors are
//! electrically slaved to their front neighbour and are always commanded
//! zero.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of drive motors on the vehicle.
pub const NUM_MOTORS: usize = 4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifies a drive motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Motor {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

/// The control mode asserted on the motor controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Demands are normalised output fractions in [-1, 1].
    OpenLoop,

    /// Demands are wheel linear velocities in inches/second.
    Velocity,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Non-blocking command/sense interface to the drive train hardware.
pub trait Actuators {
    /// Assert the control mode on all motor controllers.
    ///
    /// Must be safe to call redundantly: the physical controllers can be
    /// reset externally, so callers re-assert the mode rather than edge
    /// triggering it.
    fn set_control_mode(&mut self, mode: ControlMode);

    /// Push brake (true) or coast (false) mode to all motor controllers.
    fn set_brake_mode(&mut self, brake: bool);

    /// Set the demand for a single motor. Interpretation depends on the
    /// asserted control mode.
    fn set_demand(&mut self, motor: Motor, demand: f64);

    /// Raw encoder rate for the given motor.
    ///
    /// Units: ticks per 100 ms (native sensor velocity window)
    fn speed_ticks(&self, motor: Motor) -> f64;

    /// Raw heading sensor angle. Unwrapped - may exceed [0, 360).
    ///
    /// Units: degrees
    fn raw_heading_deg(&self) -> f64;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Motor {
    /// All motors, front (master) pair first.
    pub const ALL: [Motor; NUM_MOTORS] = [
        Motor::FrontLeft,
        Motor::FrontRight,
        Motor::RearLeft,
        Motor::RearRight,
    ];

    /// Dense index for array-backed implementations.
    pub fn index(self) -> usize {
        match self {
            Motor::FrontLeft => 0,
            Motor::FrontRight => 1,
            Motor::RearLeft => 2,
            Motor::RearRight => 3,
        }
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::OpenLoop
    }
}

/// Shared single-threaded handles forward to the inner implementation.
/// This is how the simulation is owned by both the controller (as its
/// actuator sink) and the cyclic executive (for stepping).
impl<A: Actuators> Actuators for Rc<RefCell<A>> {
    fn set_control_mode(&mut self, mode: ControlMode) {
        self.borrow_mut().set_control_mode(mode)
    }

    fn set_brake_mode(&mut self, brake: bool) {
        self.borrow_mut().set_brake_mode(brake)
    }

    fn set_demand(&mut self, motor: Motor, demand: f64) {
        self.borrow_mut().set_demand(motor, demand)
    }

    fn speed_ticks(&self, motor: Motor) -> f64 {
        self.borrow().speed_ticks(motor)
    }

    fn raw_heading_deg(&self) -> f64 {
        self.borrow().raw_heading_deg()
    }
}

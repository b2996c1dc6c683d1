//! # Simulated drive train
//!
//! A kinematic differential-drive model standing in for the vehicle
//! hardware. It accepts the same demands the motor-controller driver would,
//! integrates them into a pose, and synthesises the encoder and heading
//! sensor readings the rest of the software expects.
//!
//! The model is deliberately simple: wheel velocities are taken up
//! instantly, there is no slip, and the heading sensor is noise free. That
//! is enough to exercise the full control loop in the executable and in
//! integration tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::{Actuators, ControlMode, Motor, NUM_MOTORS};
use crate::geom::{heading_from_degrees, Pose, Twist};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated vehicle state.
#[derive(Default)]
pub struct SimVehicle {
    params: SimParams,

    control_mode: ControlMode,
    brake: bool,
    demands: [f64; NUM_MOTORS],

    /// True pose of the simulated vehicle in the field frame.
    pose: Pose,

    /// Current wheel linear velocities.
    ///
    /// Units: inches/second
    left_ips: f64,
    right_ips: f64,

    /// Unwrapped heading sensor angle.
    ///
    /// Units: degrees
    heading_deg: f64,
}

/// Simulation parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct SimParams {
    /// Wheel diameter, used to synthesise encoder rates.
    ///
    /// Units: inches
    pub wheel_diameter_in: f64,

    /// Encoder resolution.
    ///
    /// Units: ticks/revolution
    pub encoder_ticks_per_rev: f64,

    /// Lateral distance between the wheel contact lines.
    ///
    /// Units: inches
    pub track_width_in: f64,

    /// Wheel speed produced by a full open-loop demand.
    ///
    /// Units: inches/second
    pub max_open_loop_ips: f64,

    /// Starting pose of the vehicle in the field frame.
    pub start_x_in: f64,
    pub start_y_in: f64,
    pub start_heading_deg: f64,
}

/// Input to one simulation step.
pub struct SimInput {
    /// The step duration.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// The observation produced by one simulation step, feeding the pose
/// history the way odometry would on the vehicle.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SimObservation {
    /// Pose after the step.
    pub pose: Pose,

    /// Body-frame delta over the step.
    pub delta: Twist,

    /// Body-frame velocity during the step.
    pub velocity: Twist,
}

/// Status of the simulation step.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SimStatusReport {
    /// Commanded wheel velocities after demand interpretation.
    ///
    /// Units: inches/second
    pub left_ips: f64,
    pub right_ips: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the simulation step.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Simulation step duration must be finite and positive, got {0}")]
    InvalidStepDuration(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            wheel_diameter_in: 6.0,
            encoder_ticks_per_rev: 4096.0,
            track_width_in: 26.0,
            max_open_loop_ips: 120.0,
            start_x_in: 0.0,
            start_y_in: 0.0,
            start_heading_deg: 0.0,
        }
    }
}

impl SimVehicle {
    /// Create a simulated vehicle directly from parameters, without a
    /// session. Used by tests and callers which load parameters themselves.
    pub fn with_params(params: SimParams) -> Self {
        let pose = Pose::new(
            Vector2::new(params.start_x_in, params.start_y_in),
            heading_from_degrees(params.start_heading_deg),
        );
        let heading_deg = params.start_heading_deg;

        Self {
            params,
            pose,
            heading_deg,
            ..Default::default()
        }
    }

    /// The true pose of the simulated vehicle.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Convert a wheel linear velocity into a raw encoder rate.
    fn ips_to_ticks(&self, speed_ips: f64) -> f64 {
        speed_ips / (std::f64::consts::PI * self.params.wheel_diameter_in)
            * self.params.encoder_ticks_per_rev
            / 10.0
    }
}

impl State for SimVehicle {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = SimInput;
    type OutputData = SimObservation;
    type StatusReport = SimStatusReport;
    type ProcError = SimError;

    /// Initialise the simulation.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: SimParams = params::load(init_data)?;
        *self = Self::with_params(params);

        Ok(())
    }

    /// Step the simulation by the given duration.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let dt_s = input_data.dt_s;

        if !dt_s.is_finite() || dt_s <= 0.0 {
            return Err(SimError::InvalidStepDuration(dt_s));
        }

        // Interpret the master (front) demands under the asserted mode
        let (left_ips, right_ips) = match self.control_mode {
            ControlMode::Velocity => (
                self.demands[Motor::FrontLeft.index()],
                self.demands[Motor::FrontRight.index()],
            ),
            ControlMode::OpenLoop => (
                self.demands[Motor::FrontLeft.index()] * self.params.max_open_loop_ips,
                self.demands[Motor::FrontRight.index()] * self.params.max_open_loop_ips,
            ),
        };

        self.left_ips = left_ips;
        self.right_ips = right_ips;

        // Differential drive kinematics
        let speed_ips = (left_ips + right_ips) / 2.0;
        let omega_rads = (right_ips - left_ips) / self.params.track_width_in;

        let arc_in = speed_ips * dt_s;
        let dtheta_rad = omega_rads * dt_s;

        self.pose = self.pose.compose(&Pose::new(
            Vector2::new(arc_in, 0.0),
            nalgebra::UnitComplex::new(dtheta_rad),
        ));
        self.heading_deg += dtheta_rad.to_degrees();

        trace!(
            "Sim step: v = {:.2} ips, w = {:.3} rad/s, pose = ({:.2}, {:.2})",
            speed_ips,
            omega_rads,
            self.pose.position_in[0],
            self.pose.position_in[1]
        );

        let delta = Twist {
            dx_in: arc_in,
            dy_in: 0.0,
            dtheta_rad,
        };

        Ok((
            SimObservation {
                pose: self.pose,
                delta,
                velocity: delta.scaled(1.0 / dt_s),
            },
            SimStatusReport {
                left_ips,
                right_ips,
            },
        ))
    }
}

impl Actuators for SimVehicle {
    fn set_control_mode(&mut self, mode: ControlMode) {
        self.control_mode = mode;
    }

    fn set_brake_mode(&mut self, brake: bool) {
        self.brake = brake;
    }

    fn set_demand(&mut self, motor: Motor, demand: f64) {
        self.demands[motor.index()] = demand;
    }

    fn speed_ticks(&self, motor: Motor) -> f64 {
        match motor {
            Motor::FrontLeft | Motor::RearLeft => self.ips_to_ticks(self.left_ips),
            Motor::FrontRight | Motor::RearRight => self.ips_to_ticks(self.right_ips),
        }
    }

    fn raw_heading_deg(&self) -> f64 {
        self.heading_deg
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_drives_straight_in_velocity_mode() {
        let mut sim = SimVehicle::with_params(SimParams::default());

        sim.set_control_mode(ControlMode::Velocity);
        sim.set_demand(Motor::FrontLeft, 10.0);
        sim.set_demand(Motor::FrontRight, 10.0);

        for _ in 0..50 {
            sim.proc(&SimInput { dt_s: 0.02 }).unwrap();
        }

        // 10 ips for 1 s
        assert_near(sim.pose().position_in[0], 10.0, 1e-6);
        assert_near(sim.pose().position_in[1], 0.0, 1e-6);
        assert_near(sim.raw_heading_deg(), 0.0, 1e-9);
    }

    #[test]
    fn test_point_turn_changes_heading_only() {
        let mut sim = SimVehicle::with_params(SimParams::default());

        sim.set_control_mode(ControlMode::Velocity);
        sim.set_demand(Motor::FrontLeft, -5.0);
        sim.set_demand(Motor::FrontRight, 5.0);

        for _ in 0..50 {
            sim.proc(&SimInput { dt_s: 0.02 }).unwrap();
        }

        assert_near(sim.pose().position_in[0], 0.0, 1e-6);
        assert_near(sim.pose().position_in[1], 0.0, 1e-6);

        // omega = 10 / 26 rad/s for 1 s
        assert_near(
            sim.raw_heading_deg(),
            (10f64 / 26.0).to_degrees(),
            1e-6,
        );
    }

    #[test]
    fn test_open_loop_demand_scaling() {
        let mut sim = SimVehicle::with_params(SimParams::default());

        sim.set_control_mode(ControlMode::OpenLoop);
        sim.set_demand(Motor::FrontLeft, 0.5);
        sim.set_demand(Motor::FrontRight, 0.5);

        let (_, status) = sim.proc(&SimInput { dt_s: 0.02 }).unwrap();

        assert_near(status.left_ips, 60.0, 1e-9);
        assert_near(status.right_ips, 60.0, 1e-9);
    }

    #[test]
    fn test_encoder_rate_synthesis() {
        let mut params = SimParams::default();
        params.wheel_diameter_in = 1.0;
        params.encoder_ticks_per_rev = 200.0;

        let mut sim = SimVehicle::with_params(params);

        sim.set_control_mode(ControlMode::Velocity);
        sim.set_demand(Motor::FrontLeft, 10.0 * std::f64::consts::PI);
        sim.set_demand(Motor::FrontRight, 10.0 * std::f64::consts::PI);
        sim.proc(&SimInput { dt_s: 0.02 }).unwrap();

        // 10 pi ips on a 1 in wheel is 10 rev/s, i.e. 200 ticks per 100 ms
        assert_near(sim.speed_ticks(Motor::FrontLeft), 200.0, 1e-9);

        // Rejects a bad step
        assert!(sim.proc(&SimInput { dt_s: f64::NAN }).is_err());
    }
}

//! Implementations for the drive control state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use nalgebra::UnitComplex;
use serde::Serialize;

// Internal
use super::{follower, DriveError, DriveSignal, Params};
use crate::actuators::{Actuators, ControlMode, Motor};
use crate::geom::heading_from_degrees;
use crate::path::Path;
use crate::pose_hist::PoseProvider;
use util::{
    archive::{Archived, Archiver},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Encoder velocity is reported over a 100 ms window, so there are ten
/// windows per second.
const TICK_WINDOWS_PER_S: f64 = 10.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control state.
///
/// Owns the actuator sink and a read-only handle on the pose history. All
/// state is mutated only by the command entry points and the cyclic
/// [`Drive::update_path_follower`]; the structure is single threaded by
/// design.
pub struct Drive<A: Actuators, P: PoseProvider> {
    params: Params,

    actuators: A,
    pose_provider: P,

    /// Executing mode
    mode: DriveMode,

    /// The active path. Replaced wholesale by `set_want_drive_path`,
    /// cleared on any open loop command.
    path: Option<Path>,

    /// Drive backward along the active path.
    reversed: bool,

    /// Terminal flag for the active path. Once set it stays set until a new
    /// path is installed.
    done_with_path: bool,

    /// Wheel velocities commanded on the previous path-following cycle,
    /// held when a sensor reading goes non-finite.
    ///
    /// Units: inches/second
    last_cmd_ips: (f64, f64),

    report: StatusReport,
    arch_report: Archiver,
}

/// The status report containing monitoring quantities for one cycle.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    /// Time of the cycle this report was produced on.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Arc-length progress along the active path.
    ///
    /// Units: inches
    pub progress_in: f64,

    /// Distance remaining to the end of the active path.
    ///
    /// Units: inches
    pub remaining_in: f64,

    /// Distance from the vehicle to its projection on the path.
    ///
    /// Units: inches
    pub cross_track_in: f64,

    /// Lookahead distance used this cycle.
    ///
    /// Units: inches
    pub lookahead_in: f64,

    /// Curvature demand, anticlockwise positive.
    ///
    /// Units: 1/inches
    pub curv_dem_per_in: f64,

    /// Speed demand along the path.
    ///
    /// Units: inches/second
    pub speed_dem_ips: f64,

    /// Commanded wheel velocities.
    ///
    /// Units: inches/second
    pub left_dem_ips: f64,
    pub right_dem_ips: f64,

    /// True once the active path is complete.
    pub done: bool,

    /// True if this cycle held the previous command due to a non-finite
    /// sensor reading.
    pub held_last_command: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of execution of drive control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DriveMode {
    /// Raw command pass-through, no sensor feedback.
    OpenLoop,

    /// Closed loop following of the active path.
    PathFollowing,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<A: Actuators, P: PoseProvider> Drive<A, P> {
    /// Initialise drive control.
    ///
    /// The drive starts in open loop mode with no active path. When a
    /// session is given the per-cycle status reports are archived under
    /// `drive_ctrl/`.
    pub fn init(
        params: Params,
        actuators: A,
        pose_provider: P,
        session: Option<&Session>,
    ) -> Result<Self, DriveError> {
        let arch_report = match session {
            Some(s) => Archiver::from_path(s, "drive_ctrl/status_report.csv")
                .map_err(|e| DriveError::ArchInitError(e.to_string()))?,
            None => Archiver::default(),
        };

        let mut drive = Self {
            params,
            actuators,
            pose_provider,
            mode: DriveMode::OpenLoop,
            path: None,
            reversed: false,
            done_with_path: false,
            last_cmd_ips: (0.0, 0.0),
            report: StatusReport::default(),
            arch_report,
        };

        drive.actuators.set_control_mode(ControlMode::OpenLoop);
        drive.command_demands(0.0, 0.0);

        Ok(drive)
    }

    /// Install a new path and switch to path following mode.
    ///
    /// The previous path, if any, is replaced wholesale. `None` is accepted
    /// and treated as a zero length path which reports done immediately -
    /// callers use this to force the mode switch without motion.
    pub fn set_want_drive_path(&mut self, path: Option<Path>, reversed: bool) {
        let mut path = path.unwrap_or_else(Path::empty);
        path.reset_progress();

        debug!(
            "New drive path installed: {:.1} in, {} segment(s), reversed: {}",
            path.length_in(),
            path.num_segments(),
            reversed
        );

        // A zero length path is already inside any tolerance band
        self.done_with_path = path.is_finished(0.0, self.params.done_tolerance_in);

        self.path = Some(path);
        self.reversed = reversed;
        self.mode = DriveMode::PathFollowing;
        self.last_cmd_ips = (0.0, 0.0);

        self.actuators.set_control_mode(ControlMode::Velocity);
    }

    /// Process one path following cycle.
    ///
    /// In open loop mode this is a no-op returning the current state
    /// unchanged. In path following mode it reads the pose history, advances
    /// progress along the path, and commands wheel velocities; once the path
    /// completes it keeps commanding zero on every call.
    pub fn update_path_follower(&mut self, time_s: f64) -> StatusReport {
        self.report = StatusReport {
            time_s,
            done: self.done_with_path,
            ..StatusReport::default()
        };

        // Calling the follower in open loop mode is not an error, there is
        // just nothing to do
        if self.mode != DriveMode::PathFollowing {
            trace!("updatePathFollower called in open loop mode, ignored");
            return self.report;
        }

        let pose = self.pose_provider.latest_pose();
        let distance_driven_in = self.pose_provider.distance_driven_in();
        let velocity = self.pose_provider.predicted_velocity();

        // A non-finite reading must never reach the motors. Hold the
        // previous command for this cycle and carry on.
        if !pose.is_finite() || !distance_driven_in.is_finite() || !velocity.is_finite() {
            warn!(
                "Non-finite vehicle state at t = {:.3}, holding previous command",
                time_s
            );

            let (left_ips, right_ips) = self.last_cmd_ips;
            self.command_demands(left_ips, right_ips);

            self.report.held_last_command = true;
            self.report.left_dem_ips = left_ips;
            self.report.right_dem_ips = right_ips;
            return self.report;
        }

        let path = match self.path {
            Some(ref mut p) => p,
            None => {
                // No path to follow - command zero and report done
                self.done_with_path = true;
                self.report.done = true;
                self.command_demands(0.0, 0.0);
                return self.report;
            }
        };

        let out = follower::follow(path, &pose, self.reversed, &self.params);

        self.report.progress_in = out.progress_in;
        self.report.remaining_in = out.remaining_in;
        self.report.cross_track_in = out.cross_track_in;
        self.report.lookahead_in = out.lookahead_in;

        trace!(
            "Path follower: progress {:.1} in, remaining {:.1} in, driven {:.1} in",
            out.progress_in,
            out.remaining_in,
            distance_driven_in
        );

        match out.demand {
            Some(demand) => {
                let (left_ips, right_ips) = self.wheel_speeds(demand.speed_ips, demand.curv_per_in);

                self.report.curv_dem_per_in = demand.curv_per_in;
                self.report.speed_dem_ips = demand.speed_ips;

                self.command_demands(left_ips, right_ips);
                self.last_cmd_ips = (left_ips, right_ips);

                self.report.left_dem_ips = left_ips;
                self.report.right_dem_ips = right_ips;
            }
            None => {
                // Terminal sub-state: the path is complete, keep commanding
                // zero on every subsequent cycle
                if !self.done_with_path {
                    debug!("Path complete at t = {:.3}", time_s);
                }

                self.done_with_path = true;
                self.last_cmd_ips = (0.0, 0.0);
                self.command_demands(0.0, 0.0);

                self.report.done = true;
            }
        }

        self.report.done = self.done_with_path;
        self.report
    }

    /// Command the drive train in open loop.
    ///
    /// Asserts the hardware open loop control mode on every call and always
    /// switches the drive to open loop mode, dropping any active path.
    pub fn set_open_loop(&mut self, signal: DriveSignal) {
        // Re-asserted every call, the physical controllers can be reset
        // underneath us
        self.actuators.set_control_mode(ControlMode::OpenLoop);

        if self.mode == DriveMode::PathFollowing {
            debug!("Open loop command received, dropping active path");
            self.path = None;
        }

        self.mode = DriveMode::OpenLoop;

        let signal = signal.normalised();
        self.command_demands(signal.left, signal.right);
    }

    /// Command zero on all actuators. Does not change mode.
    pub fn stop(&mut self) {
        self.command_demands(0.0, 0.0);
        self.last_cmd_ips = (0.0, 0.0);
    }

    /// Push the brake/coast electrical mode to all actuators.
    ///
    /// Pushed on every call rather than on change, so callers may re-assert
    /// it cyclically.
    pub fn set_neutral_mode(&mut self, brake: bool) {
        self.actuators.set_brake_mode(brake);
    }

    /// True once the active path has completed.
    ///
    /// False immediately after installing a non-trivial path, and sticky
    /// once set until a new path is installed.
    pub fn is_done_with_path(&self) -> bool {
        self.done_with_path
    }

    /// The current executing mode.
    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    /// The latest status report.
    pub fn status_report(&self) -> StatusReport {
        self.report
    }

    /// Current heading as a canonical rotation derived from the raw heading
    /// sensor angle.
    pub fn gyro_angle(&self) -> UnitComplex<f64> {
        heading_from_degrees(self.actuators.raw_heading_deg())
    }

    /// Left wheel linear velocity from the raw encoder rate.
    ///
    /// Units: inches/second
    pub fn left_velocity_ips(&self) -> f64 {
        self.ticks_to_ips(self.actuators.speed_ticks(Motor::FrontLeft))
    }

    /// Right wheel linear velocity from the raw encoder rate.
    ///
    /// Units: inches/second
    pub fn right_velocity_ips(&self) -> f64 {
        self.ticks_to_ips(self.actuators.speed_ticks(Motor::FrontRight))
    }

    /// Convert a raw encoder rate (ticks per 100 ms) into a wheel linear
    /// velocity using the wheel's physical constants.
    fn ticks_to_ips(&self, ticks_per_window: f64) -> f64 {
        ticks_per_window * TICK_WINDOWS_PER_S * std::f64::consts::PI
            * self.params.wheel_diameter_in
            / self.params.encoder_ticks_per_rev
    }

    /// Convert a speed and curvature demand into left/right wheel
    /// velocities using the track width, negating both when driving
    /// reversed.
    fn wheel_speeds(&self, speed_ips: f64, curv_per_in: f64) -> (f64, f64) {
        let half_track_in = self.params.track_width_in / 2.0;

        let mut left_ips = speed_ips * (1.0 - curv_per_in * half_track_in);
        let mut right_ips = speed_ips * (1.0 + curv_per_in * half_track_in);

        if self.reversed {
            left_ips = -left_ips;
            right_ips = -right_ips;
        }

        (left_ips, right_ips)
    }

    /// Push demands to the drive train: masters carry the command, the
    /// slaved rears are always zero.
    fn command_demands(&mut self, left: f64, right: f64) {
        self.actuators.set_demand(Motor::FrontLeft, left);
        self.actuators.set_demand(Motor::FrontRight, right);
        self.actuators.set_demand(Motor::RearLeft, 0.0);
        self.actuators.set_demand(Motor::RearRight, 0.0);
    }
}

impl<A: Actuators, P: PoseProvider> Archived for Drive<A, P> {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::{Pose, Twist};
    use crate::path::{build_path_from_waypoints, Waypoint};
    use std::cell::RefCell;
    use std::f64::consts::{FRAC_PI_2, PI};
    use std::rc::Rc;

    /// Recording actuator fake.
    #[derive(Default)]
    struct BenchActuators {
        mode_assertions: Vec<ControlMode>,
        brake_calls: Vec<bool>,
        demands: [f64; 4],
        speed_ticks: [f64; 4],
        heading_deg: f64,
    }

    impl Actuators for BenchActuators {
        fn set_control_mode(&mut self, mode: ControlMode) {
            self.mode_assertions.push(mode);
        }

        fn set_brake_mode(&mut self, brake: bool) {
            self.brake_calls.push(brake);
        }

        fn set_demand(&mut self, motor: Motor, demand: f64) {
            self.demands[motor.index()] = demand;
        }

        fn speed_ticks(&self, motor: Motor) -> f64 {
            self.speed_ticks[motor.index()]
        }

        fn raw_heading_deg(&self) -> f64 {
            self.heading_deg
        }
    }

    /// Settable pose provider fake.
    #[derive(Default)]
    struct BenchPose {
        pose: Pose,
        distance_in: f64,
        velocity: Twist,
    }

    impl PoseProvider for BenchPose {
        fn latest_pose(&self) -> Pose {
            self.pose
        }

        fn distance_driven_in(&self) -> f64 {
            self.distance_in
        }

        fn predicted_velocity(&self) -> Twist {
            self.velocity
        }
    }

    type BenchDrive = Drive<Rc<RefCell<BenchActuators>>, Rc<RefCell<BenchPose>>>;

    fn bench_drive(
        params: Params,
    ) -> (
        BenchDrive,
        Rc<RefCell<BenchActuators>>,
        Rc<RefCell<BenchPose>>,
    ) {
        let actuators = Rc::new(RefCell::new(BenchActuators::default()));
        let pose = Rc::new(RefCell::new(BenchPose::default()));

        let drive = Drive::init(params, actuators.clone(), pose.clone(), None).unwrap();

        (drive, actuators, pose)
    }

    fn hundred_inch_path() -> Path {
        build_path_from_waypoints(&[
            Waypoint::new(0.0, 0.0, 0.0, 0.0),
            Waypoint::new(100.0, 0.0, 60.0, 0.0),
        ])
        .unwrap()
    }

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    fn assert_demands(actuators: &Rc<RefCell<BenchActuators>>, expected: [f64; 4]) {
        let demands = actuators.borrow().demands;
        for i in 0..4 {
            assert_near(demands[i], expected[i], 1e-9);
        }
    }

    #[test]
    fn test_stop_zeroes_all_motors() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        drive.set_open_loop(DriveSignal::new(0.7, 0.7));
        drive.stop();
        assert_demands(&actuators, [0.0, 0.0, 0.0, 0.0]);

        // And again from path following mode, without changing mode
        drive.set_want_drive_path(Some(hundred_inch_path()), false);
        drive.stop();
        assert_demands(&actuators, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(drive.mode(), DriveMode::PathFollowing);
    }

    #[test]
    fn test_open_loop_passthrough() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        drive.set_open_loop(DriveSignal::new(1.0, -1.0));
        assert_demands(&actuators, [1.0, -1.0, 0.0, 0.0]);

        drive.set_open_loop(DriveSignal::new(0.3, -0.2));
        assert_demands(&actuators, [0.3, -0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_open_loop_normalises_preserving_ratio() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        drive.set_open_loop(DriveSignal::new(10.0, 5.0));
        assert_demands(&actuators, [1.0, 0.5, 0.0, 0.0]);

        drive.set_open_loop(DriveSignal::new(-10.0, -5.0));
        assert_demands(&actuators, [-1.0, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_open_loop_asserts_mode_every_call() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        // Init asserts open loop once
        let initial = actuators.borrow().mode_assertions.len();

        drive.set_open_loop(DriveSignal::NEUTRAL);
        drive.set_open_loop(DriveSignal::NEUTRAL);

        assert_eq!(actuators.borrow().mode_assertions.len(), initial + 2);
        assert!(actuators.borrow().mode_assertions[initial..]
            .iter()
            .all(|m| *m == ControlMode::OpenLoop));

        // Switching to path following asserts velocity mode, and back again
        // re-asserts open loop
        drive.set_want_drive_path(None, false);
        assert_eq!(
            *actuators.borrow().mode_assertions.last().unwrap(),
            ControlMode::Velocity
        );

        drive.set_open_loop(DriveSignal::NEUTRAL);
        assert_eq!(
            *actuators.borrow().mode_assertions.last().unwrap(),
            ControlMode::OpenLoop
        );
        assert_eq!(actuators.borrow().mode_assertions.len(), initial + 4);
    }

    #[test]
    fn test_neutral_mode_pushed_every_call() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        drive.set_neutral_mode(false);
        drive.set_neutral_mode(false);
        assert_eq!(actuators.borrow().brake_calls, vec![false, false]);

        drive.set_neutral_mode(true);
        assert_eq!(actuators.borrow().brake_calls, vec![false, false, true]);
    }

    #[test]
    fn test_new_path_is_not_finished() {
        let (mut drive, _, _) = bench_drive(Params::default());

        drive.set_want_drive_path(Some(hundred_inch_path()), false);
        assert!(!drive.is_done_with_path());
    }

    #[test]
    fn test_null_path_is_immediately_done() {
        let (mut drive, _, _) = bench_drive(Params::default());

        drive.set_want_drive_path(None, false);
        assert!(drive.is_done_with_path());
        assert_eq!(drive.mode(), DriveMode::PathFollowing);
    }

    #[test]
    fn test_path_finishes_at_end_of_path() {
        let (mut drive, actuators, pose) = bench_drive(Params::default());

        drive.set_want_drive_path(Some(hundred_inch_path()), false);

        pose.borrow_mut().pose = Pose::from_degrees(0.0, 1.0, 0.0);
        pose.borrow_mut().distance_in = 0.0;

        drive.update_path_follower(0.0);
        assert!(!drive.is_done_with_path());

        pose.borrow_mut().pose = Pose::from_degrees(99.9999, 0.0001, 0.0);
        pose.borrow_mut().distance_in = 99.9999;

        let report = drive.update_path_follower(3.0);
        assert!(drive.is_done_with_path());
        assert!(report.done);
        assert_demands(&actuators, [0.0, 0.0, 0.0, 0.0]);

        // Completion is idempotent - further cycles keep commanding zero
        let report = drive.update_path_follower(3.02);
        assert!(report.done);
        assert_demands(&actuators, [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_in_open_loop_is_noop() {
        let (mut drive, actuators, _) = bench_drive(Params::default());

        drive.set_open_loop(DriveSignal::new(0.4, 0.4));
        let assertions = actuators.borrow().mode_assertions.len();

        let report = drive.update_path_follower(1.0);

        assert!(!report.done);
        assert_demands(&actuators, [0.4, 0.4, 0.0, 0.0]);
        assert_eq!(actuators.borrow().mode_assertions.len(), assertions);
    }

    #[test]
    fn test_follower_commands_wheel_speeds() {
        let params = Params::default();
        let track = params.track_width_in;
        let (mut drive, actuators, pose) = bench_drive(params);

        drive.set_want_drive_path(Some(hundred_inch_path()), false);

        // 5 in right of the path, pointing along it
        pose.borrow_mut().pose = Pose::from_degrees(10.0, -5.0, 0.0);
        let report = drive.update_path_follower(0.0);

        // Anticlockwise correction: right wheel faster than left
        assert!(report.right_dem_ips > report.left_dem_ips);
        assert_near(
            report.right_dem_ips - report.left_dem_ips,
            report.speed_dem_ips * report.curv_dem_per_in * track,
            1e-9,
        );

        let demands = actuators.borrow().demands;
        assert_near(demands[0], report.left_dem_ips, 1e-9);
        assert_near(demands[1], report.right_dem_ips, 1e-9);
        assert_near(demands[2], 0.0, 1e-12);
        assert_near(demands[3], 0.0, 1e-12);
    }

    #[test]
    fn test_reversed_path_negates_demands() {
        let (mut drive, _, pose) = bench_drive(Params::default());

        drive.set_want_drive_path(Some(hundred_inch_path()), true);

        // Stern pointing down the path
        pose.borrow_mut().pose = Pose::from_degrees(0.0, 0.0, 180.0);
        let report = drive.update_path_follower(0.0);

        assert!(report.left_dem_ips < 0.0);
        assert!(report.right_dem_ips < 0.0);
    }

    #[test]
    fn test_non_finite_pose_holds_previous_command() {
        let (mut drive, actuators, pose) = bench_drive(Params::default());

        drive.set_want_drive_path(Some(hundred_inch_path()), false);

        pose.borrow_mut().pose = Pose::from_degrees(10.0, 0.0, 0.0);
        let good = drive.update_path_follower(0.0);
        assert!(!good.held_last_command);

        pose.borrow_mut().pose = Pose::from_degrees(f64::NAN, 0.0, 0.0);
        let held = drive.update_path_follower(0.02);

        assert!(held.held_last_command);
        assert_near(held.left_dem_ips, good.left_dem_ips, 1e-9);
        assert_near(held.right_dem_ips, good.right_dem_ips, 1e-9);

        let demands = actuators.borrow().demands;
        assert!(demands[0].is_finite() && demands[1].is_finite());

        // A good reading resumes normal following
        pose.borrow_mut().pose = Pose::from_degrees(12.0, 0.0, 0.0);
        let resumed = drive.update_path_follower(0.04);
        assert!(!resumed.held_last_command);
    }

    #[test]
    fn test_velocity_unit_conversion() {
        let mut params = Params::default();
        params.wheel_diameter_in = 1.0;
        params.encoder_ticks_per_rev = 200.0;

        let (drive, actuators, _) = bench_drive(params);

        actuators.borrow_mut().speed_ticks = [200.0; 4];

        assert_near(drive.left_velocity_ips(), 10.0 * PI, 1e-5);
        assert_near(drive.right_velocity_ips(), 10.0 * PI, 1e-5);
    }

    #[test]
    fn test_gyro_angle_is_canonical() {
        let (drive, actuators, _) = bench_drive(Params::default());

        actuators.borrow_mut().heading_deg = 90.0;
        let expected = UnitComplex::new(FRAC_PI_2);

        let angle = drive.gyro_angle();
        assert_near(angle.re, expected.re, 1e-12);
        assert_near(angle.im, expected.im, 1e-12);

        // Wrapped sensor angles give the same canonical rotation
        actuators.borrow_mut().heading_deg = 450.0;
        let wrapped = drive.gyro_angle();
        assert_near(wrapped.re, expected.re, 1e-12);
        assert_near(wrapped.im, expected.im, 1e-12);
    }
}

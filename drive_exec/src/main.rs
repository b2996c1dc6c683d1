//! Main vehicle-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Step the simulated drive train
//!         - Update the pose history from the new observation
//!         - Drive control processing (path follower)
//!         - Archive writing
//!
//! The loop runs at a fixed period and ends when the active route is
//! complete. On the vehicle the simulation step is replaced by the motor
//! driver and odometry acquisition; everything downstream of the pose
//! history is identical.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{
    actuators::sim::{SimInput, SimVehicle},
    drive_ctrl::{Drive, Params as DriveParams},
    pose_hist::{PoseHistory, DEFAULT_MAX_OBSERVATIONS},
    route::Route,
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Give up on a route which has not completed after this long.
const MAX_ROUTE_DURATION_S: f64 = 120.0;

/// Limit on the number of consecutive cycle overruns before a warning is
/// raised.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 10;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("AGV Drive Software\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let drive_params: DriveParams =
        util::params::load("drive_ctrl.toml").wrap_err("Could not load drive_ctrl params")?;

    info!("Exec parameters loaded");

    // ---- LOAD ROUTE ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    let route = match args.len() {
        2 => Route::load(&args[1])
            .wrap_err_with(|| format!("Failed to load route from \"{}\"", &args[1]))?,
        _ => raise_error!("Usage: drive_exec <route_file.toml>"),
    };

    info!(
        "Route \"{}\" loaded: {} waypoints, reversed: {}",
        route.name,
        route.waypoints.len(),
        route.reversed
    );

    let path = route
        .build_path()
        .wrap_err("Failed to build the route's path")?;

    info!(
        "Path built: {:.1} in over {} segment(s)",
        path.length_in(),
        path.num_segments()
    );

    // Keep a serialised copy of the built path with the session
    session.save("route/path.json", path.clone());

    // ---- MODULE INITIALISATION ----

    let sim = Rc::new(RefCell::new(SimVehicle::default()));
    sim.borrow_mut()
        .init("sim.toml", &session)
        .wrap_err("Failed to initialise the simulated drive train")?;

    let pose_hist = Rc::new(RefCell::new(PoseHistory::new(DEFAULT_MAX_OBSERVATIONS)));
    pose_hist.borrow_mut().reset(0.0, sim.borrow().pose());

    let mut drive = Drive::init(drive_params, sim.clone(), pose_hist.clone(), Some(&session))
        .wrap_err("Failed to initialise drive control")?;

    info!("Modules initialised, beginning route\n");

    // Brake mode while following a route
    drive.set_neutral_mode(true);
    drive.set_want_drive_path(Some(path), route.reversed);

    // ---- MAIN LOOP ----

    let mut time_s = 0.0;
    let mut num_consec_overruns: u64 = 0;

    let result = loop {
        let cycle_start = Instant::now();
        time_s += CYCLE_PERIOD_S;

        // Step the simulated vehicle and feed the observation into the pose
        // history, the way odometry acquisition would on the real vehicle
        let (obs, _) = sim
            .borrow_mut()
            .proc(&SimInput {
                dt_s: CYCLE_PERIOD_S,
            })
            .wrap_err("Simulation step failed")?;

        {
            let mut hist = pose_hist.borrow_mut();
            hist.integrate_odometry(&obs.delta);
            hist.set_predicted_velocity(obs.velocity);
            hist.add_observation(time_s, obs.pose);
        }

        // Drive control processing
        let report = drive.update_path_follower(time_s);

        if let Err(e) = drive.write() {
            warn!("Could not write drive archives: {}", e);
        }

        if report.done {
            info!(
                "Route complete at t = {:.2} s, cross track error {:.2} in",
                time_s, report.cross_track_in
            );
            break Ok(());
        }

        if time_s > MAX_ROUTE_DURATION_S {
            break Err(eyre!(
                "Route did not complete within {:.0} s, {:.1} in remaining",
                MAX_ROUTE_DURATION_S,
                report.remaining_in
            ));
        }

        // Cycle pacing
        let elapsed = cycle_start.elapsed().as_secs_f64();

        if elapsed < CYCLE_PERIOD_S {
            num_consec_overruns = 0;
            thread::sleep(Duration::from_secs_f64(CYCLE_PERIOD_S - elapsed));
        } else {
            num_consec_overruns += 1;

            if num_consec_overruns >= MAX_CONSEC_CYCLE_OVERRUNS {
                warn!(
                    "{} consecutive cycle overruns (last cycle took {:.1} ms)",
                    num_consec_overruns,
                    elapsed * 1e3
                );
            }
        }
    };

    // ---- SHUTDOWN ----

    drive.stop();

    info!("Stopping drive and closing session");
    session.exit();

    result
}

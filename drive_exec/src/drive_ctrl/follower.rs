//! # Pure pursuit follower
//!
//! The geometric core of path following. Given the latest pose and the
//! active path, the follower advances the recorded progress along the path,
//! picks a lookahead point, and produces a speed and curvature demand. The
//! lookahead distance scales with the path's target speed between the
//! configured bounds, so the vehicle looks further ahead when moving fast.
//!
//! The pursuit relation is the standard one: with the lookahead point
//! expressed in the body frame at lateral offset `y` and distance `L`, the
//! arc through both points has curvature `2 y / L^2`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{UnitComplex, Vector2};

// Internal
use super::Params;
use crate::geom::Pose;
use crate::path::Path;
use util::maths::{clamp, lin_map};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed and curvature demand produced by the follower.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PursuitDemand {
    /// Demanded vehicle speed.
    ///
    /// Units: inches/second
    pub speed_ips: f64,

    /// Demanded curvature, positive for anticlockwise turns.
    ///
    /// Units: 1/inches
    pub curv_per_in: f64,
}

/// The result of one follower evaluation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FollowerOutput {
    /// Arc-length progress along the path.
    ///
    /// Units: inches
    pub progress_in: f64,

    /// Distance left to the end of the path.
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

    /// True once the remaining distance is inside the tolerance band.
    pub finished: bool,

    /// The demand to execute, or `None` when the path is finished.
    pub demand: Option<PursuitDemand>,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate the follower for one control cycle.
///
/// When `reversed` the vehicle drives stern first: the pursuit geometry is
/// evaluated with the heading flipped half a turn, and the caller negates
/// the resulting wheel demands.
pub(crate) fn follow(
    path: &mut Path,
    pose: &Pose,
    reversed: bool,
    params: &Params,
) -> FollowerOutput {
    let position_in = pose.position_in;

    let progress_in = path.closest_point_distance(&position_in);
    let remaining_in = path.remaining_in(progress_in);
    let cross_track_in = if path.is_empty() {
        0.0
    } else {
        (position_in - path.point_at(progress_in)).norm()
    };

    if path.is_finished(progress_in, params.done_tolerance_in) {
        return FollowerOutput {
            progress_in,
            remaining_in,
            cross_track_in,
            lookahead_in: 0.0,
            finished: true,
            demand: None,
        };
    }

    // Look further ahead the faster the path wants us to go here
    let speed_here_ips = clamp(
        &path.speed_at(progress_in),
        &params.min_speed_ips,
        &params.max_speed_ips,
    );
    let lookahead_in = lin_map(
        (params.min_speed_ips, params.max_speed_ips),
        (params.min_lookahead_in, params.max_lookahead_in),
        speed_here_ips,
    );

    let (target_in, target_speed_ips) = path.lookahead_point(progress_in, lookahead_in);

    // Pursuit heading - flipped when driving in reverse
    let heading = if reversed {
        pose.heading * UnitComplex::new(std::f64::consts::PI)
    } else {
        pose.heading
    };

    let body_in: Vector2<f64> = heading.inverse() * (target_in - position_in);
    let dist_sq_in = body_in.norm_squared();

    // With the target on top of the vehicle there is no defined arc, go
    // straight
    let curv_per_in = if dist_sq_in < 1e-9 {
        0.0
    } else {
        2.0 * body_in[1] / dist_sq_in
    };

    let speed_ips = clamp(
        &target_speed_ips,
        &params.min_speed_ips,
        &params.max_speed_ips,
    );

    FollowerOutput {
        progress_in,
        remaining_in,
        cross_track_in,
        lookahead_in,
        finished: false,
        demand: Some(PursuitDemand {
            speed_ips,
            curv_per_in,
        }),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{build_path_from_waypoints, Waypoint};

    fn straight_path() -> Path {
        build_path_from_waypoints(&[
            Waypoint::new(0.0, 0.0, 24.0, 0.0),
            Waypoint::new(100.0, 0.0, 24.0, 0.0),
        ])
        .unwrap()
    }

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_on_path_demands_zero_curvature() {
        let mut path = straight_path();
        let pose = Pose::from_degrees(10.0, 0.0, 0.0);

        let out = follow(&mut path, &pose, false, &Params::default());
        let demand = out.demand.unwrap();

        assert!(!out.finished);
        assert_near(out.progress_in, 10.0, 1e-9);
        assert_near(out.cross_track_in, 0.0, 1e-9);
        assert_near(demand.curv_per_in, 0.0, 1e-9);
        assert_near(demand.speed_ips, 24.0, 1e-9);
    }

    #[test]
    fn test_offset_pose_steers_back_towards_path()
    {
        let mut path = straight_path();

        // Vehicle 5 in to the right of the path: positive (anticlockwise)
        // curvature steers it back
        let pose = Pose::from_degrees(10.0, -5.0, 0.0);
        let out = follow(&mut path, &pose, false, &Params::default());

        assert!(out.demand.unwrap().curv_per_in > 0.0);
        assert_near(out.cross_track_in, 5.0, 1e-9);

        // And mirrored on the other side
        let mut path = straight_path();
        let pose = Pose::from_degrees(10.0, 5.0, 0.0);
        let out = follow(&mut path, &pose, false, &Params::default());

        assert!(out.demand.unwrap().curv_per_in < 0.0);
    }

    #[test]
    fn test_finishes_inside_tolerance_band() {
        let mut path = straight_path();
        let pose = Pose::from_degrees(99.9999, 0.0001, 0.0);

        let out = follow(&mut path, &pose, false, &Params::default());

        assert!(out.finished);
        assert!(out.demand.is_none());
        assert!(out.remaining_in <= Params::default().done_tolerance_in);
    }

    #[test]
    fn test_lookahead_scales_with_speed() {
        let params = Params::default();

        let mut slow = build_path_from_waypoints(&[
            Waypoint::new(0.0, 0.0, params.min_speed_ips, 0.0),
            Waypoint::new(100.0, 0.0, params.min_speed_ips, 0.0),
        ])
        .unwrap();
        let mut fast = build_path_from_waypoints(&[
            Waypoint::new(0.0, 0.0, params.max_speed_ips, 0.0),
            Waypoint::new(100.0, 0.0, params.max_speed_ips, 0.0),
        ])
        .unwrap();

        let pose = Pose::from_degrees(0.0, 0.0, 0.0);

        let slow_out = follow(&mut slow, &pose, false, &params);
        let fast_out = follow(&mut fast, &pose, false, &params);

        assert_near(slow_out.lookahead_in, params.min_lookahead_in, 1e-9);
        assert_near(fast_out.lookahead_in, params.max_lookahead_in, 1e-9);
    }
}

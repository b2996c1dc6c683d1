//! # Path builder
//!
//! Converts an ordered list of waypoints into a [`Path`] by fitting straight
//! segments joined by circular arcs. Each interior waypoint with a non-zero
//! corner radius is smoothed by an arc tangent to its incoming and outgoing
//! edges, with both edges trimmed back to the tangent points. A zero radius
//! leaves a sharp vertex.
//!
//! Target speeds are attached to the waypoints; every built segment carries
//! entry and exit speeds obtained by interpolating the waypoint speeds
//! linearly along the original polyline, so the speed profile is continuous
//! over the whole route.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::{Path, PathError, PathSegment, MIN_SEGMENT_LENGTH_IN};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this cross product magnitude two edge directions are treated as
/// colinear and no corner arc can be fitted between them.
const COLINEAR_CROSS_LIMIT: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An authored field coordinate with a desired speed and corner radius.
///
/// Waypoints are immutable route data, supplied wholesale by the route
/// author.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position in the field frame.
    ///
    /// Units: inches
    pub position_in: Vector2<f64>,

    /// Desired speed at this waypoint.
    ///
    /// Units: inches/second
    pub speed_ips: f64,

    /// Corner smoothing radius. Zero produces a sharp vertex.
    ///
    /// Units: inches
    pub radius_in: f64,
}

/// A fitted corner at an interior waypoint: the trimmed tangent points on
/// the adjacent edges, the arc between them (if any), and the speeds at
/// entry and exit.
struct Corner {
    entry_in: Vector2<f64>,
    exit_in: Vector2<f64>,
    entry_speed_ips: f64,
    exit_speed_ips: f64,
    arc: Option<PathSegment>,

    /// Edge length consumed on the outgoing edge.
    trim_in: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    /// Create a new waypoint.
    pub fn new(x_in: f64, y_in: f64, speed_ips: f64, radius_in: f64) -> Self {
        Self {
            position_in: Vector2::new(x_in, y_in),
            speed_ips,
            radius_in,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a path from an ordered list of waypoints.
///
/// Fails if fewer than two waypoints are given, if consecutive waypoints
/// coincide, or if a non-zero corner radius is requested at a waypoint which
/// is colinear with its neighbours (the arc is undefined there). A corner
/// radius too large to fit between adjacent waypoints is clamped to the
/// largest feasible radius and a warning is logged, rather than producing
/// overlapping geometry.
pub fn build_path_from_waypoints(waypoints: &[Waypoint]) -> Result<Path, PathError> {
    if waypoints.len() < 2 {
        return Err(PathError::TooFewWaypoints(waypoints.len()));
    }

    let num_edges = waypoints.len() - 1;

    // Edge directions and lengths of the raw polyline
    let mut edge_dir = Vec::with_capacity(num_edges);
    let mut edge_len = Vec::with_capacity(num_edges);

    for i in 0..num_edges {
        let diff = waypoints[i + 1].position_in - waypoints[i].position_in;
        let len = diff.norm();

        if len < MIN_SEGMENT_LENGTH_IN {
            return Err(PathError::CoincidentWaypoints(i, i + 1));
        }

        edge_dir.push(diff / len);
        edge_len.push(len);
    }

    // Fit a corner at every interior waypoint
    let mut corners: Vec<Corner> = Vec::with_capacity(waypoints.len().saturating_sub(2));

    for i in 1..waypoints.len() - 1 {
        let prev_trim = corners.last().map(|c| c.trim_in).unwrap_or(0.0);

        let corner = fit_corner(waypoints, &edge_dir, &edge_len, i, prev_trim)?;
        corners.push(corner);
    }

    // Assemble the chain: line to each corner entry, the corner arc, then a
    // final line to the last waypoint
    let mut segments = Vec::new();
    let mut cursor_in = waypoints[0].position_in;
    let mut cursor_speed_ips = waypoints[0].speed_ips;

    for corner in &corners {
        if let Some(line) = PathSegment::line(
            cursor_in,
            corner.entry_in,
            cursor_speed_ips,
            corner.entry_speed_ips,
        ) {
            segments.push(line);
        }

        if let Some(arc) = corner.arc {
            segments.push(arc);
        }

        cursor_in = corner.exit_in;
        cursor_speed_ips = corner.exit_speed_ips;
    }

    let last = waypoints[waypoints.len() - 1];
    if let Some(line) = PathSegment::line(
        cursor_in,
        last.position_in,
        cursor_speed_ips,
        last.speed_ips,
    ) {
        segments.push(line);
    }

    Ok(Path::from_segments(segments))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Fit the corner at interior waypoint `i`.
///
/// `prev_trim_in` is the length already consumed at the start of the
/// incoming edge by the previous corner's exit trim.
fn fit_corner(
    waypoints: &[Waypoint],
    edge_dir: &[Vector2<f64>],
    edge_len: &[f64],
    i: usize,
    prev_trim_in: f64,
) -> Result<Corner, PathError> {
    let wp = waypoints[i];
    let d_in = edge_dir[i - 1];
    let d_out = edge_dir[i];

    let cross = d_in.perp(&d_out);

    // Sharp vertex - no trimming, no arc
    if wp.radius_in <= 0.0 {
        return Ok(Corner {
            entry_in: wp.position_in,
            exit_in: wp.position_in,
            entry_speed_ips: wp.speed_ips,
            exit_speed_ips: wp.speed_ips,
            arc: None,
            trim_in: 0.0,
        });
    }

    if cross.abs() < COLINEAR_CROSS_LIMIT {
        return Err(PathError::ColinearWaypoints(i));
    }

    // Turn angle between the edges, in (0, pi)
    let turn_rad = d_in.angle(&d_out);
    let half_tan = (turn_rad / 2.0).tan();

    // Edge length available for trimming: whatever the previous corner left
    // of the incoming edge, and the outgoing edge with half reserved for the
    // next corner if it also wants an arc
    let avail_in = edge_len[i - 1] - prev_trim_in;
    let avail_out = if i + 1 < waypoints.len() - 1 && waypoints[i + 1].radius_in > 0.0 {
        edge_len[i] / 2.0
    } else {
        edge_len[i]
    };

    let max_trim_in = avail_in.min(avail_out);

    let mut trim_in = wp.radius_in * half_tan;
    let mut radius_in = wp.radius_in;

    if trim_in > max_trim_in {
        trim_in = max_trim_in;
        radius_in = trim_in / half_tan;

        warn!(
            "Corner radius at waypoint {} does not fit between its \
             neighbours, clamped from {:.3} in to {:.3} in",
            i, wp.radius_in, radius_in
        );
    }

    let entry_in = wp.position_in - d_in * trim_in;
    let exit_in = wp.position_in + d_out * trim_in;

    // Arc centre is offset from the entry tangent point along the edge
    // normal, on the side the path turns towards
    let side = cross.signum();
    let normal_in = Vector2::new(-d_in[1], d_in[0]);
    let centre_in = entry_in + normal_in * (side * radius_in);

    let to_entry = entry_in - centre_in;
    let start_angle_rad = to_entry[1].atan2(to_entry[0]);
    let sweep_rad = side * turn_rad;

    // Speeds at the tangent points come from interpolating the waypoint
    // speeds along the original edges
    let frac_in = (edge_len[i - 1] - trim_in) / edge_len[i - 1];
    let entry_speed_ips = lerp(waypoints[i - 1].speed_ips, wp.speed_ips, frac_in);

    let frac_out = trim_in / edge_len[i];
    let exit_speed_ips = lerp(wp.speed_ips, waypoints[i + 1].speed_ips, frac_out);

    let arc = PathSegment::arc(
        centre_in,
        radius_in,
        start_angle_rad,
        sweep_rad,
        entry_speed_ips,
        exit_speed_ips,
    );

    Ok(Corner {
        entry_in,
        exit_in,
        entry_speed_ips,
        exit_speed_ips,
        arc,
        trim_in,
    })
}

fn lerp(from: f64, to: f64, frac: f64) -> f64 {
    from + (to - from) * frac
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

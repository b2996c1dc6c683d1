//! # Path module
//!
//! This module defines the continuous trajectory followed by the drive
//! subsystem. A path is an ordered sequence of tangent-continuous segments
//! (straight lines joined by circular arcs), each carrying a target speed,
//! built once from a waypoint list by the [`builder`] and then queried many
//! times per traversal.
//!
//! Queries are expressed in arc length along the path. The path keeps a
//! small amount of mutable progress state (the last matched segment index
//! and arc-length position) so that successive closest-point queries are
//! monotonically non-decreasing: a single noisy or momentarily retrograde
//! pose estimate can never undo recorded progress. This state is an
//! optimisation and a filtering device only - resetting it yields correct,
//! if slower, behaviour.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod builder;
pub mod segment;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
pub use builder::*;
pub use segment::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance used to break ties between equidistant projection candidates.
/// Within this band the candidate further along the path wins.
const PROJECTION_TIE_IN: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path defining the desired trajectory of the vehicle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Path {
    /// The segments making up the path, in traversal order.
    segments: Vec<PathSegment>,

    /// Arc-length position of the start of each segment.
    ///
    /// Units: inches
    start_in: Vec<f64>,

    /// Total length of the path.
    ///
    /// Units: inches
    length_in: f64,

    /// Index of the last matched segment. Never moves backward.
    #[serde(skip)]
    cursor: usize,

    /// Arc-length position of the last match. Never moves backward.
    ///
    /// Units: inches
    #[serde(skip)]
    progress_in: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building a path from waypoints.
///
/// These can only occur at build time - a successfully built path is
/// unconditionally safe to query.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("A path needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("Waypoints {0} and {1} are coincident")]
    CoincidentWaypoints(usize, usize),

    #[error(
        "Waypoint {0} requests a corner radius but lies on a straight line \
         between its neighbours, the corner arc is undefined"
    )]
    ColinearWaypoints(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new empty (zero length) path.
    ///
    /// An empty path is finished at any tolerance, which is what backs
    /// "switch to path following without motion" commands.
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            start_in: Vec::new(),
            length_in: 0.0,
            cursor: 0,
            progress_in: 0.0,
        }
    }

    /// Build a path from a pre-validated segment chain.
    ///
    /// The builder guarantees that consecutive segments share endpoints;
    /// this function only derives the cumulative length table.
    pub(crate) fn from_segments(segments: Vec<PathSegment>) -> Self {
        let mut start_in = Vec::with_capacity(segments.len());
        let mut length_in = 0.0;

        for seg in &segments {
            start_in.push(length_in);
            length_in += seg.length_in();
        }

        Self {
            segments,
            start_in,
            length_in,
            cursor: 0,
            progress_in: 0.0,
        }
    }

    /// Total length of the path in inches.
    pub fn length_in(&self) -> f64 {
        self.length_in
    }

    /// True if the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The number of segments in the path.
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// The segments of the path, in traversal order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Reset the progress state, as if the path had never been queried.
    pub fn reset_progress(&mut self) {
        self.cursor = 0;
        self.progress_in = 0.0;
    }

    /// Project a field position onto the path, returning the arc-length
    /// coordinate of the closest point.
    ///
    /// Only segments at or after the last matched one are considered, and
    /// ties between equidistant candidates are broken in favour of the one
    /// further along. The returned position is clamped to be no earlier
    /// than the previous result, so progress is monotonically
    /// non-decreasing across successive queries.
    pub fn closest_point_distance(&mut self, position_in: &Vector2<f64>) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }

        let mut best_dist = f64::INFINITY;
        let mut best_s = self.progress_in;

        for (i, seg) in self.segments.iter().enumerate().skip(self.cursor) {
            let (s_local, dist) = seg.project(position_in);

            if dist < best_dist + PROJECTION_TIE_IN {
                best_dist = best_dist.min(dist);
                best_s = self.start_in[i] + s_local;
            }
        }

        let s = best_s.max(self.progress_in);

        self.progress_in = s;
        self.cursor = self.segment_index_at(s);

        s
    }

    /// The point and target speed at `position_in + lookahead_in` along the
    /// path, clamped to the path end.
    pub fn lookahead_point(&self, position_in: f64, lookahead_in: f64) -> (Vector2<f64>, f64) {
        if self.segments.is_empty() {
            return (Vector2::zeros(), 0.0);
        }

        let s = (position_in + lookahead_in).max(0.0).min(self.length_in);
        let i = self.segment_index_at(s);

        let seg = &self.segments[i];
        let s_local = s - self.start_in[i];

        (seg.point_at(s_local), seg.speed_at(s_local))
    }

    /// The point at the given arc-length position along the path.
    pub fn point_at(&self, position_in: f64) -> Vector2<f64> {
        if self.segments.is_empty() {
            return Vector2::zeros();
        }

        let s = position_in.max(0.0).min(self.length_in);
        let i = self.segment_index_at(s);
        self.segments[i].point_at(s - self.start_in[i])
    }

    /// The tangent heading at the given arc-length position.
    pub fn heading_at(&self, position_in: f64) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }

        let s = position_in.max(0.0).min(self.length_in);
        let i = self.segment_index_at(s);
        self.segments[i].heading_at(s - self.start_in[i])
    }

    /// The target speed at the given arc-length position.
    pub fn speed_at(&self, position_in: f64) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }

        let s = position_in.max(0.0).min(self.length_in);
        let i = self.segment_index_at(s);
        self.segments[i].speed_at(s - self.start_in[i])
    }

    /// The distance remaining to the end of the path from the given
    /// arc-length position. Never negative.
    pub fn remaining_in(&self, position_in: f64) -> f64 {
        (self.length_in - position_in).max(0.0)
    }

    /// True when the remaining distance is within the tolerance band.
    pub fn is_finished(&self, position_in: f64, tolerance_in: f64) -> bool {
        self.remaining_in(position_in) <= tolerance_in
    }

    /// Index of the segment containing the given arc-length position.
    ///
    /// Positions at segment boundaries map to the later segment, except at
    /// the very end of the path.
    fn segment_index_at(&self, s_in: f64) -> usize {
        debug_assert!(!self.segments.is_empty());

        let i = self.start_in.partition_point(|&start| start <= s_in);
        i.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

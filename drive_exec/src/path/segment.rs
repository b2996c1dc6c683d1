//! Path segment geometry
//!
//! A segment is either a straight line or a circular arc, each carrying a
//! target speed interpolated linearly in arc length between its two ends.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::rem_euclid;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Segments shorter than this are considered degenerate and are never built.
pub const MIN_SEGMENT_LENGTH_IN: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The shape of a path segment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum SegmentShape {
    /// A straight line from `start_in` along the unit vector `dir`.
    Line {
        start_in: Vector2<f64>,
        dir: Vector2<f64>,
    },

    /// A circular arc about `centre_in`. `sweep_rad` is signed,
    /// anticlockwise positive, and its sign gives the direction of travel.
    Arc {
        centre_in: Vector2<f64>,
        radius_in: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
    },
}

/// A single piece of a path, with speed interpolated over its length.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PathSegment {
    shape: SegmentShape,

    /// The length of the segment.
    ///
    /// Units: inches
    length_in: f64,

    /// Target speed at the start of the segment.
    ///
    /// Units: inches/second
    start_speed_ips: f64,

    /// Target speed at the end of the segment.
    ///
    /// Units: inches/second
    end_speed_ips: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathSegment {
    /// Create a line segment between two points.
    ///
    /// Returns `None` if the points are too close together to define a
    /// direction.
    pub fn line(
        start_in: Vector2<f64>,
        end_in: Vector2<f64>,
        start_speed_ips: f64,
        end_speed_ips: f64,
    ) -> Option<Self> {
        let diff = end_in - start_in;
        let length_in = diff.norm();

        if length_in < MIN_SEGMENT_LENGTH_IN {
            return None;
        }

        Some(Self {
            shape: SegmentShape::Line {
                start_in,
                dir: diff / length_in,
            },
            length_in,
            start_speed_ips,
            end_speed_ips,
        })
    }

    /// Create an arc segment.
    ///
    /// Returns `None` if the radius or sweep produce a degenerate arc.
    pub fn arc(
        centre_in: Vector2<f64>,
        radius_in: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
        start_speed_ips: f64,
        end_speed_ips: f64,
    ) -> Option<Self> {
        let length_in = radius_in * sweep_rad.abs();

        if radius_in <= 0.0 || length_in < MIN_SEGMENT_LENGTH_IN {
            return None;
        }

        Some(Self {
            shape: SegmentShape::Arc {
                centre_in,
                radius_in,
                start_angle_rad,
                sweep_rad,
            },
            length_in,
            start_speed_ips,
            end_speed_ips,
        })
    }

    /// The length of the segment in inches.
    pub fn length_in(&self) -> f64 {
        self.length_in
    }

    /// Target speed at the start of the segment in inches/second.
    pub fn start_speed_ips(&self) -> f64 {
        self.start_speed_ips
    }

    /// Target speed at the end of the segment in inches/second.
    pub fn end_speed_ips(&self) -> f64 {
        self.end_speed_ips
    }

    /// The point at the given arc-length position along the segment.
    ///
    /// The position is clamped to the segment's extent.
    pub fn point_at(&self, s_in: f64) -> Vector2<f64> {
        let s = s_in.max(0.0).min(self.length_in);

        match self.shape {
            SegmentShape::Line { start_in, dir } => start_in + dir * s,
            SegmentShape::Arc {
                centre_in,
                radius_in,
                start_angle_rad,
                sweep_rad,
            } => {
                let angle = start_angle_rad + sweep_rad * (s / self.length_in);
                centre_in + radius_in * Vector2::new(angle.cos(), angle.sin())
            }
        }
    }

    /// The tangent heading (angle to the field +X axis) at the given
    /// arc-length position, in the direction of travel.
    pub fn heading_at(&self, s_in: f64) -> f64 {
        let s = s_in.max(0.0).min(self.length_in);

        match self.shape {
            SegmentShape::Line { dir, .. } => dir[1].atan2(dir[0]),
            SegmentShape::Arc {
                start_angle_rad,
                sweep_rad,
                ..
            } => {
                let angle = start_angle_rad + sweep_rad * (s / self.length_in);
                angle + sweep_rad.signum() * std::f64::consts::FRAC_PI_2
            }
        }
    }

    /// Target speed at the given arc-length position, linearly interpolated
    /// between the segment's end speeds.
    pub fn speed_at(&self, s_in: f64) -> f64 {
        let s = s_in.max(0.0).min(self.length_in);
        self.start_speed_ips + (self.end_speed_ips - self.start_speed_ips) * (s / self.length_in)
    }

    /// Project a point onto the segment.
    ///
    /// Returns the arc-length position of the closest point on the segment
    /// (clamped to its extent) and the distance from the query point to it.
    pub fn project(&self, point_in: &Vector2<f64>) -> (f64, f64) {
        let s = match self.shape {
            SegmentShape::Line { start_in, dir } => {
                (point_in - start_in).dot(&dir).max(0.0).min(self.length_in)
            }
            SegmentShape::Arc {
                centre_in,
                radius_in,
                start_angle_rad,
                sweep_rad,
            } => {
                let to_point = point_in - centre_in;

                if to_point.norm() < MIN_SEGMENT_LENGTH_IN {
                    // At the centre every point of the arc is equidistant,
                    // take the start
                    0.0
                } else {
                    let angle = to_point[1].atan2(to_point[0]);

                    // Angular offset from the arc start, measured in the
                    // direction of travel
                    let offset = if sweep_rad >= 0.0 {
                        rem_euclid(angle - start_angle_rad, std::f64::consts::TAU)
                    } else {
                        rem_euclid(start_angle_rad - angle, std::f64::consts::TAU)
                    };

                    if offset <= sweep_rad.abs() {
                        offset * radius_in
                    } else {
                        // Off the end of the arc - clamp to whichever
                        // endpoint is angularly closer
                        let past_end = offset - sweep_rad.abs();
                        let before_start = std::f64::consts::TAU - offset;

                        if past_end < before_start {
                            self.length_in
                        } else {
                            0.0
                        }
                    }
                }
            }
        };

        (s, (point_in - self.point_at(s)).norm())
    }

    /// The start point of the segment.
    pub fn start_point(&self) -> Vector2<f64> {
        self.point_at(0.0)
    }

    /// The end point of the segment.
    pub fn end_point(&self) -> Vector2<f64> {
        self.point_at(self.length_in)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_line_queries() {
        let seg = PathSegment::line(
            Vector2::new(0.0, 0.0),
            Vector2::new(100.0, 0.0),
            0.0,
            60.0,
        )
        .unwrap();

        assert_near(seg.length_in(), 100.0, 1e-9);
        assert_near(seg.point_at(25.0)[0], 25.0, 1e-9);
        assert_near(seg.speed_at(50.0), 30.0, 1e-9);
        assert_near(seg.heading_at(0.0), 0.0, 1e-9);

        // Projection of an off-path point
        let (s, dist) = seg.project(&Vector2::new(40.0, 3.0));
        assert_near(s, 40.0, 1e-9);
        assert_near(dist, 3.0, 1e-9);

        // Projection beyond the end clamps
        let (s, _) = seg.project(&Vector2::new(150.0, 0.0));
        assert_near(s, 100.0, 1e-9);
    }

    #[test]
    fn test_arc_queries() {
        // Quarter circle of radius 10 about the origin, anticlockwise from
        // the +X axis
        let seg = PathSegment::arc(Vector2::new(0.0, 0.0), 10.0, 0.0, FRAC_PI_2, 20.0, 20.0)
            .unwrap();

        assert_near(seg.length_in(), 10.0 * FRAC_PI_2, 1e-9);
        assert_near(seg.start_point()[0], 10.0, 1e-9);
        assert_near(seg.end_point()[1], 10.0, 1e-9);

        // Tangent at the start points along +Y
        assert_near(seg.heading_at(0.0), FRAC_PI_2, 1e-9);
        // And at the end along -X
        assert_near(seg.heading_at(seg.length_in()), PI, 1e-9);

        // Projection of a point outside the arc radius at 45 degrees
        let (s, dist) = seg.project(&Vector2::new(12.0, 12.0));
        assert_near(s, 10.0 * FRAC_PI_2 / 2.0, 1e-9);
        assert_near(dist, (2f64 * 144.0).sqrt() - 10.0, 1e-9);
    }

    #[test]
    fn test_arc_projection_clamps_to_ends() {
        let seg = PathSegment::arc(Vector2::new(0.0, 0.0), 10.0, 0.0, FRAC_PI_2, 20.0, 20.0)
            .unwrap();

        // Just past the end of the sweep
        let (s, _) = seg.project(&Vector2::new(-1.0, 10.0));
        assert_near(s, seg.length_in(), 1e-9);

        // Just before the start
        let (s, _) = seg.project(&Vector2::new(10.0, -1.0));
        assert_near(s, 0.0, 1e-9);
    }

    #[test]
    fn test_degenerate_segments_rejected() {
        assert!(PathSegment::line(
            Vector2::new(1.0, 1.0),
            Vector2::new(1.0, 1.0),
            0.0,
            0.0
        )
        .is_none());

        assert!(PathSegment::arc(Vector2::new(0.0, 0.0), 10.0, 0.0, 0.0, 0.0, 0.0).is_none());
    }
}

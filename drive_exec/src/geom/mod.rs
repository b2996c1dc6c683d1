//! # Geometry primitives
//!
//! This module provides the 2D geometry used by the drive software: rigid
//! transforms (poses) on the field plane and body-frame rates (twists).
//!
//! All positions are in inches in the field frame. Headings are stored as
//! unit complex numbers ([`UnitComplex`]), i.e. a normalised (cos θ, sin θ)
//! pair, so repeated composition does not accumulate trigonometric drift.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{UnitComplex, Vector2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the vehicle in the field frame.
///
/// Composition is non-commutative: `a.compose(&b)` applies `b` in the frame
/// of `a`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the field frame.
    ///
    /// Units: inches
    pub position_in: Vector2<f64>,

    /// The heading, measured anticlockwise from the field +X axis.
    pub heading: UnitComplex<f64>,
}

/// An instantaneous velocity or small rigid delta in the body frame.
///
/// Twists are produced by the pose history differencer; this module only
/// defines the value type.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Twist {
    /// Forward component.
    ///
    /// Units: inches (or inches/second for a rate)
    pub dx_in: f64,

    /// Lateral (leftward positive) component.
    ///
    /// Units: inches (or inches/second for a rate)
    pub dy_in: f64,

    /// Rotational component, anticlockwise positive.
    ///
    /// Units: radians (or radians/second for a rate)
    pub dtheta_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose from a position and heading.
    pub fn new(position_in: Vector2<f64>, heading: UnitComplex<f64>) -> Self {
        Self {
            position_in,
            heading,
        }
    }

    /// Create a pose from raw coordinates and a heading in degrees.
    pub fn from_degrees(x_in: f64, y_in: f64, heading_deg: f64) -> Self {
        Self {
            position_in: Vector2::new(x_in, y_in),
            heading: heading_from_degrees(heading_deg),
        }
    }

    /// The identity pose - at the field origin pointing along +X.
    pub fn identity() -> Self {
        Self {
            position_in: Vector2::zeros(),
            heading: UnitComplex::identity(),
        }
    }

    /// Compose this pose with another, applying `other` in the frame of
    /// `self`.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            position_in: self.position_in + self.heading * other.position_in,
            heading: self.heading * other.heading,
        }
    }

    /// The inverse transform, such that `a.compose(&a.inverse())` is the
    /// identity.
    pub fn inverse(&self) -> Pose {
        let inv_heading = self.heading.inverse();
        Pose {
            position_in: -(inv_heading * self.position_in),
            heading: inv_heading,
        }
    }

    /// Transform a point in the body frame into the field frame.
    pub fn transform_point(&self, point_in: &Vector2<f64>) -> Vector2<f64> {
        self.position_in + self.heading * point_in
    }

    /// Transform a point in the field frame into the body frame.
    pub fn to_body(&self, point_in: &Vector2<f64>) -> Vector2<f64> {
        self.heading.inverse() * (point_in - self.position_in)
    }

    /// Unit vector pointing in the direction of the heading (in the field
    /// frame).
    pub fn forward2(&self) -> Vector2<f64> {
        self.heading * Vector2::x()
    }

    /// The heading angle in radians, in (-pi, pi].
    pub fn heading_rad(&self) -> f64 {
        self.heading.angle()
    }

    /// Interpolate between this pose and another.
    ///
    /// `t` is clamped to [0, 1]. The translation is interpolated linearly and
    /// the heading spherically.
    pub fn interpolate(&self, other: &Pose, t: f64) -> Pose {
        let t = t.max(0.0).min(1.0);
        Pose {
            position_in: self.position_in + (other.position_in - self.position_in) * t,
            heading: self.heading.slerp(&other.heading, t),
        }
    }

    /// The body-frame delta which takes this pose onto `other`.
    pub fn delta_to(&self, other: &Pose) -> Twist {
        let delta_pos = self.to_body(&other.position_in);
        Twist {
            dx_in: delta_pos[0],
            dy_in: delta_pos[1],
            dtheta_rad: (self.heading.inverse() * other.heading).angle(),
        }
    }

    /// True if all components of the pose are finite.
    pub fn is_finite(&self) -> bool {
        self.position_in[0].is_finite()
            && self.position_in[1].is_finite()
            && self.heading.re.is_finite()
            && self.heading.im.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Twist {
    /// Scale all components of the twist, e.g. to convert a fixed-period
    /// delta into a rate.
    pub fn scaled(&self, factor: f64) -> Twist {
        Twist {
            dx_in: self.dx_in * factor,
            dy_in: self.dy_in * factor,
            dtheta_rad: self.dtheta_rad * factor,
        }
    }

    /// True if all components of the twist are finite.
    pub fn is_finite(&self) -> bool {
        self.dx_in.is_finite() && self.dy_in.is_finite() && self.dtheta_rad.is_finite()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a canonical heading rotation from a raw angle in degrees.
///
/// The result is normalised, so raw sensor angles outside [0, 360) map onto
/// the same rotation as their wrapped equivalents.
pub fn heading_from_degrees(angle_deg: f64) -> UnitComplex<f64> {
    UnitComplex::new(angle_deg.to_radians())
}

/// Convert a heading rotation into degrees in (-180, 180].
pub fn heading_to_degrees(heading: &UnitComplex<f64>) -> f64 {
    heading.angle().to_degrees()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

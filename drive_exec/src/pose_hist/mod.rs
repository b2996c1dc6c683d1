//! # Pose history module
//!
//! This module provides a time-indexed, interpolating buffer of recent pose
//! estimates together with the accumulated odometry distance and the
//! predicted body velocity. It is filled by the localisation source
//! (odometry, simulation) and only ever read by the drive controller,
//! through the [`PoseProvider`] capability trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use ordered_float::NotNan;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

// Internal
use crate::geom::{Pose, Twist};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default number of observations kept in the buffer.
pub const DEFAULT_MAX_OBSERVATIONS: usize = 100;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A bounded, time-indexed buffer of pose estimates.
pub struct PoseHistory {
    /// Observed poses keyed by observation time in seconds.
    buffer: BTreeMap<NotNan<f64>, Pose>,

    /// Maximum number of observations kept; the oldest are dropped first.
    max_observations: usize,

    /// Total path-length driven, accumulated from odometry deltas.
    ///
    /// Units: inches
    distance_driven_in: f64,

    /// Most recent velocity estimate in the body frame.
    predicted_velocity: Twist,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Read-only view of the vehicle state consumed by the drive controller.
pub trait PoseProvider {
    /// The most recent pose estimate, or the identity pose if no
    /// observation has been made yet.
    fn latest_pose(&self) -> Pose;

    /// Total distance driven in inches.
    fn distance_driven_in(&self) -> f64;

    /// The current predicted body velocity.
    fn predicted_velocity(&self) -> Twist;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseHistory {
    /// Create a new history holding at most `max_observations` entries.
    pub fn new(max_observations: usize) -> Self {
        Self {
            buffer: BTreeMap::new(),
            max_observations: max_observations.max(1),
            distance_driven_in: 0.0,
            predicted_velocity: Twist::default(),
        }
    }

    /// Clear the history and start again from the given pose.
    pub fn reset(&mut self, time_s: f64, pose: Pose) {
        self.buffer.clear();
        self.distance_driven_in = 0.0;
        self.predicted_velocity = Twist::default();
        self.add_observation(time_s, pose);
    }

    /// Record a new pose observation.
    ///
    /// Non-finite observations are dropped with a warning - the history must
    /// never serve NaN poses to the controller.
    pub fn add_observation(&mut self, time_s: f64, pose: Pose) {
        if !pose.is_finite() || !time_s.is_finite() {
            warn!("Dropping non-finite pose observation at t = {}", time_s);
            return;
        }

        // Safe, checked finite above
        let key = match NotNan::new(time_s) {
            Ok(k) => k,
            Err(_) => return,
        };

        self.buffer.insert(key, pose);

        while self.buffer.len() > self.max_observations {
            let oldest = match self.buffer.keys().next() {
                Some(k) => *k,
                None => break,
            };
            self.buffer.remove(&oldest);
        }
    }

    /// Accumulate an odometry delta into the driven distance.
    pub fn integrate_odometry(&mut self, delta: &Twist) {
        if !delta.is_finite() {
            warn!("Dropping non-finite odometry delta");
            return;
        }

        self.distance_driven_in += (delta.dx_in.powi(2) + delta.dy_in.powi(2)).sqrt();
    }

    /// Update the predicted body velocity.
    pub fn set_predicted_velocity(&mut self, velocity: Twist) {
        self.predicted_velocity = velocity;
    }

    /// The most recent observation, if any.
    pub fn latest(&self) -> Option<(f64, Pose)> {
        self.buffer
            .iter()
            .next_back()
            .map(|(t, p)| (t.into_inner(), *p))
    }

    /// The pose at the given time, interpolating between the neighbouring
    /// observations. Times outside the buffered range clamp to the nearest
    /// observation. Returns `None` only when the buffer is empty.
    pub fn pose_at(&self, time_s: f64) -> Option<Pose> {
        if self.buffer.is_empty() || !time_s.is_finite() {
            return None;
        }

        let key = NotNan::new(time_s).ok()?;

        let before = self.buffer.range(..=key).next_back();
        let after = self.buffer.range(key..).next();

        match (before, after) {
            (Some((t0, p0)), Some((t1, p1))) => {
                if t0 == t1 {
                    Some(*p0)
                } else {
                    let frac =
                        (time_s - t0.into_inner()) / (t1.into_inner() - t0.into_inner());
                    Some(p0.interpolate(p1, frac))
                }
            }
            (Some((_, p0)), None) => Some(*p0),
            (None, Some((_, p1))) => Some(*p1),
            (None, None) => None,
        }
    }

    /// Number of buffered observations.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if no observations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl PoseProvider for PoseHistory {
    fn latest_pose(&self) -> Pose {
        self.latest().map(|(_, p)| p).unwrap_or_default()
    }

    fn distance_driven_in(&self) -> f64 {
        self.distance_driven_in
    }

    fn predicted_velocity(&self) -> Twist {
        self.predicted_velocity
    }
}

/// Shared single-threaded handles provide the same view, which is how the
/// production history is shared between the localisation source (writer)
/// and the controller (reader).
impl<P: PoseProvider> PoseProvider for Rc<RefCell<P>> {
    fn latest_pose(&self) -> Pose {
        self.borrow().latest_pose()
    }

    fn distance_driven_in(&self) -> f64 {
        self.borrow().distance_driven_in()
    }

    fn predicted_velocity(&self) -> Twist {
        self.borrow().predicted_velocity()
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
    fn test_latest_and_interpolation() {
        let mut hist = PoseHistory::new(10);

        hist.add_observation(0.0, Pose::from_degrees(0.0, 0.0, 0.0));
        hist.add_observation(1.0, Pose::from_degrees(10.0, 0.0, 90.0));

        let (t, latest) = hist.latest().unwrap();
        assert_near(t, 1.0, 1e-12);
        assert_near(latest.position_in[0], 10.0, 1e-9);

        let mid = hist.pose_at(0.5).unwrap();
        assert_near(mid.position_in[0], 5.0, 1e-9);
        assert_near(mid.heading_rad().to_degrees(), 45.0, 1e-9);

        // Outside the range clamps to the nearest observation
        let early = hist.pose_at(-5.0).unwrap();
        assert_near(early.position_in[0], 0.0, 1e-9);
        let late = hist.pose_at(5.0).unwrap();
        assert_near(late.position_in[0], 10.0, 1e-9);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut hist = PoseHistory::new(3);

        for i in 0..10 {
            hist.add_observation(i as f64, Pose::from_degrees(i as f64, 0.0, 0.0));
        }

        assert_eq!(hist.len(), 3);

        // Oldest entries were dropped
        let early = hist.pose_at(0.0).unwrap();
        assert_near(early.position_in[0], 7.0, 1e-9);
    }

    #[test]
    fn test_non_finite_observations_dropped() {
        let mut hist = PoseHistory::new(10);

        hist.add_observation(0.0, Pose::from_degrees(1.0, 2.0, 0.0));
        hist.add_observation(1.0, Pose::from_degrees(f64::NAN, 2.0, 0.0));

        assert_eq!(hist.len(), 1);
        assert_near(hist.latest_pose().position_in[0], 1.0, 1e-9);
    }

    #[test]
    fn test_distance_accumulates() {
        let mut hist = PoseHistory::new(10);

        hist.integrate_odometry(&Twist {
            dx_in: 3.0,
            dy_in: 4.0,
            dtheta_rad: 0.0,
        });
        hist.integrate_odometry(&Twist {
            dx_in: 1.0,
            dy_in: 0.0,
            dtheta_rad: 0.1,
        });

        assert_near(hist.distance_driven_in(), 6.0, 1e-9);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut hist = PoseHistory::new(10);

        hist.add_observation(0.0, Pose::from_degrees(1.0, 1.0, 0.0));
        hist.integrate_odometry(&Twist {
            dx_in: 5.0,
            dy_in: 0.0,
            dtheta_rad: 0.0,
        });

        hist.reset(10.0, Pose::from_degrees(2.0, 2.0, 0.0));

        assert_eq!(hist.len(), 1);
        assert_near(hist.distance_driven_in(), 0.0, 1e-12);
        assert_near(hist.latest_pose().position_in[0], 2.0, 1e-9);
    }
}

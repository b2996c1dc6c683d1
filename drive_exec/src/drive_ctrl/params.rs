//! Parameters structure for drive control

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Clone, Debug, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----

    /// The diameter of the vehicle's wheels.
    ///
    /// Units: inches
    pub wheel_diameter_in: f64,

    /// Encoder resolution on the drive axes.
    ///
    /// Units: ticks/revolution
    pub encoder_ticks_per_rev: f64,

    /// Lateral distance between the left and right wheel contact lines.
    ///
    /// Units: inches
    pub track_width_in: f64,

    // ---- PATH FOLLOWING ----

    /// Lookahead distance used at and below `min_speed_ips`.
    ///
    /// Units: inches
    pub min_lookahead_in: f64,

    /// Lookahead distance used at and above `max_speed_ips`.
    ///
    /// Units: inches
    pub max_lookahead_in: f64,

    /// Minimum speed demand while a path is active. Keeps the vehicle
    /// crawling into the tolerance band instead of stalling short of it.
    ///
    /// Units: inches/second
    pub min_speed_ips: f64,

    /// Maximum speed demand.
    ///
    /// Units: inches/second
    pub max_speed_ips: f64,

    /// The path is complete once the remaining distance is within this
    /// band.
    ///
    /// Units: inches
    pub done_tolerance_in: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            wheel_diameter_in: 6.0,
            encoder_ticks_per_rev: 4096.0,
            track_width_in: 26.0,
            min_lookahead_in: 12.0,
            max_lookahead_in: 24.0,
            min_speed_ips: 4.0,
            max_speed_ips: 120.0,
            done_tolerance_in: 0.01,
        }
    }
}

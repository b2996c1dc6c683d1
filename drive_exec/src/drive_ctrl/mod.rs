//! # Drive control module
//!
//! Drive control owns the drive train. It runs in one of two modes:
//!
//! - **Open loop**: raw left/right commands from the operator are normalised
//!   and passed straight through to the motors, with no sensor feedback.
//! - **Path following**: a pure pursuit follower keeps the vehicle on the
//!   active [`Path`](crate::path::Path). Each control cycle the follower
//!   projects the latest pose estimate onto the path, picks a lookahead
//!   point a short arc length ahead, and converts the curvature needed to
//!   reach that point into differential wheel velocity demands.
//!
//! Mode transitions happen on the command entry points: installing a path
//! switches to path following, any open loop command switches back. The
//! hardware control mode is re-asserted on every entry-point call rather
//! than edge triggered, since the physical motor controllers can be reset
//! underneath the software.
//!
//! Nothing in this module is fatal at cycle time: every tick produces a
//! command, defaulting to zero velocity when state is undefined.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod follower;
mod params;
mod signal;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use signal::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during drive control operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Could not initialise the status report archiver: {0}")]
    ArchInitError(String),
}

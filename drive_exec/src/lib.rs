//! # Drive library.
//!
//! This library allows other crates in the workspace to access items defined inside the drive
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator interface - the capability boundary between the controller and the drive train
pub mod actuators;

/// Drive control module - follows the active path and handles open loop (teleoperated) driving
pub mod drive_ctrl;

/// Geometry primitives - poses, rotations and twists on the field plane
pub mod geom;

/// Path module - continuous queryable trajectories built from waypoint lists
pub mod path;

/// Pose history module - time-indexed interpolating buffer of pose estimates
pub mod pose_hist;

/// Route module - loads authored waypoint routes from disk
pub mod route;

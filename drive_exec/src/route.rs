//! # Route module
//!
//! Routes are authored waypoint lists stored as TOML files, one file per
//! field routine. This module loads a route file and hands its waypoints to
//! the path builder; the route data itself is owned by whoever authors the
//! routines, not by the drive software.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path as FsPath;

// Internal
use crate::path::{build_path_from_waypoints, Path, PathError, Waypoint};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An authored route: a named, ordered list of waypoints.
#[derive(Clone, Debug, Deserialize)]
pub struct Route {
    /// Human readable route name, used in logs and session archives.
    pub name: String,

    /// Drive the route backward (stern first).
    #[serde(default)]
    pub reversed: bool,

    /// The waypoints of the route, in traversal order.
    pub waypoints: Vec<RouteWaypoint>,
}

/// One waypoint entry in a route file.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct RouteWaypoint {
    /// Position in the field frame.
    ///
    /// Units: inches
    pub x_in: f64,
    pub y_in: f64,

    /// Desired speed at this waypoint.
    ///
    /// Units: inches/second
    pub speed_ips: f64,

    /// Corner smoothing radius, zero (the default) for a sharp vertex.
    ///
    /// Units: inches
    #[serde(default)]
    pub radius_in: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while loading a route file.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Cannot load the route file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the route file: {0}")]
    DeserialiseError(toml::de::Error),

    #[error("The route's waypoints do not build a valid path: {0}")]
    InvalidWaypoints(#[from] PathError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Route {
    /// Load a route from the given TOML file.
    pub fn load<P: AsRef<FsPath>>(path: P) -> Result<Self, RouteError> {
        let route_str = read_to_string(path).map_err(RouteError::FileLoadError)?;

        toml::from_str(&route_str).map_err(RouteError::DeserialiseError)
    }

    /// The route's waypoints as path builder input.
    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.waypoints
            .iter()
            .map(|wp| Waypoint::new(wp.x_in, wp.y_in, wp.speed_ips, wp.radius_in))
            .collect()
    }

    /// Build the continuous path for this route.
    pub fn build_path(&self) -> Result<Path, RouteError> {
        Ok(build_path_from_waypoints(&self.waypoints())?)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_and_build() {
        let route: Route = toml::from_str(
            r#"
            name = "bench_route"
            reversed = false

            [[waypoints]]
            x_in = 0.0
            y_in = 0.0
            speed_ips = 0.0

            [[waypoints]]
            x_in = 60.0
            y_in = 0.0
            speed_ips = 40.0
            radius_in = 12.0

            [[waypoints]]
            x_in = 60.0
            y_in = 60.0
            speed_ips = 30.0
            "#,
        )
        .unwrap();

        assert_eq!(route.name, "bench_route");
        assert!(!route.reversed);
        assert_eq!(route.waypoints.len(), 3);

        // Default radius is a sharp vertex
        assert_eq!(route.waypoints[0].radius_in, 0.0);

        let path = route.build_path().unwrap();
        assert_eq!(path.num_segments(), 3);
    }

    #[test]
    fn test_degenerate_route_is_rejected() {
        let route: Route = toml::from_str(
            r#"
            name = "bad"

            [[waypoints]]
            x_in = 0.0
            y_in = 0.0
            speed_ips = 10.0
            "#,
        )
        .unwrap();

        assert!(matches!(
            route.build_path(),
            Err(RouteError::InvalidWaypoints(_))
        ));
    }
}

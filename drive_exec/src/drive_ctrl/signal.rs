//! Open loop commands passed into drive control

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A raw left/right open loop command pair.
///
/// Values are nominally in [-1, 1] but are not trusted; drive control
/// normalises before commanding hardware.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DriveSignal {
    pub left: f64,
    pub right: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveSignal {
    /// The zero command.
    pub const NEUTRAL: DriveSignal = DriveSignal {
        left: 0.0,
        right: 0.0,
    };

    /// Create a new signal.
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Normalise the signal so that no side exceeds unit magnitude.
    ///
    /// When either side exceeds 1 in magnitude both sides are divided by the
    /// larger magnitude, preserving their ratio. Signals already inside
    /// [-1, 1] pass through unscaled. Non-finite signals normalise to
    /// [`DriveSignal::NEUTRAL`].
    pub fn normalised(&self) -> DriveSignal {
        if !self.left.is_finite() || !self.right.is_finite() {
            return DriveSignal::NEUTRAL;
        }

        let magnitude = self.left.abs().max(self.right.abs());

        if magnitude > 1.0 {
            DriveSignal {
                left: self.left / magnitude,
                right: self.right / magnitude,
            }
        } else {
            *self
        }
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
    fn test_in_range_passes_through() {
        let sig = DriveSignal::new(0.3, -0.8).normalised();

        assert_near(sig.left, 0.3, 1e-12);
        assert_near(sig.right, -0.8, 1e-12);
    }

    #[test]
    fn test_overrange_preserves_ratio() {
        let sig = DriveSignal::new(10.0, 5.0).normalised();

        assert_near(sig.left, 1.0, 1e-12);
        assert_near(sig.right, 0.5, 1e-12);

        let sig = DriveSignal::new(-10.0, -5.0).normalised();

        assert_near(sig.left, -1.0, 1e-12);
        assert_near(sig.right, -0.5, 1e-12);
    }

    #[test]
    fn test_non_finite_becomes_neutral() {
        let sig = DriveSignal::new(f64::NAN, 0.5).normalised();

        assert_near(sig.left, 0.0, 1e-12);
        assert_near(sig.right, 0.0, 1e-12);
    }
}

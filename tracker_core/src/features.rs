//! Feature extraction over a window of kinematic snapshots.
//!
//! Produces the small [`FeatureVector`] the behavior classifier scores:
//! mean 3-D speed, mean width rate (approach proxy) and the circular
//! standard deviation of the heading.

use crate::types::KinematicState;
use serde::{Deserialize, Serialize};

/// Floor on the mean resultant length. Keeps `ln(R)` finite when headings
/// are spread uniformly around the circle (std ≈ 369°).
pub const MIN_RESULTANT_LENGTH: f64 = 1e-9;

/// Features derived from a track's state history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean of `speed_3d` over the window
    pub avg_speed: f64,
    /// Mean of `vw` over the window
    pub avg_vz: f64,
    /// Circular standard deviation of `direction_xy_radians`, in degrees
    pub direction_std: f64,
}

impl FeatureVector {
    /// Compute features from a window of snapshots.
    ///
    /// The window must be non-empty; callers gate on track length before
    /// asking for features.
    pub fn from_states<'a, I>(states: I) -> Self
    where
        I: IntoIterator<Item = &'a KinematicState>,
    {
        let mut n = 0usize;
        let (mut sum_speed, mut sum_vz) = (0.0, 0.0);
        let (mut sum_cos, mut sum_sin) = (0.0, 0.0);
        for s in states {
            n += 1;
            sum_speed += s.speed_3d;
            sum_vz += s.vw;
            sum_cos += s.direction_xy_radians.cos();
            sum_sin += s.direction_xy_radians.sin();
        }
        debug_assert!(n > 0, "feature window must not be empty");

        let n = n as f64;
        Self {
            avg_speed: sum_speed / n,
            avg_vz: sum_vz / n,
            direction_std: circular_std_from_mean(sum_cos / n, sum_sin / n),
        }
    }
}

/// Circular standard deviation (degrees) of a set of angles in radians.
/// Handles wraparound: {359°, 1°} is tight, not 180° apart.
pub fn circular_std_dev(radians: &[f64]) -> f64 {
    debug_assert!(!radians.is_empty(), "need at least one angle");
    let n = radians.len() as f64;
    let mean_cos = radians.iter().map(|a| a.cos()).sum::<f64>() / n;
    let mean_sin = radians.iter().map(|a| a.sin()).sum::<f64>() / n;
    circular_std_from_mean(mean_cos, mean_sin)
}

fn circular_std_from_mean(mean_cos: f64, mean_sin: f64) -> f64 {
    let r = mean_cos.hypot(mean_sin);
    // r may round slightly above 1 for identical angles
    let r = if r.is_finite() {
        r.clamp(MIN_RESULTANT_LENGTH, 1.0)
    } else {
        MIN_RESULTANT_LENGTH
    };
    (-2.0 * r.ln()).sqrt().to_degrees()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

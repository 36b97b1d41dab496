//! Kalman filter: predict and update steps for a bounding box.
//!
//! # Design choices
//! - We use a **linear KF** with a constant-velocity (CV) motion model applied
//!   to every box component, including width and height. Their rates act as
//!   a proxy for motion along the camera axis.
//! - All math is done in `f64` via `nalgebra` fixed-size matrices.
//! - Each track owns exactly one [`BoxKalmanFilter`]; the filter holds its own
//!   state and covariance.
//!
//! ## State vector
//! x = [cx, cy, w, h, vx, vy, vw, vh]ᵀ  (8-dimensional)
//!
//! ## CV Transition model
//! F = I₈ + dt * [[0₄ I₄]; [0₄ 0₄]]
//!
//! ## Noise
//! Q = q·I₈,  R = r·I₄

use crate::{
    bbox::{cxcywh_to_xyxy, BBox},
    error::{require_non_negative, require_positive, ConfigResult},
    types::{KinematicState, MeasCov, MeasVec, ObsMatrix, StateCov, StateVec, MEAS_DIM},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Diagonal loading added to S when it cannot be inverted as-is.
const S_REGULARIZATION: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the box Kalman filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Time step between frames (1 / FPS). Velocities are expressed per this unit.
    pub dt: f64,
    /// Process noise scalar q (Q = q·I).
    /// Higher = reacts faster to manoeuvres, smooths less.
    pub process_noise: f64,
    /// Measurement noise scalar r (R = r·I).
    /// Higher = trusts the detector less, smoother output.
    pub measurement_noise: f64,
    /// Diagonal of P set on the first measurement.
    pub initial_uncertainty: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 30.0,
            process_noise: 10.0,
            measurement_noise: 10.0,
            initial_uncertainty: 1000.0,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        require_positive("tracker.estimator", "dt", self.dt)?;
        require_non_negative("tracker.estimator", "process_noise", self.process_noise)?;
        require_positive("tracker.estimator", "measurement_noise", self.measurement_noise)?;
        require_positive(
            "tracker.estimator",
            "initial_uncertainty",
            self.initial_uncertainty,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Constant-velocity Kalman filter over `[cx, cy, w, h]` and their rates.
#[derive(Clone, Debug)]
pub struct BoxKalmanFilter {
    x: StateVec,
    p: StateCov,
    f: StateCov,
    h: ObsMatrix,
    q: StateCov,
    r: MeasCov,
    initial_uncertainty: f64,
    initialized: bool,
}

impl BoxKalmanFilter {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            x: StateVec::zeros(),
            p: StateCov::identity() * config.initial_uncertainty,
            f: Self::transition_matrix(config.dt),
            h: Self::observation_matrix(),
            q: StateCov::identity() * config.process_noise,
            r: MeasCov::identity() * config.measurement_noise,
            initial_uncertainty: config.initial_uncertainty,
            initialized: false,
        }
    }

    /// Build state transition matrix F for timestep dt.
    pub fn transition_matrix(dt: f64) -> StateCov {
        let mut f = StateCov::identity();
        // component += rate * dt
        for i in 0..MEAS_DIM {
            f[(i, i + MEAS_DIM)] = dt;
        }
        f
    }

    /// Observation matrix H selecting [cx, cy, w, h].
    pub fn observation_matrix() -> ObsMatrix {
        let mut h = ObsMatrix::zeros();
        for i in 0..MEAS_DIM {
            h[(i, i)] = 1.0;
        }
        h
    }

    /// Propagate state and covariance one step.
    pub fn predict(&mut self) {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    /// Correct the estimate with a `[cx, cy, w, h]` measurement, or just
    /// report the current state when `z` is `None`.
    pub fn update(&mut self, z: Option<&MeasVec>) -> KinematicState {
        let Some(z) = z else {
            return self.state();
        };

        if !self.initialized {
            // No prior estimate to blend with: adopt the measurement.
            self.x.fixed_rows_mut::<MEAS_DIM>(0).copy_from(z);
            self.p = StateCov::identity() * self.initial_uncertainty;
            self.initialized = true;
            return self.state();
        }

        // Innovation: y = z − H·x
        let y = z - self.h * self.x;

        // Innovation covariance: S = H·P·Hᵀ + R
        let s = self.h * self.p * self.h.transpose() + self.r;

        let Some(s_inv) = invert_innovation_cov(&s) else {
            warn!("innovation covariance is singular; keeping predicted state");
            return self.state();
        };

        // Kalman gain: K = P·Hᵀ·S⁻¹
        let k = self.p * self.h.transpose() * s_inv;

        self.x += k * y;
        self.p = (StateCov::identity() - k * self.h) * self.p;

        self.state()
    }

    /// Derived kinematic snapshot of the current estimate.
    pub fn state(&self) -> KinematicState {
        KinematicState::from_state_vec(&self.x, self.initialized)
    }

    /// Current estimate as an xyxy box.
    pub fn bbox_xyxy(&self) -> BBox {
        cxcywh_to_xyxy([self.x[0], self.x[1], self.x[2], self.x[3]])
    }

    /// Box one step ahead under the motion model, without mutating the
    /// filter. Used to associate the next frame's detections.
    pub fn predicted_bbox_xyxy(&self) -> BBox {
        let x = self.f * self.x;
        cxcywh_to_xyxy([x[0], x[1], x[2], x[3]])
    }

    pub fn state_vector(&self) -> &StateVec {
        &self.x
    }

    pub fn covariance(&self) -> &StateCov {
        &self.p
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Invert S, retrying once with diagonal loading. `None` means even the
/// regularized matrix is singular or produced non-finite values.
fn invert_innovation_cov(s: &MeasCov) -> Option<MeasCov> {
    let finite = |m: &MeasCov| m.iter().all(|v| v.is_finite());
    if let Some(inv) = s.try_inverse().filter(finite) {
        return Some(inv);
    }
    warn!("regularizing near-singular innovation covariance");
    let loaded = s + MeasCov::identity() * S_REGULARIZATION;
    loaded.try_inverse().filter(finite)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

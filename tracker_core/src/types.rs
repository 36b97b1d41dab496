//! Fundamental types used across the entire workspace.

use crate::bbox::{xyxy_to_cxcywh, xyxy_to_xywh, BBox};
use nalgebra::{SMatrix, SVector, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in Kalman filter.
// ---------------------------------------------------------------------------

/// Dimension of the estimator state.
pub const STATE_DIM: usize = 8;

/// Dimension of a box measurement `[cx, cy, w, h]`.
pub const MEAS_DIM: usize = 4;

/// 8-DOF state vector: [cx, cy, w, h, vx, vy, vw, vh]
pub type StateVec = SVector<f64, STATE_DIM>;

/// 8×8 state covariance matrix
pub type StateCov = SMatrix<f64, STATE_DIM, STATE_DIM>;

/// Box measurement vector [cx, cy, w, h]
pub type MeasVec = Vector4<f64>;

/// 4×4 measurement-space matrix (R, S)
pub type MeasCov = SMatrix<f64, MEAS_DIM, MEAS_DIM>;

/// 4×8 observation matrix H
pub type ObsMatrix = SMatrix<f64, MEAS_DIM, STATE_DIM>;

// ---------------------------------------------------------------------------
// Identifier types — newtype wrapper so IDs are never confused at compile time
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// A single detector output for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box corners [x1, y1, x2, y2] in pixels
    pub bbox_xyxy: BBox,
    /// Detector confidence, when the detector reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Opaque crop payload (e.g. encoded image patch). Never interpreted here.
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl Detection {
    pub fn new(bbox_xyxy: BBox) -> Self {
        Self {
            bbox_xyxy,
            confidence: None,
            data: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Box as [x, y, width, height] (top-left origin).
    pub fn bbox_xywh(&self) -> BBox {
        xyxy_to_xywh(self.bbox_xyxy)
    }

    /// Box as [center_x, center_y, width, height].
    pub fn bbox_cxcywh(&self) -> BBox {
        xyxy_to_cxcywh(self.bbox_xyxy)
    }

    /// Box as a measurement vector for the estimator.
    pub fn measurement(&self) -> MeasVec {
        let [cx, cy, w, h] = self.bbox_cxcywh();
        MeasVec::new(cx, cy, w, h)
    }
}

// ---------------------------------------------------------------------------
// Kinematic state — derived snapshot of the estimator
// ---------------------------------------------------------------------------

/// Snapshot of a track's filtered kinematics, rebuilt from the estimator
/// state vector on every update. Width/height rates stand in for motion along
/// the camera axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub vx: f64,
    pub vy: f64,
    pub vw: f64,
    pub vh: f64,
    /// sqrt(vx² + vy²)
    pub speed_xy: f64,
    /// sqrt(vx² + vy² + vw²)
    pub speed_3d: f64,
    /// w * h
    pub area: f64,
    /// Rate of change of the area: w*vh + h*vw
    pub va: f64,
    /// atan2(vy, vx)
    pub direction_xy_radians: f64,
    pub is_initialized: bool,
}

impl KinematicState {
    /// Build the derived quantities from a raw state vector.
    pub fn from_state_vec(x: &StateVec, is_initialized: bool) -> Self {
        let (cx, cy, w, h) = (x[0], x[1], x[2], x[3]);
        let (vx, vy, vw, vh) = (x[4], x[5], x[6], x[7]);
        Self {
            cx,
            cy,
            w,
            h,
            vx,
            vy,
            vw,
            vh,
            speed_xy: (vx * vx + vy * vy).sqrt(),
            speed_3d: (vx * vx + vy * vy + vw * vw).sqrt(),
            area: w * h,
            va: w * vh + h * vw,
            direction_xy_radians: vy.atan2(vx),
            is_initialized,
        }
    }

    /// Center/size as [cx, cy, w, h].
    pub fn bbox_cxcywh(&self) -> BBox {
        [self.cx, self.cy, self.w, self.h]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Tracking metrics against ground truth: detection counts, ID switches,
//! RMSE of center position and velocity, behavior-label accuracy.
//!
//! Each frame, truths and reported tracks are paired greedily by descending
//! IoU, one-to-one, keeping pairs with IoU ≥ [`MATCH_IOU`].

use crate::{
    bbox::{iou, xyxy_to_cxcywh, BBox},
    classifier::BehaviorKind,
    pipeline::{FrameReport, TrackReport},
    types::TrackId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum IoU for a track to count as following a target.
pub const MATCH_IOU: f64 = 0.3;

/// Ground-truth state of one target in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// True target ID (from simulator)
    pub target_id: u64,
    pub bbox_xyxy: BBox,
    /// Center velocity (vx, vy), same time unit as the estimator's `dt`
    pub velocity: [f64; 2],
    /// Labelled behavior, when the scenario defines one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorKind>,
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Number of frames evaluated
    pub n_frames: u64,
    /// Truths matched to a track (sample count for the RMSEs)
    pub n_matched: u64,
    pub sum_sq_pos_err: f64,
    pub sum_sq_vel_err: f64,
    pub true_positives: u64,
    /// Reported tracks not matched to any truth
    pub false_positives: u64,
    /// Truths not matched to any track
    pub false_negatives: u64,
    /// Truth followed by a different track than on its previous match
    pub id_switches: u64,
    /// Matched tracks carrying a behavior distribution
    pub n_classified: u64,
    /// ... whose dominant behavior equals the label
    pub n_behavior_correct: u64,
    #[serde(skip)]
    last_track: HashMap<u64, TrackId>,
}

impl TrackingMetrics {
    /// Root-mean-square center error (pixels).
    pub fn rmse_position(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_matched as f64).sqrt()
    }

    /// Root-mean-square center velocity error.
    pub fn rmse_velocity(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_vel_err / self.n_matched as f64).sqrt()
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Fraction of classified matches whose dominant behavior is the label.
    /// `None` until something labelled has been classified.
    pub fn behavior_accuracy(&self) -> Option<f64> {
        (self.n_classified > 0).then(|| self.n_behavior_correct as f64 / self.n_classified as f64)
    }

    /// Accumulate one frame.
    pub fn accumulate(&mut self, report: &FrameReport, truths: &[GroundTruth]) {
        self.n_frames += 1;

        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (gi, gt) in truths.iter().enumerate() {
            for (ti, track) in report.tracks.iter().enumerate() {
                let overlap = iou(&gt.bbox_xyxy, &track.bbox_xyxy);
                if overlap >= MATCH_IOU {
                    candidates.push((overlap, gi, ti));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut truth_used = vec![false; truths.len()];
        let mut track_used = vec![false; report.tracks.len()];
        for (_, gi, ti) in candidates {
            if truth_used[gi] || track_used[ti] {
                continue;
            }
            truth_used[gi] = true;
            track_used[ti] = true;
            self.record_match(&truths[gi], &report.tracks[ti]);
        }

        self.false_negatives += truth_used.iter().filter(|u| !**u).count() as u64;
        self.false_positives += track_used.iter().filter(|u| !**u).count() as u64;
    }

    fn record_match(&mut self, gt: &GroundTruth, track: &TrackReport) {
        let [gx, gy, _, _] = xyxy_to_cxcywh(gt.bbox_xyxy);
        let dx = track.state.cx - gx;
        let dy = track.state.cy - gy;
        let dvx = track.state.vx - gt.velocity[0];
        let dvy = track.state.vy - gt.velocity[1];
        self.sum_sq_pos_err += dx * dx + dy * dy;
        self.sum_sq_vel_err += dvx * dvx + dvy * dvy;
        self.n_matched += 1;
        self.true_positives += 1;

        if let Some(prev) = self.last_track.insert(gt.target_id, track.track_id) {
            if prev != track.track_id {
                self.id_switches += 1;
            }
        }

        if let (Some(label), Some(probs)) = (gt.behavior, &track.behavior) {
            self.n_classified += 1;
            if probs.dominant().map(|(kind, _)| kind) == Some(label) {
                self.n_behavior_correct += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Camera detector simulator.
//!
//! Turns true target boxes into per-frame detections with:
//! - Gaussian noise on center and size
//! - Miss probability (1 - P_D)
//! - Poisson clutter (false alarms) anywhere in the image
//! - A confidence value, high for real targets and low for clutter
//!
//! Output order is shuffled so downstream code cannot rely on it.

use crate::target::{Target, MIN_BOX_SIDE};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracker_core::{bbox::cxcywh_to_xyxy, types::Detection};

/// Detector model parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    /// Image size [width, height] in pixels
    pub image_size: [f64; 2],
    /// Probability that a visible target is detected
    pub p_detection: f64,
    /// Std of center noise (px)
    pub center_noise_std: f64,
    /// Std of width/height noise (px)
    pub size_noise_std: f64,
    /// Mean number of false alarms per frame
    pub lambda_clutter: f64,
    /// Side length range of clutter boxes (px)
    pub clutter_size: [f64; 2],
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            image_size: [1280.0, 720.0],
            p_detection: 0.95,
            center_noise_std: 1.0,
            size_noise_std: 0.5,
            lambda_clutter: 0.05,
            clutter_size: [8.0, 40.0],
        }
    }
}

/// Generates detections from a set of targets.
pub struct CameraSimulator {
    pub params: CameraParams,
    rng: ChaCha8Rng,
}

impl CameraSimulator {
    pub fn new(params: CameraParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Detections for the frame at time `t`.
    pub fn observe(&mut self, targets: &[Target], t: f64) -> Vec<Detection> {
        let p = self.params.clone();
        let mut detections = Vec::new();

        // True detections
        for target in targets {
            if !target.is_active(t) {
                continue;
            }
            if self.rng.gen::<f64>() > p.p_detection {
                continue;
            }

            let s = &target.state;
            let cx = s[0] + p.center_noise_std * self.normal();
            let cy = s[1] + p.center_noise_std * self.normal();
            let w = (s[2] + p.size_noise_std * self.normal()).max(MIN_BOX_SIDE);
            let h = (s[3] + p.size_noise_std * self.normal()).max(MIN_BOX_SIDE);
            if !in_image(cx, cy, &p.image_size) {
                continue;
            }
            let confidence = 0.7 + 0.3 * self.rng.gen::<f64>();
            detections
                .push(Detection::new(cxcywh_to_xyxy([cx, cy, w, h])).with_confidence(confidence));
        }

        // Clutter: Poisson count by multiplying uniforms until below e^{-lambda}
        let n_clutter = if p.lambda_clutter <= 0.0 {
            0usize
        } else {
            let mut n = 0usize;
            let threshold = (-p.lambda_clutter).exp();
            let mut prod = self.rng.gen::<f64>();
            while prod > threshold && n < 50 {
                prod *= self.rng.gen::<f64>();
                n += 1;
            }
            n
        };
        for _ in 0..n_clutter {
            let [lo, hi] = p.clutter_size;
            let side = lo + (hi - lo) * self.rng.gen::<f64>();
            let cx = p.image_size[0] * self.rng.gen::<f64>();
            let cy = p.image_size[1] * self.rng.gen::<f64>();
            let confidence = 0.2 + 0.4 * self.rng.gen::<f64>();
            let bbox = cxcywh_to_xyxy([cx, cy, side, side]);
            detections.push(Detection::new(bbox).with_confidence(confidence));
        }

        detections.shuffle(&mut self.rng);
        detections
    }

    fn normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

fn in_image(cx: f64, cy: f64, size: &[f64; 2]) -> bool {
    (0.0..=size[0]).contains(&cx) && (0.0..=size[1]).contains(&cy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MotionSpec;
    use tracker_core::classifier::BehaviorKind;

    fn still(id: u64, cx: f64) -> Target {
        Target::new(
            id,
            [cx, 300.0, 40.0, 30.0],
            [0.0, 0.0],
            MotionSpec::ConstantVelocity,
            BehaviorKind::Hovering,
        )
    }

    fn ideal() -> CameraParams {
        CameraParams {
            p_detection: 1.0,
            center_noise_std: 0.0,
            size_noise_std: 0.0,
            lambda_clutter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn ideal_camera_reports_true_boxes() {
        let mut cam = CameraSimulator::new(ideal(), 1);
        let target = still(0, 100.0);
        let dets = cam.observe(std::slice::from_ref(&target), 0.0);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox_xyxy, target.bbox_xyxy());
        let c = dets[0].confidence.unwrap();
        assert!((0.7..=1.0).contains(&c));
    }

    #[test]
    fn inactive_and_off_image_targets_are_unseen() {
        let mut cam = CameraSimulator::new(ideal(), 1);
        let late = still(0, 100.0).active_between(Some(5.0), None);
        let outside = still(1, -200.0);
        assert!(cam.observe(&[late, outside], 0.0).is_empty());
    }

    #[test]
    fn miss_rate_follows_p_detection() {
        let mut cam = CameraSimulator::new(
            CameraParams {
                p_detection: 0.5,
                ..ideal()
            },
            9,
        );
        let target = still(0, 100.0);
        let seen: usize = (0..2000)
            .map(|_| cam.observe(std::slice::from_ref(&target), 0.0).len())
            .sum();
        assert!((800..1200).contains(&seen), "seen {seen} of 2000");
    }

    #[test]
    fn clutter_rate_is_roughly_lambda() {
        let mut cam = CameraSimulator::new(
            CameraParams {
                lambda_clutter: 2.0,
                ..ideal()
            },
            4,
        );
        let total: usize = (0..1000).map(|_| cam.observe(&[], 0.0).len()).sum();
        let mean = total as f64 / 1000.0;
        assert!((1.7..2.3).contains(&mean), "mean clutter {mean}");
    }

    #[test]
    fn same_seed_same_detections() {
        let targets = [still(0, 100.0), still(1, 600.0)];
        let mut a = CameraSimulator::new(CameraParams::default(), 77);
        let mut b = CameraSimulator::new(CameraParams::default(), 77);
        for k in 0..20 {
            let t = k as f64 / 30.0;
            assert_eq!(a.observe(&targets, t), b.observe(&targets, t));
        }
    }
}

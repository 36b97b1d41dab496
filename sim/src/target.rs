//! Target trajectory models and state propagation in image space.
//!
//! Each target has a true box state `[cx, cy, w, h, vx, vy, vw, vh]` (pixels
//! and pixels per second) and a `MotionSpec` describing how it moves. Width
//! and height rates stand in for range rate: a growing box is approaching.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracker_core::{
    bbox::{cxcywh_to_xyxy, BBox},
    classifier::BehaviorKind,
    metrics::GroundTruth,
};

/// Smallest box side a shrinking target reaches.
pub const MIN_BOX_SIDE: f64 = 4.0;

/// Describes target motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Holds position; velocity is a mean-reverting random walk with
    /// per-step standard deviation `jitter` (px/s).
    Hover { jitter: f64 },
    /// Constant velocity: the state's rates are applied unchanged.
    ConstantVelocity,
    /// Box grows at `rate` px/s in width, height scaled to keep the aspect.
    Approach { rate: f64 },
    /// Box shrinks at `rate` px/s down to [`MIN_BOX_SIDE`].
    Retreat { rate: f64 },
    /// Heading oscillates around `heading` (rad) by ±`amplitude` (rad) with
    /// the given `period` (s), at constant `speed` (px/s).
    Weave {
        heading: f64,
        speed: f64,
        amplitude: f64,
        period: f64,
    },
    /// Switch motion at given times. The active segment is the last one whose
    /// `start` <= t.
    Segmented { segments: Vec<Segment> },
}

/// One leg of a segmented trajectory, with its own behavior label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub behavior: BehaviorKind,
    pub motion: MotionSpec,
}

/// A simulated target with ground-truth state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Unique target ID (used for metrics)
    pub id: u64,
    /// True state [cx, cy, w, h, vx, vy, vw, vh]
    pub state: [f64; 8],
    pub motion: MotionSpec,
    /// Label before the first segment of a segmented motion, and for the
    /// whole run otherwise
    pub behavior: BehaviorKind,
    /// Optional: target appears at this time (no detections before)
    pub appear_at: Option<f64>,
    /// Optional: target leaves the scene at this time
    pub disappear_at: Option<f64>,
}

impl Target {
    pub fn new(
        id: u64,
        cxcywh: [f64; 4],
        velocity: [f64; 2],
        motion: MotionSpec,
        behavior: BehaviorKind,
    ) -> Self {
        let [cx, cy, w, h] = cxcywh;
        Self {
            id,
            state: [cx, cy, w, h, velocity[0], velocity[1], 0.0, 0.0],
            motion,
            behavior,
            appear_at: None,
            disappear_at: None,
        }
    }

    pub fn active_between(mut self, appear_at: Option<f64>, disappear_at: Option<f64>) -> Self {
        self.appear_at = appear_at;
        self.disappear_at = disappear_at;
        self
    }

    /// Propagate true state by `dt` seconds according to the motion spec.
    pub fn step<R: Rng>(&mut self, t: f64, dt: f64, rng: &mut R) {
        apply_motion(&self.motion, &mut self.state, t, dt, rng);
    }

    /// True if target is in the scene at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if let Some(appear) = self.appear_at {
            if t < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        true
    }

    /// Ground-truth behavior at time `t`.
    pub fn behavior_at(&self, t: f64) -> BehaviorKind {
        match &self.motion {
            MotionSpec::Segmented { segments } => active_segment(segments, t)
                .map(|s| s.behavior)
                .unwrap_or(self.behavior),
            _ => self.behavior,
        }
    }

    pub fn bbox_xyxy(&self) -> BBox {
        let s = &self.state;
        cxcywh_to_xyxy([s[0], s[1], s[2], s[3]])
    }

    pub fn ground_truth(&self, t: f64) -> GroundTruth {
        GroundTruth {
            target_id: self.id,
            bbox_xyxy: self.bbox_xyxy(),
            velocity: [self.state[4], self.state[5]],
            behavior: Some(self.behavior_at(t)),
        }
    }
}

fn active_segment(segments: &[Segment], t: f64) -> Option<&Segment> {
    segments.iter().filter(|s| s.start <= t).last()
}

fn apply_motion<R: Rng>(motion: &MotionSpec, s: &mut [f64; 8], t: f64, dt: f64, rng: &mut R) {
    match motion {
        MotionSpec::Hover { jitter } => {
            for i in 4..6 {
                let n: f64 = rng.sample(StandardNormal);
                s[i] = 0.7 * s[i] + jitter * n;
            }
            s[6] = 0.0;
            s[7] = 0.0;
        }
        MotionSpec::ConstantVelocity => {}
        MotionSpec::Approach { rate } => {
            s[6] = *rate;
            s[7] = rate * s[3] / s[2].max(MIN_BOX_SIDE);
        }
        MotionSpec::Retreat { rate } => {
            if s[2] - rate * dt <= MIN_BOX_SIDE || s[3] <= MIN_BOX_SIDE {
                s[6] = 0.0;
                s[7] = 0.0;
            } else {
                s[6] = -rate;
                s[7] = -rate * s[3] / s[2];
            }
        }
        MotionSpec::Weave {
            heading,
            speed,
            amplitude,
            period,
        } => {
            let h = heading + amplitude * (std::f64::consts::TAU * t / period).sin();
            s[4] = speed * h.cos();
            s[5] = speed * h.sin();
        }
        MotionSpec::Segmented { segments } => {
            if let Some(seg) = active_segment(segments, t) {
                apply_motion(&seg.motion, s, t, dt, rng);
            }
        }
    }

    for i in 0..4 {
        s[i] += s[i + 4] * dt;
    }
    s[2] = s[2].max(MIN_BOX_SIDE);
    s[3] = s[3].max(MIN_BOX_SIDE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f64 = 1.0 / 30.0;

    fn run(target: &mut Target, steps: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for k in 0..steps {
            target.step(k as f64 * DT, DT, &mut rng);
        }
    }

    #[test]
    fn constant_velocity_moves_linearly() {
        let mut t = Target::new(
            0,
            [100.0, 100.0, 20.0, 20.0],
            [30.0, -15.0],
            MotionSpec::ConstantVelocity,
            BehaviorKind::Travelling,
        );
        run(&mut t, 30);
        assert_abs_diff_eq!(t.state[0], 130.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.state[1], 85.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.state[2], 20.0);
    }

    #[test]
    fn approach_grows_and_retreat_shrinks() {
        let mut a = Target::new(
            0,
            [0.0, 0.0, 20.0, 10.0],
            [0.0, 0.0],
            MotionSpec::Approach { rate: 30.0 },
            BehaviorKind::Attacking,
        );
        run(&mut a, 30);
        assert_abs_diff_eq!(a.state[2], 50.0, epsilon = 1e-6);
        // Aspect ratio kept
        assert_abs_diff_eq!(a.state[3] / a.state[2], 0.5, epsilon = 1e-6);

        let mut r = Target::new(
            1,
            [0.0, 0.0, 30.0, 30.0],
            [0.0, 0.0],
            MotionSpec::Retreat { rate: 30.0 },
            BehaviorKind::Retreating,
        );
        run(&mut r, 300);
        assert!(r.state[2] >= MIN_BOX_SIDE && r.state[2] < 6.0);
        assert!(r.state[6] <= 0.0);
    }

    #[test]
    fn hover_stays_near_start() {
        let mut t = Target::new(
            0,
            [200.0, 200.0, 30.0, 30.0],
            [0.0, 0.0],
            MotionSpec::Hover { jitter: 2.0 },
            BehaviorKind::Hovering,
        );
        run(&mut t, 300);
        assert!((t.state[0] - 200.0).abs() < 20.0);
        assert!((t.state[1] - 200.0).abs() < 20.0);
    }

    #[test]
    fn weave_heading_varies() {
        let spec = MotionSpec::Weave {
            heading: 0.0,
            speed: 100.0,
            amplitude: 1.2,
            period: 1.0,
        };
        let mut t = Target::new(0, [0.0, 0.0, 20.0, 20.0], [0.0, 0.0], spec, BehaviorKind::Evading);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut headings = Vec::new();
        for k in 0..30 {
            t.step(k as f64 * DT, DT, &mut rng);
            headings.push(t.state[5].atan2(t.state[4]));
            let speed = t.state[4].hypot(t.state[5]);
            assert_abs_diff_eq!(speed, 100.0, epsilon = 1e-9);
        }
        let max = headings.iter().cloned().fold(f64::MIN, f64::max);
        let min = headings.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max - min > 2.0, "heading swing {}", max - min);
    }

    #[test]
    fn segmented_switches_motion_and_label() {
        let spec = MotionSpec::Segmented {
            segments: vec![
                Segment {
                    start: 0.0,
                    behavior: BehaviorKind::Hovering,
                    motion: MotionSpec::Hover { jitter: 0.0 },
                },
                Segment {
                    start: 1.0,
                    behavior: BehaviorKind::Attacking,
                    motion: MotionSpec::Approach { rate: 20.0 },
                },
            ],
        };
        let mut t =
            Target::new(0, [0.0, 0.0, 20.0, 20.0], [0.0, 0.0], spec, BehaviorKind::Hovering);
        assert_eq!(t.behavior_at(0.5), BehaviorKind::Hovering);
        assert_eq!(t.behavior_at(1.5), BehaviorKind::Attacking);
        run(&mut t, 60);
        assert!(t.state[2] > 35.0, "box should grow in the second leg");
    }

    #[test]
    fn activity_window() {
        let t = Target::new(
            0,
            [0.0; 4],
            [0.0; 2],
            MotionSpec::ConstantVelocity,
            BehaviorKind::Travelling,
        )
        .active_between(Some(1.0), Some(2.0));
        assert!(!t.is_active(0.5));
        assert!(t.is_active(1.0));
        assert!(!t.is_active(2.0));
    }
}

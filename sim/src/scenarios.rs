//! Scenario definitions.
//!
//! Each scenario is a named set of targets seen by one camera. All scenarios
//! are deterministic given the same seed: target jitter and the camera draw
//! from separate ChaCha8 streams derived from it.

use crate::{
    camera_sim::{CameraParams, CameraSimulator},
    replay::{ReplayFrame, ReplayLog},
    target::{MotionSpec, Segment, Target},
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use tracker_core::classifier::BehaviorKind;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// 2 drones holding position
    Hover,
    /// 3 drones crossing the frame in straight lines
    Flyby,
    /// 1 drone closing in on the camera next to a hovering one
    Attack,
    /// 2 drones weaving hard
    Evasive,
    /// Every behavior at once, with late appearances, a drone leaving and a
    /// segmented cruise/weave/dive trajectory
    Mixed,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64, // seconds
    pub frame_dt: f64, // seconds between frames
    pub targets: Vec<Target>,
    pub camera: CameraParams,
}

const FRAME_DT: f64 = 1.0 / 30.0;

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Hover => Self::hover(seed),
            ScenarioKind::Flyby => Self::flyby(seed),
            ScenarioKind::Attack => Self::attack(seed),
            ScenarioKind::Evasive => Self::evasive(seed),
            ScenarioKind::Mixed => Self::mixed(seed),
        }
    }

    fn hover(seed: u64) -> Self {
        let targets = vec![
            hovering(0, [400.0, 300.0, 36.0, 24.0]),
            hovering(1, [900.0, 420.0, 28.0, 20.0]),
        ];
        Self::with_targets("hover", seed, 10.0, targets)
    }

    fn flyby(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
        let targets = (0..3)
            .map(|i| {
                let speed = 100.0 + rng.gen::<f64>() * 60.0;
                let y = 150.0 + 200.0 * i as f64;
                // Alternate direction so paths cross in the middle
                let (x, vx) = if i % 2 == 0 { (60.0, speed) } else { (1220.0, -speed) };
                Target::new(
                    i,
                    [x, y, 30.0, 20.0],
                    [vx, 8.0 * (1.0 - i as f64)],
                    MotionSpec::ConstantVelocity,
                    BehaviorKind::Travelling,
                )
            })
            .collect();
        Self::with_targets("flyby", seed, 6.0, targets)
    }

    fn attack(seed: u64) -> Self {
        let targets = vec![
            Target::new(
                0,
                [640.0, 360.0, 16.0, 12.0],
                [0.0, 0.0],
                MotionSpec::Approach { rate: 30.0 },
                BehaviorKind::Attacking,
            ),
            hovering(1, [200.0, 200.0, 30.0, 22.0]),
        ];
        Self::with_targets("attack", seed, 8.0, targets)
    }

    fn evasive(seed: u64) -> Self {
        let targets = vec![
            Target::new(
                0,
                [200.0, 250.0, 30.0, 22.0],
                [0.0, 0.0],
                weave(0.0, 120.0),
                BehaviorKind::Evading,
            ),
            Target::new(
                1,
                [1000.0, 500.0, 26.0, 20.0],
                [0.0, 0.0],
                weave(PI, 100.0),
                BehaviorKind::Evading,
            ),
        ];
        Self::with_targets("evasive", seed, 6.0, targets)
    }

    fn mixed(seed: u64) -> Self {
        let dive = MotionSpec::Segmented {
            segments: vec![
                Segment {
                    start: 0.0,
                    behavior: BehaviorKind::Travelling,
                    motion: MotionSpec::ConstantVelocity,
                },
                Segment {
                    start: 4.0,
                    behavior: BehaviorKind::Evading,
                    motion: weave(FRAC_PI_2, 60.0),
                },
                Segment {
                    start: 6.0,
                    behavior: BehaviorKind::Attacking,
                    motion: MotionSpec::Approach { rate: 30.0 },
                },
            ],
        };
        let targets = vec![
            hovering(0, [300.0, 200.0, 30.0, 24.0]),
            Target::new(
                1,
                [100.0, 600.0, 28.0, 20.0],
                [140.0, -10.0],
                MotionSpec::ConstantVelocity,
                BehaviorKind::Travelling,
            )
            .active_between(None, Some(7.0)),
            Target::new(
                2,
                [900.0, 300.0, 14.0, 10.0],
                [0.0, 0.0],
                MotionSpec::Approach { rate: 25.0 },
                BehaviorKind::Attacking,
            )
            .active_between(Some(1.5), None),
            Target::new(
                3,
                [1100.0, 150.0, 240.0, 180.0],
                [0.0, 0.0],
                MotionSpec::Retreat { rate: 20.0 },
                BehaviorKind::Retreating,
            ),
            Target::new(4, [150.0, 100.0, 26.0, 20.0], [90.0, 20.0], dive, BehaviorKind::Travelling)
                .active_between(Some(0.5), None),
        ];
        Self::with_targets("mixed", seed, 10.0, targets)
    }

    fn with_targets(name: &str, seed: u64, duration: f64, targets: Vec<Target>) -> Self {
        Scenario {
            name: name.into(),
            seed,
            duration,
            frame_dt: FRAME_DT,
            targets,
            camera: CameraParams::default(),
        }
    }

    pub fn n_frames(&self) -> u64 {
        (self.duration / self.frame_dt).round() as u64
    }

    /// Simulate every frame: detections as the camera sees them plus the
    /// ground truth of every target in the scene.
    pub fn record(&self) -> ReplayLog {
        let mut targets = self.targets.clone();
        let mut motion_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut camera = CameraSimulator::new(self.camera.clone(), self.seed.wrapping_add(0x5eed));

        let frames = (0..self.n_frames())
            .map(|index| {
                let time = index as f64 * self.frame_dt;
                let detections = camera.observe(&targets, time);
                let ground_truth = targets
                    .iter()
                    .filter(|t| t.is_active(time))
                    .map(|t| t.ground_truth(time))
                    .collect();
                for target in &mut targets {
                    target.step(time, self.frame_dt, &mut motion_rng);
                }
                ReplayFrame {
                    index,
                    time,
                    detections,
                    ground_truth,
                }
            })
            .collect();

        ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            frame_dt: self.frame_dt,
            frames,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hovering(id: u64, cxcywh: [f64; 4]) -> Target {
    Target::new(
        id,
        cxcywh,
        [0.0, 0.0],
        MotionSpec::Hover { jitter: 1.0 },
        BehaviorKind::Hovering,
    )
}

fn weave(heading: f64, speed: f64) -> MotionSpec {
    MotionSpec::Weave {
        heading,
        speed,
        amplitude: 1.2,
        period: 0.8,
    }
}

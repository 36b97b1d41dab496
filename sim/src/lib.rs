//! `sim` — Scenario simulator: drone trajectories in image space, noisy
//! detections, replay logs.

pub mod camera_sim;
pub mod replay;
pub mod scenarios;
pub mod target;

pub use camera_sim::{CameraParams, CameraSimulator};
pub use replay::{load_replay, save_replay, ReplayFrame, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use target::{MotionSpec, Segment, Target};

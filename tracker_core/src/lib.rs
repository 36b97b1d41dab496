//! `tracker_core` — Visual drone tracking and behavior assessment.
//!
//! # Module layout
//! - [`types`]        — Fundamental types (IDs, detections, kinematic snapshots)
//! - [`bbox`]         — Box representations and IoU
//! - [`kf`]           — Constant-velocity box Kalman filter
//! - [`track`]        — Track struct and bounded state history
//! - [`track_manager`]— Birth / update / eviction per frame
//! - [`association`]  — IoU cost graph, connected components, Hungarian solver
//! - [`features`]     — Kinematic features over a history window
//! - [`classifier`]   — Behavior registry and probability distribution
//! - [`threat`]       — Threat score in [0, 100]
//! - [`config`]       — JSON configuration surface
//! - [`pipeline`]     — Per-frame orchestrator
//! - [`metrics`]      — RMSE, ID-switch, precision/recall, behavior accuracy
//! - [`error`]        — Configuration and tracking errors

pub mod association;
pub mod bbox;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod kf;
pub mod metrics;
pub mod pipeline;
pub mod threat;
pub mod track;
pub mod track_manager;
pub mod types;

pub use association::{Associator, AssociatorConfig, IouAssociator};
pub use classifier::{BehaviorClassifier, BehaviorDistribution, BehaviorKind, ClassifierConfig};
pub use config::SystemConfig;
pub use error::{ConfigError, TrackerError};
pub use pipeline::{FrameReport, Pipeline, TrackReport};
pub use threat::{ThreatConfig, ThreatScorer};
pub use track::Track;
pub use track_manager::{Assignment, TrackManager, TrackManagerConfig};
pub use types::{Detection, KinematicState, TrackId};

//! Pipeline orchestrator: the full tracking cycle for one video frame.
//!
//! # Processing steps per frame
//! 1. Associate detections with live tracks (built-in IoU associator, or an
//!    association supplied by the caller)
//! 2. Track manager update: measured updates, births, coasting, eviction
//! 3. For every live track with enough history that is not stale: behavior
//!    distribution and threat score (tracks in parallel)
//! 4. Assemble the [`FrameReport`]

use crate::{
    association::{Associator, IouAssociator},
    bbox::BBox,
    classifier::{BehaviorClassifier, BehaviorDistribution},
    config::SystemConfig,
    error::{ConfigResult, TrackerResult},
    threat::ThreatScorer,
    track::Track,
    track_manager::{Assignment, TrackManager},
    types::{Detection, KinematicState, TrackId},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Per-track output of one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    pub track_id: TrackId,
    pub bbox_xyxy: BBox,
    pub time_since_last_seen: u32,
    /// Real observations inside the history window
    pub length: usize,
    pub state: KinematicState,
    /// `None` while the track is too short or stale to classify
    pub behavior: Option<BehaviorDistribution>,
    /// Present exactly when `behavior` is
    pub threat: Option<f64>,
}

/// Stage timings in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTimings {
    pub associate_us: u64,
    pub manage_us: u64,
    pub classify_us: u64,
    pub total_us: u64,
}

/// Everything produced by one pipeline step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Live tracks in id order
    pub tracks: Vec<TrackReport>,
    pub births: Vec<TrackId>,
    pub deletions: Vec<TrackId>,
    pub timings: FrameTimings,
}

impl FrameReport {
    pub fn get(&self, id: TrackId) -> Option<&TrackReport> {
        self.tracks.iter().find(|t| t.track_id == id)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Tracker, classifier and threat scorer behind one per-frame call.
pub struct Pipeline<A = IouAssociator> {
    config: SystemConfig,
    manager: TrackManager,
    classifier: BehaviorClassifier,
    scorer: ThreatScorer,
    associator: A,
    frame_index: u64,
}

impl Pipeline<IouAssociator> {
    /// Validate the whole configuration and build every stage.
    pub fn new(config: SystemConfig) -> ConfigResult<Self> {
        let associator = IouAssociator::new(config.associator.clone())?;
        Self::with_associator(config, associator)
    }
}

impl<A: Associator> Pipeline<A> {
    pub fn with_associator(config: SystemConfig, associator: A) -> ConfigResult<Self> {
        config.associator.validate()?;
        let manager = TrackManager::new(config.tracker.clone())?;
        let classifier = BehaviorClassifier::new(&config.classifier)?;
        let scorer = ThreatScorer::new(config.threat_score.clone())?;
        Ok(Self {
            config,
            manager,
            classifier,
            scorer,
            associator,
            frame_index: 0,
        })
    }

    /// Run one frame, associating detections with the configured associator.
    pub fn process_frame(&mut self, detections: &[Detection]) -> TrackerResult<FrameReport> {
        let start = Instant::now();

        // Step 1: association against the live tracks
        let live: Vec<&Track> = self.manager.tracks().collect();
        let assignments = self.associator.associate(detections, &live);
        let associate_us = start.elapsed().as_micros() as u64;

        self.run_frame(detections, &assignments, start, associate_us)
    }

    /// Run one frame with an association computed by the caller.
    /// `assignments[i]` belongs to `detections[i]`.
    pub fn process_associated(
        &mut self,
        detections: &[Detection],
        assignments: &[Assignment],
    ) -> TrackerResult<FrameReport> {
        self.run_frame(detections, assignments, Instant::now(), 0)
    }

    fn run_frame(
        &mut self,
        detections: &[Detection],
        assignments: &[Assignment],
        start: Instant,
        associate_us: u64,
    ) -> TrackerResult<FrameReport> {
        // Step 2: lifecycle
        let t0 = Instant::now();
        self.manager.update(detections, assignments)?;
        let manage_us = t0.elapsed().as_micros() as u64;

        // Step 3: behavior + threat, tracks are independent
        let t0 = Instant::now();
        let min_len = self.config.tracker.min_track_length;
        let stale_after = self.config.tracker.stale_after;
        let classifier = &self.classifier;
        let scorer = &self.scorer;
        let live: Vec<&Track> = self.manager.tracks().collect();
        let tracks: Vec<TrackReport> = live
            .par_iter()
            .map(|track| report_track(track, classifier, scorer, min_len, stale_after))
            .collect();
        let classify_us = t0.elapsed().as_micros() as u64;

        // Step 4: report
        let frame = self.manager.last_update();
        let report = FrameReport {
            frame_index: self.frame_index,
            tracks,
            births: frame.births.clone(),
            deletions: frame.deletions.clone(),
            timings: FrameTimings {
                associate_us,
                manage_us,
                classify_us,
                total_us: start.elapsed().as_micros() as u64,
            },
        };

        debug!(
            frame = report.frame_index,
            detections = detections.len(),
            tracks = report.tracks.len(),
            classified = report.tracks.iter().filter(|t| t.behavior.is_some()).count(),
            total_us = report.timings.total_us,
            "frame processed"
        );
        self.frame_index += 1;
        Ok(report)
    }

    /// Drop every track and restart frame numbering.
    pub fn reset(&mut self) {
        self.manager.clear();
        self.frame_index = 0;
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn tracks(&self) -> impl ExactSizeIterator<Item = &Track> + '_ {
        self.manager.tracks()
    }

    pub fn classifier(&self) -> &BehaviorClassifier {
        &self.classifier
    }

    pub fn threat_scorer(&self) -> &ThreatScorer {
        &self.scorer
    }

    /// Index the next processed frame will carry.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

fn report_track(
    track: &Track,
    classifier: &BehaviorClassifier,
    scorer: &ThreatScorer,
    min_len: usize,
    stale_after: u32,
) -> TrackReport {
    let length = track.len();
    let classify = length >= min_len && track.time_since_last_seen() <= stale_after;
    let behavior = classify.then(|| classifier.classify(track.state_history().iter()));
    let threat = behavior
        .as_ref()
        .map(|probs| scorer.score(track.state(), probs));

    TrackReport {
        track_id: track.id(),
        bbox_xyxy: track.bbox_xyxy(),
        time_since_last_seen: track.time_since_last_seen(),
        length,
        state: *track.state(),
        behavior,
        threat,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classifier::BehaviorKind, error::TrackerError, kf::EstimatorConfig};
    use approx::assert_abs_diff_eq;

    fn frame_config() -> SystemConfig {
        let mut cfg = SystemConfig::default();
        cfg.tracker.estimator = EstimatorConfig {
            dt: 1.0,
            ..Default::default()
        };
        cfg
    }

    fn box_at(x: f64, y: f64) -> Detection {
        Detection::new([x, y, x + 40.0, y + 40.0])
    }

    #[test]
    fn constant_velocity_target_travels() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        let mut last = None;
        for k in 0..30 {
            let report = pipeline
                .process_frame(&[box_at(100.0 + 5.0 * k as f64, 100.0)])
                .unwrap();
            assert_eq!(report.frame_index, k);
            if k == 0 {
                assert_eq!(report.births, vec![TrackId(0)]);
            } else {
                assert!(report.births.is_empty(), "frame {k} re-birthed the target");
            }
            last = Some(report);
        }

        let report = last.unwrap();
        assert_eq!(report.tracks.len(), 1);
        let t = &report.tracks[0];
        assert_eq!(t.track_id, TrackId(0));
        assert_abs_diff_eq!(t.state.speed_xy, 5.0, epsilon = 0.05);
        assert_abs_diff_eq!(t.state.direction_xy_radians, 0.0, epsilon = 1e-3);

        let probs = t.behavior.as_ref().expect("long, fresh track is classified");
        assert!(probs.get(BehaviorKind::Travelling) > probs.get(BehaviorKind::Evading));
        assert_abs_diff_eq!(probs.total(), 1.0, epsilon = 1e-9);
        let threat = t.threat.expect("threat accompanies behavior");
        assert!((0.0..=100.0).contains(&threat));
    }

    #[test]
    fn short_tracks_are_not_classified() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        for _ in 0..4 {
            let report = pipeline.process_frame(&[box_at(0.0, 0.0)]).unwrap();
            assert!(report.tracks[0].behavior.is_none());
            assert!(report.tracks[0].threat.is_none());
        }
        let report = pipeline.process_frame(&[box_at(0.0, 0.0)]).unwrap();
        assert_eq!(report.tracks[0].length, 5);
        assert!(report.tracks[0].behavior.is_some());
    }

    #[test]
    fn stale_tracks_are_reported_unclassified() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        for _ in 0..6 {
            pipeline.process_frame(&[box_at(0.0, 0.0)]).unwrap();
        }
        // First miss: within stale_after
        let report = pipeline.process_frame(&[]).unwrap();
        assert_eq!(report.tracks[0].time_since_last_seen, 1);
        assert!(report.tracks[0].behavior.is_some());

        // Second miss: stale but still alive
        let report = pipeline.process_frame(&[]).unwrap();
        assert_eq!(report.tracks.len(), 1);
        assert_eq!(report.tracks[0].time_since_last_seen, 2);
        assert!(report.tracks[0].behavior.is_none());
    }

    #[test]
    fn track_evicted_after_max_age_misses() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        pipeline.process_frame(&[box_at(0.0, 0.0)]).unwrap();
        for _ in 0..5 {
            let report = pipeline.process_frame(&[]).unwrap();
            assert_eq!(report.tracks.len(), 1);
        }
        let report = pipeline.process_frame(&[]).unwrap();
        assert!(report.tracks.is_empty());
        assert_eq!(report.deletions, vec![TrackId(0)]);
    }

    #[test]
    fn external_association_drives_identities() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        let dets = [box_at(0.0, 0.0), box_at(300.0, 0.0)];
        let ids = [
            Assignment::Existing(TrackId(10)),
            Assignment::Existing(TrackId(20)),
        ];
        let report = pipeline.process_associated(&dets, &ids).unwrap();
        let got: Vec<_> = report.tracks.iter().map(|t| t.track_id).collect();
        assert_eq!(got, vec![TrackId(10), TrackId(20)]);

        let err = pipeline.process_associated(&dets, &ids[..1]);
        assert!(matches!(err, Err(TrackerError::AssociationMismatch { .. })));
    }

    #[test]
    fn two_targets_keep_identities() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        for k in 0..10 {
            let x = 3.0 * k as f64;
            // Detector order flips every frame
            let dets = if k % 2 == 0 {
                [box_at(x, 0.0), box_at(400.0 - x, 300.0)]
            } else {
                [box_at(400.0 - x, 300.0), box_at(x, 0.0)]
            };
            let report = pipeline.process_frame(&dets).unwrap();
            assert_eq!(report.tracks.len(), 2);
            let a = report.get(TrackId(0)).unwrap();
            assert!(a.bbox_xyxy[1] < 150.0, "T0 stays on the upper target");
        }
    }

    #[test]
    fn reset_clears_tracks() {
        let mut pipeline = Pipeline::new(frame_config()).unwrap();
        pipeline.process_frame(&[box_at(0.0, 0.0)]).unwrap();
        pipeline.reset();
        assert_eq!(pipeline.tracks().len(), 0);
        assert_eq!(pipeline.frame_index(), 0);
    }

    #[test]
    fn invalid_config_fails_construction() {
        let mut cfg = SystemConfig::default();
        cfg.classifier.behaviors.clear();
        assert!(Pipeline::new(cfg).is_err());
    }
}

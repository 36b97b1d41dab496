//! Track lifecycle management: birth, per-frame update, eviction.
//!
//! # Per-frame protocol
//! 1. Detections assigned to a live identity update that track.
//! 2. Detections with an unknown identity (or [`Assignment::New`]) create a
//!    track which is immediately updated with the detection.
//! 3. Live tracks without a detection this frame are predicted only.
//! 4. Tracks with `time_since_last_seen > max_age` are evicted.
//!
//! Step 4 runs after 1–3 have finished, over a separately collected list of
//! ids, so a track is never evicted and recreated within one frame.

use crate::{
    error::{ConfigError, ConfigResult, TrackerError, TrackerResult},
    kf::EstimatorConfig,
    track::Track,
    types::{Detection, TrackId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Configuration for track management policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackManagerConfig {
    /// Missed frames tolerated before eviction (evict when exceeded)
    pub max_age: u32,
    /// Per-track Kalman filter settings
    pub estimator: EstimatorConfig,
    /// Capacity of each track's state history window
    pub state_history_max_length: usize,
    /// Real observations (inside the window) required before classification
    pub min_track_length: usize,
    /// Tracks unseen for more than this many frames are reported but not
    /// classified
    pub stale_after: u32,
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            max_age: 5,
            estimator: EstimatorConfig::default(),
            state_history_max_length: 15,
            min_track_length: 5,
            stale_after: 1,
        }
    }
}

impl TrackManagerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.estimator.validate()?;
        if self.state_history_max_length == 0 {
            return Err(ConfigError::invalid(
                "tracker",
                "state_history_max_length",
                0.0,
                "must be at least 1",
            ));
        }
        if self.min_track_length == 0 || self.min_track_length > self.state_history_max_length {
            return Err(ConfigError::invalid(
                "tracker",
                "min_track_length",
                self.min_track_length as f64,
                "must be between 1 and state_history_max_length",
            ));
        }
        Ok(())
    }
}

/// Association result for one detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assignment {
    /// Detection belongs to this identity. An identity the manager does not
    /// know yet starts a new track under that id.
    Existing(TrackId),
    /// Detection starts a new track with a manager-allocated id.
    New,
}

/// Summary of the last processed frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameUpdate {
    pub births: Vec<TrackId>,
    pub deletions: Vec<TrackId>,
    /// Tracks updated with a measurement (including births)
    pub measured: usize,
    /// Tracks advanced without a measurement
    pub coasted: usize,
}

/// Owns the live tracks, keyed by identity.
#[derive(Clone, Debug)]
pub struct TrackManager {
    config: TrackManagerConfig,
    tracks: BTreeMap<TrackId, Track>,
    next_id: u64,
    last_update: FrameUpdate,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 0,
            last_update: FrameUpdate::default(),
        })
    }

    pub fn config(&self) -> &TrackManagerConfig {
        &self.config
    }

    /// Apply one frame of detections. `assignments[i]` is the association
    /// result for `detections[i]`. Returns the live tracks in id order.
    ///
    /// Precondition violations are reported before any track is touched.
    pub fn update(
        &mut self,
        detections: &[Detection],
        assignments: &[Assignment],
    ) -> TrackerResult<Vec<&Track>> {
        if detections.len() != assignments.len() {
            return Err(TrackerError::AssociationMismatch {
                detections: detections.len(),
                assignments: assignments.len(),
            });
        }

        // Resolve identities up front so a bad frame leaves state untouched.
        let mut claimed: HashSet<TrackId> = HashSet::with_capacity(assignments.len());
        for a in assignments {
            if let Assignment::Existing(id) = a {
                if !claimed.insert(*id) {
                    return Err(TrackerError::DuplicateAssignment { track_id: *id });
                }
            }
        }
        let ids: Vec<TrackId> = assignments
            .iter()
            .map(|a| match a {
                Assignment::Existing(id) => *id,
                Assignment::New => {
                    let id = self.allocate_id(&claimed);
                    claimed.insert(id);
                    id
                }
            })
            .collect();

        let mut frame = FrameUpdate::default();

        // Steps 1–2: measured updates and births
        for (det, &id) in detections.iter().zip(&ids) {
            let track = self.tracks.entry(id).or_insert_with(|| {
                info!(track = %id, "new track");
                frame.births.push(id);
                Track::new(
                    id,
                    det.clone(),
                    &self.config.estimator,
                    self.config.state_history_max_length,
                )
            });
            track.update(Some(det.clone()));
            frame.measured += 1;
        }

        // Step 3: predict-only for everything not seen this frame
        for (id, track) in self.tracks.iter_mut() {
            if !claimed.contains(id) {
                track.update(None);
                frame.coasted += 1;
            }
        }

        // Step 4: evict, two-phase
        let max_age = self.config.max_age;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| t.time_since_last_seen() > max_age)
            .map(|t| t.id())
            .collect();
        for id in &stale {
            if let Some(track) = self.tracks.remove(id) {
                info!(
                    track = %id,
                    age = track.age(),
                    hits = track.hits(),
                    "removing track"
                );
            }
        }
        frame.deletions = stale;

        debug!(
            live = self.tracks.len(),
            births = frame.births.len(),
            deletions = frame.deletions.len(),
            measured = frame.measured,
            coasted = frame.coasted,
            "track manager frame"
        );
        self.last_update = frame;
        Ok(self.tracks.values().collect())
    }

    /// Next id not used by a live track nor claimed this frame.
    fn allocate_id(&mut self, claimed: &HashSet<TrackId>) -> TrackId {
        loop {
            let id = TrackId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.tracks.contains_key(&id) && !claimed.contains(&id) {
                return id;
            }
        }
    }

    /// Live tracks in id order.
    pub fn tracks(&self) -> impl ExactSizeIterator<Item = &Track> + '_ {
        self.tracks.values()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Births and evictions of the most recent frame.
    pub fn last_update(&self) -> &FrameUpdate {
        &self.last_update
    }

    /// Drop every track. Allocated ids keep counting up.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.last_update = FrameUpdate::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f64) -> Detection {
        Detection::new([x1, 100.0, x1 + 40.0, 140.0])
    }

    fn manager(max_age: u32) -> TrackManager {
        TrackManager::new(TrackManagerConfig {
            max_age,
            ..Default::default()
        })
        .unwrap()
    }

    fn ids(mgr: &TrackManager) -> Vec<u64> {
        mgr.tracks().map(|t| t.id().0).collect()
    }

    #[test]
    fn new_detection_births_track() {
        let mut mgr = manager(5);
        let live = mgr.update(&[det(0.0)], &[Assignment::New]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].time_since_last_seen(), 0);
        assert_eq!(live[0].len(), 1);
        assert_eq!(mgr.last_update().births, vec![TrackId(0)]);
    }

    #[test]
    fn external_identity_is_used_verbatim() {
        let mut mgr = manager(5);
        mgr.update(&[det(0.0)], &[Assignment::Existing(TrackId(42))])
            .unwrap();
        assert!(mgr.get(TrackId(42)).is_some());

        // Matched again: updated, not re-born
        mgr.update(&[det(2.0)], &[Assignment::Existing(TrackId(42))])
            .unwrap();
        assert!(mgr.last_update().births.is_empty());
        assert_eq!(mgr.get(TrackId(42)).map(|t| t.hits()), Some(2));
    }

    #[test]
    fn allocated_ids_skip_live_identities() {
        let mut mgr = manager(5);
        mgr.update(&[det(0.0)], &[Assignment::Existing(TrackId(0))])
            .unwrap();
        mgr.update(
            &[det(0.0), det(300.0), det(600.0)],
            &[Assignment::Existing(TrackId(0)), Assignment::New, Assignment::Existing(TrackId(1))],
        )
        .unwrap();
        assert_eq!(ids(&mgr), vec![0, 1, 2]);
    }

    #[test]
    fn unmatched_tracks_coast() {
        let mut mgr = manager(5);
        mgr.update(&[det(0.0), det(300.0)], &[Assignment::New, Assignment::New])
            .unwrap();
        mgr.update(&[det(1.0)], &[Assignment::Existing(TrackId(0))])
            .unwrap();
        assert_eq!(mgr.get(TrackId(0)).map(|t| t.time_since_last_seen()), Some(0));
        assert_eq!(mgr.get(TrackId(1)).map(|t| t.time_since_last_seen()), Some(1));
        assert_eq!(mgr.last_update().coasted, 1);
    }

    #[test]
    fn eviction_boundary_is_strict() {
        let max_age = 3;
        let mut mgr = manager(max_age);
        mgr.update(&[det(0.0)], &[Assignment::New]).unwrap(); // frame 0

        // Frames 1..=max_age: still present
        for frame in 1..=max_age {
            let live = mgr.update(&[], &[]).unwrap();
            assert_eq!(live.len(), 1, "present after {frame} missed frames");
        }
        // One more miss exceeds max_age
        let live = mgr.update(&[], &[]).unwrap();
        assert!(live.is_empty());
        assert_eq!(mgr.last_update().deletions, vec![TrackId(0)]);
    }

    #[test]
    fn evicted_identity_may_be_reused() {
        let mut mgr = manager(0);
        mgr.update(&[det(0.0)], &[Assignment::Existing(TrackId(9))])
            .unwrap();
        mgr.update(&[], &[]).unwrap();
        assert!(mgr.is_empty());

        mgr.update(&[det(50.0)], &[Assignment::Existing(TrackId(9))])
            .unwrap();
        let t = mgr.get(TrackId(9)).unwrap();
        assert_eq!(t.hits(), 1, "reused id starts a fresh track");
        assert_eq!(mgr.last_update().births, vec![TrackId(9)]);
    }

    #[test]
    fn mismatched_association_rejected() {
        let mut mgr = manager(5);
        let err = mgr.update(&[det(0.0), det(1.0)], &[Assignment::New]);
        assert!(matches!(
            err,
            Err(TrackerError::AssociationMismatch {
                detections: 2,
                assignments: 1
            })
        ));
        assert!(mgr.is_empty());
    }

    #[test]
    fn duplicate_assignment_rejected_without_side_effects() {
        let mut mgr = manager(5);
        mgr.update(&[det(0.0)], &[Assignment::New]).unwrap();
        let err = mgr.update(
            &[det(0.0), det(1.0)],
            &[Assignment::Existing(TrackId(0)), Assignment::Existing(TrackId(0))],
        );
        assert!(matches!(
            err,
            Err(TrackerError::DuplicateAssignment { track_id: TrackId(0) })
        ));
        assert_eq!(mgr.get(TrackId(0)).map(|t| t.age()), Some(1));
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = TrackManagerConfig {
            min_track_length: 20,
            state_history_max_length: 15,
            ..Default::default()
        };
        assert!(TrackManager::new(cfg).is_err());
    }
}

//! Track: estimator, bounded state history, age bookkeeping.

use crate::{
    bbox::BBox,
    kf::{BoxKalmanFilter, EstimatorConfig},
    types::{Detection, KinematicState, TrackId},
};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Bounded history
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct HistoryEntry {
    state: KinematicState,
    /// True when this snapshot followed a real measurement
    measured: bool,
}

/// Fixed-capacity FIFO of state snapshots (most recent last).
/// Pushing at capacity evicts the oldest entry.
#[derive(Clone, Debug)]
pub struct StateHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl StateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, state: KinematicState, measured: bool) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { state, measured });
    }

    /// Number of stored snapshots (measured or predicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored snapshots that followed a real measurement.
    pub fn measured_len(&self) -> usize {
        self.entries.iter().filter(|e| e.measured).count()
    }

    /// Snapshots, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &KinematicState> + Clone + '_ {
        self.entries.iter().map(|e| &e.state)
    }

    pub fn latest(&self) -> Option<&KinematicState> {
        self.entries.back().map(|e| &e.state)
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A single tracked object.
///
/// The estimator is created with the track and never replaced. Deletion
/// policy lives in [`crate::track_manager::TrackManager`].
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    estimator: BoxKalmanFilter,
    /// Frames since a measurement was applied (0 right after one)
    time_since_last_seen: u32,
    /// Frames since creation
    age: u32,
    /// Measurements applied over the whole lifetime
    hits: u32,
    history: StateHistory,
    state: KinematicState,
    detection: Detection,
}

impl Track {
    /// Create a track for a newly seen identity. The caller applies the
    /// first measurement with [`Track::update`].
    pub fn new(
        id: TrackId,
        detection: Detection,
        estimator: &EstimatorConfig,
        history_len: usize,
    ) -> Self {
        let estimator = BoxKalmanFilter::new(estimator);
        let state = estimator.state();
        Self {
            id,
            estimator,
            time_since_last_seen: 0,
            age: 0,
            hits: 0,
            history: StateHistory::new(history_len),
            state,
            detection,
        }
    }

    /// Advance the track by one frame, with or without a measurement.
    pub fn update(&mut self, detection: Option<Detection>) {
        self.estimator.predict();
        self.age = self.age.saturating_add(1);

        let measured = detection.is_some();
        self.state = match detection {
            Some(det) => {
                let z = det.measurement();
                self.detection = det;
                self.time_since_last_seen = 0;
                self.hits = self.hits.saturating_add(1);
                self.estimator.update(Some(&z))
            }
            None => {
                self.time_since_last_seen = self.time_since_last_seen.saturating_add(1);
                self.estimator.update(None)
            }
        };
        self.history.push(self.state, measured);
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn time_since_last_seen(&self) -> u32 {
        self.time_since_last_seen
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Current kinematic snapshot.
    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn state_history(&self) -> &StateHistory {
        &self.history
    }

    /// Last applied detection.
    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    pub fn estimator(&self) -> &BoxKalmanFilter {
        &self.estimator
    }

    /// Box derived from the current estimate.
    pub fn bbox_xyxy(&self) -> BBox {
        self.estimator.bbox_xyxy()
    }

    /// Where the box is expected next frame.
    pub fn predicted_bbox_xyxy(&self) -> BBox {
        self.estimator.predicted_bbox_xyxy()
    }

    /// (vx, vy) for drawing a velocity arrow
    pub fn velocity_xy(&self) -> (f64, f64) {
        (self.state.vx, self.state.vy)
    }

    /// Width rate, used as the approach/retreat proxy
    pub fn velocity_z(&self) -> f64 {
        self.state.vw
    }

    pub fn direction_xy_radians(&self) -> f64 {
        self.state.direction_xy_radians
    }

    /// Real observations inside the history window. Gate classification on
    /// this, not on the raw history length.
    pub fn len(&self) -> usize {
        self.history.measured_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Tracking results shared between the tracking loop and the control loop.
//!
//! The tracking loop is the only writer. Each detection batch produces a
//! complete [`TrackingSnapshot`] that replaces the previous one in a
//! [`SnapshotCell`] as a single pointer swap; readers clone an `Arc` to
//! whatever snapshot is current and never see a partially built one.

use crate::{
    geometry::Position3D,
    tracker::{estimate_position, select_primary, Track},
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

/// A track annotated with what the gaze side needs
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    pub track: Track,
    /// Estimated position in the camera frame
    pub position: Position3D,
    /// Selected as the gaze target for this snapshot
    pub is_primary: bool,
}

impl TrackedTarget {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.track.id
    }
}

/// Complete tracker output for one detection batch
#[derive(Debug, Clone)]
pub struct TrackingSnapshot {
    /// Increments with every published snapshot; 0 is the initial empty one
    pub sequence: u64,
    /// All live tracks in ascending id order
    pub targets: Vec<TrackedTarget>,
    /// Id of the primary target, if any
    pub primary: Option<u64>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Time the underlying batch was processed
    pub timestamp: Instant,
}

impl TrackingSnapshot {
    /// Snapshot with no tracks
    #[must_use]
    pub fn empty(frame_width: u32, frame_height: u32, timestamp: Instant) -> Self {
        Self {
            sequence: 0,
            targets: Vec::new(),
            primary: None,
            frame_width,
            frame_height,
            timestamp,
        }
    }

    /// Build the snapshot for a set of surviving tracks.
    ///
    /// The primary is chosen among tracks matched in this batch; tracks kept
    /// alive only by the timeout compete when nothing was matched.
    #[must_use]
    pub fn assemble(
        sequence: u64,
        tracks: Vec<Track>,
        frame_width: u32,
        frame_height: u32,
        horizontal_fov_deg: f64,
        timestamp: Instant,
    ) -> Self {
        let matched: Vec<Track> = tracks.iter().filter(|t| t.last_seen >= timestamp).cloned().collect();
        let candidates = if matched.is_empty() { &tracks } else { &matched };
        let primary = select_primary(candidates, frame_width, frame_height);
        let targets = tracks
            .into_iter()
            .map(|track| TrackedTarget {
                position: estimate_position(&track, frame_width, frame_height, horizontal_fov_deg),
                is_primary: Some(track.id) == primary,
                track,
            })
            .collect();

        Self {
            sequence,
            targets,
            primary,
            frame_width,
            frame_height,
            timestamp,
        }
    }

    #[must_use]
    pub fn primary_target(&self) -> Option<&TrackedTarget> {
        let id = self.primary?;
        self.targets.iter().find(|t| t.id() == id)
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.targets.len()
    }

    /// `(id, tracking_confidence)` for each live track
    #[must_use]
    pub fn confidences(&self) -> Vec<(u64, f64)> {
        self.targets
            .iter()
            .map(|t| (t.id(), t.track.tracking_confidence))
            .collect()
    }
}

/// Single-writer, many-reader slot holding the latest snapshot
#[derive(Debug)]
pub struct SnapshotCell {
    slot: RwLock<Arc<TrackingSnapshot>>,
}

impl SnapshotCell {
    #[must_use]
    pub fn new(initial: TrackingSnapshot) -> Self {
        Self {
            slot: RwLock::new(Arc::new(initial)),
        }
    }

    /// Replace the current snapshot as a whole
    pub fn publish(&self, snapshot: TrackingSnapshot) {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.slot.write(), next);
        // Dropped after the write guard is released
        drop(previous);
    }

    /// The most recently published snapshot
    #[must_use]
    pub fn latest(&self) -> Arc<TrackingSnapshot> {
        Arc::clone(&self.slot.read())
    }

    /// Sequence number of the current snapshot
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.slot.read().sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::tracker::TargetTracker;
    use std::time::Duration;

    #[test]
    fn test_assemble_marks_primary() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        let tracks = tracker.update(
            &[
                Detection::new(295.0, 215.0, 50.0, 50.0, 0.9, t0),
                Detection::new(0.0, 0.0, 20.0, 20.0, 0.6, t0),
            ],
            t0,
        );
        let snapshot = TrackingSnapshot::assemble(1, tracks, 640, 480, 60.0, t0);
        assert_eq!(snapshot.primary, Some(1));
        assert_eq!(snapshot.targets.iter().filter(|t| t.is_primary).count(), 1);
        assert_eq!(snapshot.primary_target().map(TrackedTarget::id), Some(1));
        assert_eq!(snapshot.confidences().len(), 2);
    }

    #[test]
    fn test_primary_prefers_matched_tracks() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        let corner = Detection::new(20.0, 20.0, 40.0, 40.0, 0.9, t0);
        let tracks = tracker.update(&[Detection::new(260.0, 180.0, 120.0, 120.0, 0.9, t0), corner.clone()], t0);
        assert_eq!(TrackingSnapshot::assemble(1, tracks, 640, 480, 60.0, t0).primary, Some(1));

        // The big central face left; its track lingers but the visible face wins
        let t1 = t0 + Duration::from_millis(500);
        let tracks = tracker.update(&[corner], t1);
        assert_eq!(tracks.len(), 2);
        let snapshot = TrackingSnapshot::assemble(2, tracks, 640, 480, 60.0, t1);
        assert_eq!(snapshot.primary, Some(2));
        assert_eq!(snapshot.targets.iter().filter(|t| t.is_primary).count(), 1);

        // Nothing matched: lingering tracks still compete
        let t2 = t1 + Duration::from_millis(100);
        let tracks = tracker.update(&[], t2);
        assert_eq!(TrackingSnapshot::assemble(3, tracks, 640, 480, 60.0, t2).primary, Some(1));
    }

    #[test]
    fn test_assemble_empty() {
        let snapshot = TrackingSnapshot::assemble(3, Vec::new(), 640, 480, 60.0, Instant::now());
        assert!(snapshot.primary.is_none());
        assert!(snapshot.primary_target().is_none());
        assert_eq!(snapshot.track_count(), 0);
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let t0 = Instant::now();
        let cell = SnapshotCell::new(TrackingSnapshot::empty(640, 480, t0));
        let before = cell.latest();
        let mut next = TrackingSnapshot::empty(320, 240, t0);
        next.sequence = 1;
        cell.publish(next);

        // A reader holding the old snapshot keeps a consistent view
        assert_eq!(before.sequence, 0);
        assert_eq!(before.frame_width, 640);
        let after = cell.latest();
        assert_eq!(after.sequence, 1);
        assert_eq!(after.frame_width, 320);
        assert_eq!(cell.sequence(), 1);
    }
}

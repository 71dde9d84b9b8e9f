//! Tracking loop: detection batches in, tracking snapshots out.

use crate::{
    config::Config,
    constants::DETECTION_POLL_INTERVAL_MS,
    detection::{filter_detections, DetectionBatch},
    scheduler::StopHandle,
    snapshot::{SnapshotCell, TrackingSnapshot},
    tracker::TargetTracker,
};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters reported when the tracking loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingStats {
    /// Batches consumed
    pub frames_processed: u64,
    /// Batches that contained at least one usable detection
    pub faces_detected: u64,
    /// Snapshots published
    pub snapshots_published: u64,
}

/// Owns the tracker and is the only writer of the snapshot cell
pub struct TrackingLoop {
    tracker: TargetTracker,
    cell: Arc<SnapshotCell>,
    confidence_threshold: f64,
    horizontal_fov_deg: f64,
    sequence: u64,
    stats: TrackingStats,
}

impl TrackingLoop {
    #[must_use]
    pub fn new(tracker: TargetTracker, cell: Arc<SnapshotCell>, confidence_threshold: f64, horizontal_fov_deg: f64) -> Self {
        let sequence = cell.sequence();
        Self {
            tracker,
            cell,
            confidence_threshold,
            horizontal_fov_deg,
            sequence,
            stats: TrackingStats::default(),
        }
    }

    /// Build a tracking loop from configuration
    #[must_use]
    pub fn from_config(config: &Config, cell: Arc<SnapshotCell>) -> Self {
        let tracker = TargetTracker::new(config.tracker.max_match_distance, config.tracker.track_timeout());
        Self::new(
            tracker,
            cell,
            config.tracker.confidence_threshold,
            config.camera.horizontal_fov_deg,
        )
    }

    /// Run one batch through the tracker and publish the resulting snapshot
    pub fn process_batch(&mut self, batch: DetectionBatch, now: Instant) -> Arc<TrackingSnapshot> {
        let detections = filter_detections(batch.detections, self.confidence_threshold);
        self.stats.frames_processed += 1;
        if !detections.is_empty() {
            self.stats.faces_detected += 1;
        }

        let tracks = self.tracker.update(&detections, now);
        self.sequence += 1;
        let snapshot = TrackingSnapshot::assemble(
            self.sequence,
            tracks,
            batch.frame_width,
            batch.frame_height,
            self.horizontal_fov_deg,
            now,
        );

        if let Some(primary) = snapshot.primary_target() {
            debug!(
                "Snapshot {}: {} track(s), primary {} at ({:.2}, {:.2}, {:.2}) m",
                snapshot.sequence,
                snapshot.track_count(),
                primary.id(),
                primary.position.x,
                primary.position.y,
                primary.position.z
            );
        } else {
            debug!("Snapshot {}: {} track(s), no primary", snapshot.sequence, snapshot.track_count());
        }

        self.cell.publish(snapshot);
        self.stats.snapshots_published += 1;
        self.cell.latest()
    }

    /// Consume batches until the stop flag is raised or the producer goes away
    pub fn run(&mut self, detections: &Receiver<DetectionBatch>, stop: &StopHandle) -> TrackingStats {
        info!("Tracking loop started");
        let poll = Duration::from_millis(DETECTION_POLL_INTERVAL_MS);

        while !stop.is_stopped() {
            match detections.recv_timeout(poll) {
                Ok(batch) => {
                    self.process_batch(batch, Instant::now());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Detection source closed");
                    break;
                }
            }
        }

        info!(
            "Tracking loop stopped: {} frames, {} with faces, {} tracks live",
            self.stats.frames_processed,
            self.stats.faces_detected,
            self.tracker.track_count()
        );
        self.stats.clone()
    }

    #[must_use]
    pub const fn stats(&self) -> &TrackingStats {
        &self.stats
    }
}

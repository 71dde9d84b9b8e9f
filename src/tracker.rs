//! Centroid-based multi-face tracking with persistent IDs.
//!
//! Detections are matched to existing tracks by greedy nearest-centroid
//! assignment: the globally closest (track, detection) pair is bound first,
//! its row and column are removed, and the process repeats until the closest
//! remaining pair is farther than `max_match_distance`. Faces are few per
//! frame, so this small O(n·m) pass stands in for optimal assignment.
//!
//! The module also provides the two per-track estimates the gaze side needs:
//! a monocular 3D position from box width ([`estimate_position`]) and the
//! choice of a single primary target ([`select_primary`]).

use crate::{
    constants::{
        CENTRALITY_WEIGHT, CONFIDENCE_WEIGHT, MAX_DEPTH_M, MIN_DEPTH_M, REFERENCE_HEAD_WIDTH_M, SIZE_WEIGHT,
        TRACKING_CONFIDENCE_STEP,
    },
    detection::Detection,
    geometry::{PixelPoint, Position3D},
};
use log::debug;
use nalgebra::distance;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A face with a persistent identity
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Unique for the process lifetime, never reused
    pub id: u64,
    /// Most recent matched detection
    pub last_detection: Detection,
    /// Center of `last_detection` in pixels
    pub centroid: PixelPoint,
    /// Time of the last successful match
    pub last_seen: Instant,
    /// Stability of the track (0.0-1.0)
    pub tracking_confidence: f64,
    /// Number of successful matches, including the one that created it
    pub frames_tracked: u32,
}

impl Track {
    fn new(id: u64, detection: Detection, now: Instant) -> Self {
        Self {
            id,
            centroid: detection.centroid(),
            tracking_confidence: detection.confidence,
            last_detection: detection,
            last_seen: now,
            frames_tracked: 1,
        }
    }

    fn absorb(&mut self, detection: Detection, now: Instant) {
        self.centroid = detection.centroid();
        self.last_detection = detection;
        self.last_seen = self.last_seen.max(now);
        self.frames_tracked += 1;
        self.tracking_confidence = (self.tracking_confidence + TRACKING_CONFIDENCE_STEP).min(1.0);
    }

    /// Time since the last match
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Multi-face tracker keeping identities across frames
#[derive(Debug, Clone)]
pub struct TargetTracker {
    max_match_distance: f64,
    track_timeout: Duration,
    next_id: u64,
    tracks: BTreeMap<u64, Track>,
}

impl TargetTracker {
    /// Create a tracker
    ///
    /// # Panics
    ///
    /// Panics if `max_match_distance` is negative or not finite
    #[must_use]
    pub fn new(max_match_distance: f64, track_timeout: Duration) -> Self {
        assert!(
            max_match_distance.is_finite() && max_match_distance >= 0.0,
            "Match distance must be finite and non-negative"
        );
        Self {
            max_match_distance,
            track_timeout,
            next_id: 1,
            tracks: BTreeMap::new(),
        }
    }

    /// Feed one frame of detections and return all surviving tracks
    pub fn update(&mut self, detections: &[Detection], now: Instant) -> Vec<Track> {
        let centroids: Vec<PixelPoint> = detections.iter().map(Detection::centroid).collect();
        let mut detection_matched = vec![false; detections.len()];

        if !self.tracks.is_empty() && !detections.is_empty() {
            let track_ids: Vec<u64> = self.tracks.keys().copied().collect();

            // Rows follow ascending track id, so equal distances favour the older track
            let mut distances: Vec<Vec<f64>> = track_ids
                .iter()
                .map(|id| {
                    let track_centroid = self.tracks[id].centroid;
                    centroids.iter().map(|c| distance(&track_centroid, c)).collect()
                })
                .collect();

            while let Some((row, col, dist)) = Self::closest_pair(&distances) {
                if dist > self.max_match_distance {
                    break;
                }

                let track_id = track_ids[row];
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.absorb(detections[col].clone(), now);
                    debug!(
                        "Track {} matched at ({:.1}, {:.1}), distance {:.1}px, confidence {:.2}",
                        track_id, track.centroid.x, track.centroid.y, dist, track.tracking_confidence
                    );
                }
                detection_matched[col] = true;

                distances[row].iter_mut().for_each(|d| *d = f64::INFINITY);
                distances.iter_mut().for_each(|r| r[col] = f64::INFINITY);
            }
        }

        for (detection, _) in detections
            .iter()
            .zip(&detection_matched)
            .filter(|(_, matched)| !**matched)
        {
            let id = self.next_id;
            self.next_id += 1;
            debug_assert!(!self.tracks.contains_key(&id), "duplicate track id {id}");
            self.tracks.insert(id, Track::new(id, detection.clone(), now));
            debug!("New track created: ID {id}");
        }

        let timeout = self.track_timeout;
        self.tracks.retain(|id, track| {
            let keep = track.age(now) <= timeout;
            if !keep {
                debug!("Track expired: ID {id}");
            }
            keep
        });

        debug_assert!(self
            .tracks
            .values()
            .all(|t| (0.0..=1.0).contains(&t.tracking_confidence)));

        self.tracks.values().cloned().collect()
    }

    /// Smallest finite entry of the matrix, first in row-major order on ties
    fn closest_pair(distances: &[Vec<f64>]) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (row, values) in distances.iter().enumerate() {
            for (col, &d) in values.iter().enumerate() {
                if d.is_finite() && best.map_or(true, |(_, _, b)| d < b) {
                    best = Some((row, col, d));
                }
            }
        }
        best
    }

    /// Drop every track; ids continue from where they were
    pub fn reset(&mut self) {
        self.tracks.clear();
        log::info!("Face tracker reset");
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Active tracks in ascending id order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }
}

/// Estimate a track's 3D position from its box width with a pinhole model.
///
/// The box width stands in for depth against a 0.2 m reference head. Depth is
/// clamped to `[0.3, 5.0]` m; a box with no usable width reads as the far
/// bound. The result is approximate by construction.
#[must_use]
pub fn estimate_position(track: &Track, frame_width: u32, frame_height: u32, horizontal_fov_deg: f64) -> Position3D {
    let half_fov = (horizontal_fov_deg / 2.0).to_radians();
    let focal_length_px = f64::from(frame_width) / (2.0 * half_fov.tan());
    let box_width = track.last_detection.width;

    if !(focal_length_px.is_finite() && focal_length_px > 0.0) {
        // No usable camera geometry: straight ahead at the far bound
        return Position3D::new(0.0, 0.0, MAX_DEPTH_M);
    }

    let depth = if box_width.is_finite() && box_width > 0.0 {
        (focal_length_px * REFERENCE_HEAD_WIDTH_M / box_width).clamp(MIN_DEPTH_M, MAX_DEPTH_M)
    } else {
        MAX_DEPTH_M
    };

    let x = (track.centroid.x - f64::from(frame_width) / 2.0) / focal_length_px * depth;
    let y = -(track.centroid.y - f64::from(frame_height) / 2.0) / focal_length_px * depth;

    Position3D::new(x, y, depth)
}

/// Per-track attention score breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetScore {
    pub centrality: f64,
    pub size: f64,
    pub confidence: f64,
    pub total: f64,
}

/// Score a track for primary-target selection
#[must_use]
pub fn score_track(track: &Track, frame_width: u32, frame_height: u32) -> TargetScore {
    let center = PixelPoint::new(f64::from(frame_width) / 2.0, f64::from(frame_height) / 2.0);
    let max_distance = center.coords.norm();
    let frame_area = f64::from(frame_width) * f64::from(frame_height);

    let centrality = if max_distance > 0.0 {
        (1.0 - distance(&track.centroid, &center) / max_distance).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let size = if frame_area > 0.0 {
        (track.last_detection.area().max(0.0) / frame_area).sqrt().min(1.0)
    } else {
        0.0
    };
    let confidence = track.tracking_confidence;

    TargetScore {
        centrality,
        size,
        confidence,
        total: CENTRALITY_WEIGHT * centrality + SIZE_WEIGHT * size + CONFIDENCE_WEIGHT * confidence,
    }
}

/// Pick the track the head should look at.
///
/// Highest total score wins; equal scores go to the lowest id so the result
/// does not depend on input order. Returns `None` for no tracks or a
/// zero-area frame.
#[must_use]
pub fn select_primary(tracks: &[Track], frame_width: u32, frame_height: u32) -> Option<u64> {
    if tracks.is_empty() || frame_width == 0 || frame_height == 0 {
        return None;
    }

    let mut best: Option<(u64, f64)> = None;
    for track in tracks {
        let score = score_track(track, frame_width, frame_height);
        debug!(
            "Track {}: centrality={:.2}, size={:.2}, confidence={:.2}, total={:.3}",
            track.id, score.centrality, score.size, score.confidence, score.total
        );
        let total = if score.total.is_nan() { f64::NEG_INFINITY } else { score.total };
        best = match best {
            Some((best_id, best_total)) if total < best_total || (total == best_total && track.id > best_id) => {
                Some((best_id, best_total))
            }
            _ => Some((track.id, total)),
        };
    }

    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: f64, y: f64, w: f64, h: f64, conf: f64, t: Instant) -> Detection {
        Detection::new(x, y, w, h, conf, t)
    }

    #[test]
    fn test_new_track_seeded_from_detection() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        let tracks = tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.8, t0)], t0);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 1);
        assert_eq!(tracks[0].frames_tracked, 1);
        assert!((tracks[0].tracking_confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_match_updates_in_place() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(33);
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.8, t0)], t0);
        let tracks = tracker.update(&[detection(20.0, 15.0, 40.0, 40.0, 0.9, t1)], t1);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 1);
        assert_eq!(tracks[0].frames_tracked, 2);
        assert!((tracks[0].tracking_confidence - 0.85).abs() < 1e-12);
        assert_eq!(tracks[0].last_seen, t1);
        assert_eq!(tracks[0].centroid, PixelPoint::new(40.0, 35.0));
    }

    #[test]
    fn test_far_detection_creates_new_track() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        tracker.update(&[detection(0.0, 0.0, 40.0, 40.0, 0.8, t0)], t0);
        let tracks = tracker.update(&[detection(400.0, 300.0, 40.0, 40.0, 0.8, t0)], t0);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracker.track(1).map(|t| t.frames_tracked), Some(1));
        assert!(tracker.track(2).is_some());
    }

    #[test]
    fn test_greedy_picks_global_minimum_first() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        // Track 1 centered at (100, 100), track 2 at (160, 100)
        tracker.update(
            &[
                detection(80.0, 80.0, 40.0, 40.0, 0.9, t0),
                detection(140.0, 80.0, 40.0, 40.0, 0.9, t0),
            ],
            t0,
        );
        // One detection at (150, 100): closer to track 2 (10px) than track 1 (50px)
        let tracks = tracker.update(&[detection(130.0, 80.0, 40.0, 40.0, 0.9, t0)], t0);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracker.track(2).map(|t| t.frames_tracked), Some(2));
        assert_eq!(tracker.track(1).map(|t| t.frames_tracked), Some(1));
    }

    #[test]
    fn test_confidence_capped() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        for i in 0..10 {
            let t = t0 + Duration::from_millis(i * 30);
            tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.9, t)], t);
        }
        let track = tracker.track(1).unwrap();
        assert_eq!(track.tracking_confidence, 1.0);
        assert_eq!(track.frames_tracked, 10);
    }

    #[test]
    fn test_ids_never_reused_after_reset() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.9, t0)], t0);
        tracker.reset();
        assert_eq!(tracker.track_count(), 0);
        let tracks = tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.9, t0)], t0);
        assert_eq!(tracks[0].id, 2);
    }

    #[test]
    fn test_empty_update_keeps_fresh_tracks() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
        tracker.update(&[detection(10.0, 10.0, 40.0, 40.0, 0.9, t0)], t0);
        let tracks = tracker.update(&[], t0 + Duration::from_secs(1));
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_estimate_position_centered() {
        let t0 = Instant::now();
        let track = Track::new(1, detection(295.0, 215.0, 50.0, 50.0, 0.9, t0), t0);
        let p = estimate_position(&track, 640, 480, 60.0);
        assert!(p.x.abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
        // f = 320 / tan(30°) ≈ 554.26, depth = 554.26 * 0.2 / 50 ≈ 2.217
        assert!((p.z - 2.217).abs() < 0.01);
    }

    #[test]
    fn test_estimate_position_signs() {
        let t0 = Instant::now();
        // Upper-right quadrant of the image
        let track = Track::new(1, detection(500.0, 50.0, 50.0, 50.0, 0.9, t0), t0);
        let p = estimate_position(&track, 640, 480, 60.0);
        assert!(p.x > 0.0, "right of center should be positive x");
        assert!(p.y > 0.0, "above center should be positive y");
    }

    #[test]
    fn test_estimate_position_zero_width() {
        let t0 = Instant::now();
        let track = Track::new(1, detection(100.0, 100.0, 0.0, 50.0, 0.9, t0), t0);
        let p = estimate_position(&track, 640, 480, 60.0);
        assert_eq!(p.z, MAX_DEPTH_M);
        assert!(p.x.is_finite() && p.y.is_finite());
    }

    #[test]
    fn test_estimate_position_zero_frame() {
        let t0 = Instant::now();
        let track = Track::new(1, detection(100.0, 100.0, 40.0, 40.0, 0.9, t0), t0);
        let p = estimate_position(&track, 0, 0, 60.0);
        assert_eq!(p, Position3D::new(0.0, 0.0, MAX_DEPTH_M));
    }

    #[test]
    fn test_select_primary_prefers_central_large() {
        let t0 = Instant::now();
        let central = Track::new(1, detection(280.0, 200.0, 80.0, 80.0, 0.9, t0), t0);
        let corner = Track::new(2, detection(0.0, 0.0, 30.0, 30.0, 0.9, t0), t0);
        assert_eq!(select_primary(&[corner.clone(), central.clone()], 640, 480), Some(1));
        assert_eq!(select_primary(&[central, corner], 640, 480), Some(1));
    }

    #[test]
    fn test_select_primary_tie_goes_to_lowest_id() {
        let t0 = Instant::now();
        // Mirror-image boxes about the vertical center line score identically
        let left = Track::new(7, detection(100.0, 215.0, 50.0, 50.0, 0.9, t0), t0);
        let right = Track::new(3, detection(490.0, 215.0, 50.0, 50.0, 0.9, t0), t0);
        let a = score_track(&left, 640, 480).total;
        let b = score_track(&right, 640, 480).total;
        assert!((a - b).abs() < 1e-12);
        assert_eq!(select_primary(&[left.clone(), right.clone()], 640, 480), Some(3));
        assert_eq!(select_primary(&[right, left], 640, 480), Some(3));
    }

    #[test]
    fn test_select_primary_empty() {
        assert_eq!(select_primary(&[], 640, 480), None);
        let t0 = Instant::now();
        let track = Track::new(1, detection(0.0, 0.0, 10.0, 10.0, 0.9, t0), t0);
        assert_eq!(select_primary(&[track], 0, 480), None);
    }

    #[test]
    fn test_score_components_in_unit_range() {
        let t0 = Instant::now();
        let huge = Track::new(1, detection(-100.0, -100.0, 2000.0, 2000.0, 1.0, t0), t0);
        let s = score_track(&huge, 640, 480);
        assert!((0.0..=1.0).contains(&s.centrality));
        assert!((0.0..=1.0).contains(&s.size));
        assert!(s.total <= 1.0 + 1e-12);
    }
}

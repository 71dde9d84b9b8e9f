//! Face detections as delivered by the external detector.

use crate::geometry::PixelPoint;
use log::debug;
use std::time::Instant;

/// One face observation in pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box top-left x
    pub x: f64,
    /// Bounding box top-left y
    pub y: f64,
    /// Bounding box width
    pub width: f64,
    /// Bounding box height
    pub height: f64,
    /// Detector confidence (0.0-1.0)
    pub confidence: f64,
    /// Capture time of the frame this detection came from
    pub timestamp: Instant,
}

impl Detection {
    /// Create a new detection; confidence is clamped into `[0, 1]`
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64, confidence: f64, timestamp: Instant) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }

    /// Box center in pixels
    #[must_use]
    pub fn centroid(&self) -> PixelPoint {
        PixelPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// A box the tracker can use: finite coordinates and positive extent
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.confidence]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// All detections from one processed frame
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub timestamp: Instant,
}

impl DetectionBatch {
    #[must_use]
    pub fn new(detections: Vec<Detection>, frame_width: u32, frame_height: u32, timestamp: Instant) -> Self {
        Self {
            detections,
            frame_width,
            frame_height,
            timestamp,
        }
    }
}

/// Keep only detections that are well formed and meet the confidence threshold
#[must_use]
pub fn filter_detections(detections: Vec<Detection>, confidence_threshold: f64) -> Vec<Detection> {
    let before = detections.len();
    let kept: Vec<Detection> = detections
        .into_iter()
        .filter(|d| d.is_well_formed() && d.confidence >= confidence_threshold)
        .collect();
    if kept.len() != before {
        debug!(
            "Discarded {} of {} detections below confidence {:.2} or malformed",
            before - kept.len(),
            before,
            confidence_threshold
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid() {
        let d = Detection::new(295.0, 215.0, 50.0, 50.0, 0.9, Instant::now());
        let c = d.centroid();
        assert_eq!(c.x, 320.0);
        assert_eq!(c.y, 240.0);
        assert_eq!(d.area(), 2500.0);
    }

    #[test]
    fn test_confidence_clamped() {
        let d = Detection::new(0.0, 0.0, 10.0, 10.0, 1.7, Instant::now());
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_filter_detections() {
        let now = Instant::now();
        let detections = vec![
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.9, now),
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.3, now),
            Detection::new(0.0, 0.0, 0.0, 10.0, 0.9, now),
            Detection::new(f64::NAN, 0.0, 10.0, 10.0, 0.9, now),
            Detection::new(5.0, 5.0, 10.0, 10.0, 0.5, now),
        ];
        let kept = filter_detections(detections, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].x, 5.0);
    }
}

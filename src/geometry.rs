//! Coordinate frames and angle helpers shared by the tracker and the gaze controller.
//!
//! Two frames are in play:
//!
//! - **Camera/world frame** ([`Position3D`]): x to the right, y up, z forward
//!   (depth). Produced by the tracker from bounding-box geometry.
//! - **Gaze frame** ([`GazePoint`]): x forward, y to the left, z up. The
//!   standard robotics convention used by the look-at math, where positive yaw
//!   turns the head to the left.
//!
//! [`Position3D::to_gaze_frame`] is the only place the remapping happens.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Pixel-space point, origin top-left, y growing downward
pub type PixelPoint = Point2<f64>;

/// 3D position relative to the robot in the camera frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3D {
    /// Lateral offset, positive to the right
    pub x: f64,
    /// Vertical offset, positive up
    pub y: f64,
    /// Depth, positive forward
    pub z: f64,
}

impl Position3D {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Remap into the gaze frame: forward = z, left = -x, up = y
    #[must_use]
    pub fn to_gaze_frame(&self) -> GazePoint {
        GazePoint {
            forward: self.z,
            left: -self.x,
            up: self.y,
        }
    }

    #[must_use]
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Straight-line distance from the robot
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.to_vector().norm()
    }
}

/// Target point in the gaze frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazePoint {
    /// Positive in front of the head
    pub forward: f64,
    /// Positive to the robot's left
    pub left: f64,
    /// Positive up
    pub up: f64,
}

impl GazePoint {
    #[must_use]
    pub const fn new(forward: f64, left: f64, up: f64) -> Self {
        Self { forward, left, up }
    }
}

/// Normalize an angle in degrees into `(-180, 180]`
#[must_use]
pub fn normalize_angle(degrees: f64) -> f64 {
    let mut wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Signed shortest angular difference `to - from`, in `(-180, 180]`
#[must_use]
pub fn shortest_angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-190.0), 170.0);
        assert_eq!(normalize_angle(540.0), 180.0);
        assert!((normalize_angle(725.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_shortest_angle_diff_wraps() {
        assert!((shortest_angle_diff(170.0, -170.0) - 20.0).abs() < 1e-9);
        assert!((shortest_angle_diff(-170.0, 170.0) + 20.0).abs() < 1e-9);
        assert!((shortest_angle_diff(10.0, 40.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_gaze_frame_remap() {
        // Right, up, forward in camera frame
        let p = Position3D::new(0.5, 0.25, 2.0);
        let g = p.to_gaze_frame();
        assert_eq!(g.forward, 2.0);
        assert_eq!(g.left, -0.5);
        assert_eq!(g.up, 0.25);
    }

    #[test]
    fn test_distance() {
        let p = Position3D::new(3.0, 0.0, 4.0);
        assert!((p.distance() - 5.0).abs() < 1e-12);
    }
}

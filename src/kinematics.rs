//! Look-at kinematics for the robot head.
//!
//! Converts a target point into head angles, clamps those angles to the safety
//! envelope, and eases from the current pose toward them. Everything here is a
//! pure function of its arguments: the caller supplies the current pose on
//! every call.
//!
//! Angle conventions (degrees, gaze frame of [`GazePoint`]):
//! - Yaw: rotation about the up axis, positive = look left
//! - Pitch: rotation about the left axis, positive = look down
//! - Roll: rotation about the forward axis, positive = tilt left

use crate::{
    constants::OVERHEAD_EPSILON_M,
    geometry::{normalize_angle, shortest_angle_diff, GazePoint},
    safety::{clamp_axis, Axis, SafetyLimits, Violation},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Target head angles handed to the actuator interface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointCommand {
    /// Degrees, positive = left
    pub yaw: f64,
    /// Degrees, positive = down
    pub pitch: f64,
    /// Degrees, positive = tilt left
    pub roll: f64,
    /// Interpolation hint for the motor driver (seconds)
    pub duration: Option<f64>,
}

impl JointCommand {
    #[must_use]
    pub const fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            duration: None,
        }
    }

    /// Head facing straight ahead
    #[must_use]
    pub const fn neutral() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[must_use]
    pub const fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Largest per-axis difference to another pose, yaw measured the short way round
    #[must_use]
    pub fn max_axis_distance(&self, other: &Self) -> f64 {
        shortest_angle_diff(self.yaw, other.yaw)
            .abs()
            .max((self.pitch - other.pitch).abs())
            .max((self.roll - other.roll).abs())
    }
}

/// Easing curve applied to interpolation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    /// Cubic ease-in-out
    Cubic,
}

impl Easing {
    /// Parse an easing name; unknown names fall back to linear
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "linear" => Self::Linear,
            "cubic" => Self::Cubic,
            other => {
                warn!("Unknown easing '{}', using linear", other);
                Self::Linear
            }
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }

    /// Map progress in `[0, 1]` to eased progress in `[0, 1]`
    #[must_use]
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::Cubic => ease_in_out_cubic(t),
        }
    }
}

/// Cubic ease-in-out (see <https://easings.net/#easeInOutCubic>)
#[must_use]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

fn eased_progress(progress: f64, easing: Easing) -> f64 {
    let t = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    easing.apply(t)
}

/// Raw head angles that point the head at `target`.
///
/// For a target straight above or below the head, yaw is undefined and keeps
/// `current_yaw`. Roll is always zero.
#[must_use]
pub fn look_at_angles(target: GazePoint, current_yaw: f64) -> JointCommand {
    let horizontal_distance = target.forward.hypot(target.left);

    let (yaw, pitch) = if horizontal_distance < OVERHEAD_EPSILON_M {
        (current_yaw, if target.up > 0.0 { -90.0 } else { 90.0 })
    } else {
        (
            target.left.atan2(target.forward).to_degrees(),
            -target.up.atan2(horizontal_distance).to_degrees(),
        )
    };

    debug!(
        "Look at ({:.2}, {:.2}, {:.2}) -> yaw={:.1}°, pitch={:.1}°",
        target.forward, target.left, target.up, yaw, pitch
    );

    JointCommand::new(yaw, pitch, 0.0)
}

/// Clamp target angles to the envelope, including the body-relative yaw band.
///
/// Yaw ends up inside both `±limits.yaw` and `body_yaw ± limits.body_yaw_diff`;
/// where the two disagree the body-relative band wins. Applying this twice
/// gives the same result as applying it once.
#[must_use]
pub fn apply_safety_limits(cmd: JointCommand, body_yaw: f64, limits: &SafetyLimits) -> (JointCommand, Vec<Violation>) {
    let mut events = Vec::new();

    let (pitch, v) = clamp_axis(Axis::Pitch, cmd.pitch, -limits.pitch, limits.pitch);
    events.extend(v);
    let (roll, v) = clamp_axis(Axis::Roll, cmd.roll, -limits.roll, limits.roll);
    events.extend(v);
    let (mut yaw, v) = clamp_axis(Axis::Yaw, cmd.yaw, -limits.yaw, limits.yaw);
    events.extend(v);

    if body_yaw.is_finite() {
        let lo = (body_yaw - limits.body_yaw_diff).max(-limits.yaw);
        let hi = (body_yaw + limits.body_yaw_diff).min(limits.yaw);
        let (relative, v) = if lo <= hi {
            clamp_axis(Axis::BodyRelativeYaw, yaw, lo, hi)
        } else {
            // Body turned beyond the head's reach: park at the nearest absolute bound
            let bound = if body_yaw > 0.0 { limits.yaw } else { -limits.yaw };
            clamp_axis(Axis::BodyRelativeYaw, yaw, bound, bound)
        };
        yaw = relative;
        events.extend(v);
    }

    for event in &events {
        warn!("Gaze target clamped: {}", event);
    }

    (
        JointCommand {
            yaw,
            pitch,
            roll,
            duration: cmd.duration,
        },
        events,
    )
}

/// Ease an angle toward a target along the shortest path around the circle.
///
/// The result is normalized into `(-180, 180]`.
#[must_use]
pub fn smooth_transition(current: f64, target: f64, progress: f64, easing: Easing) -> f64 {
    let eased = eased_progress(progress, easing);
    normalize_angle(current + shortest_angle_diff(current, target) * eased)
}

/// Ease a non-wrapping angle (pitch, roll) toward a target
#[must_use]
pub fn interpolate_linear(current: f64, target: f64, progress: f64, easing: Easing) -> f64 {
    let eased = eased_progress(progress, easing);
    current + (target - current) * eased
}

/// Ease a whole pose toward a target pose; yaw wraps, pitch and roll do not
#[must_use]
pub fn interpolate_pose(current: &JointCommand, target: &JointCommand, progress: f64, easing: Easing) -> JointCommand {
    JointCommand {
        yaw: smooth_transition(current.yaw, target.yaw, progress, easing),
        pitch: interpolate_linear(current.pitch, target.pitch, progress, easing),
        roll: interpolate_linear(current.roll, target.roll, progress, easing),
        duration: target.duration,
    }
}

/// Compute the next head command toward `target`, reporting any clamping.
///
/// `progress >= 1` jumps straight to the clamped target angles.
#[must_use]
pub fn look_at_with_report(
    target: GazePoint,
    current: &JointCommand,
    body_yaw: f64,
    progress: f64,
    easing: Easing,
    limits: &SafetyLimits,
) -> (JointCommand, Vec<Violation>) {
    let raw = look_at_angles(target, current.yaw);
    let (clamped, events) = apply_safety_limits(raw, body_yaw, limits);

    let next = if progress >= 1.0 {
        clamped
    } else {
        interpolate_pose(current, &clamped, progress, easing)
    };

    (next, events)
}

/// Compute the next head command toward `target` with the default envelope
#[must_use]
pub fn look_at(target: GazePoint, current: &JointCommand, body_yaw: f64, progress: f64, easing: Easing) -> JointCommand {
    look_at_with_report(target, current, body_yaw, progress, easing, &SafetyLimits::default()).0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_neutral_with_duration() {
        let cmd = JointCommand::neutral().with_duration(2.0);
        assert_eq!((cmd.yaw, cmd.pitch, cmd.roll), (0.0, 0.0, 0.0));
        assert_eq!(cmd.duration, Some(2.0));
        assert_eq!(JointCommand::neutral().duration, None);
    }

    #[test]
    fn test_look_straight_ahead() {
        let cmd = look_at_angles(GazePoint::new(1.0, 0.0, 0.0), 0.0);
        assert!(cmd.yaw.abs() < EPS);
        assert!(cmd.pitch.abs() < EPS);
        assert_eq!(cmd.roll, 0.0);
    }

    #[test]
    fn test_look_left_yaw_positive() {
        let cmd = look_at_angles(GazePoint::new(1.0, 0.5, 0.0), 0.0);
        assert!((cmd.yaw - 26.565).abs() < 0.01);
    }

    #[test]
    fn test_look_up_pitch_negative() {
        let cmd = look_at_angles(GazePoint::new(1.0, 0.0, 1.0), 0.0);
        assert!((cmd.pitch + 45.0).abs() < EPS);
    }

    #[test]
    fn test_overhead_keeps_current_yaw() {
        let above = look_at_angles(GazePoint::new(0.0, 0.0, 1.0), 33.0);
        assert_eq!(above.yaw, 33.0);
        assert_eq!(above.pitch, -90.0);

        let below = look_at_angles(GazePoint::new(0.0005, 0.0, -1.0), -12.0);
        assert_eq!(below.yaw, -12.0);
        assert_eq!(below.pitch, 90.0);
    }

    #[test]
    fn test_cubic_easing_endpoints() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < EPS);
        assert!((ease_in_out_cubic(0.25) - 0.0625).abs() < EPS);
        assert!((ease_in_out_cubic(0.75) - 0.9375).abs() < EPS);
    }

    #[test]
    fn test_unknown_easing_is_linear() {
        assert_eq!(Easing::from_name("bouncy"), Easing::Linear);
        assert_eq!(Easing::from_name("Cubic"), Easing::Cubic);
    }

    #[test]
    fn test_smooth_transition_shortest_path() {
        let yaw = smooth_transition(170.0, -170.0, 0.5, Easing::Linear);
        assert!((yaw.abs() - 180.0).abs() < 1e-6, "got {yaw}");

        let yaw = smooth_transition(-170.0, 170.0, 0.25, Easing::Linear);
        assert!((yaw + 175.0).abs() < 1e-6, "got {yaw}");
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(smooth_transition(0.0, 40.0, 2.0, Easing::Linear), 40.0);
        assert_eq!(smooth_transition(0.0, 40.0, -1.0, Easing::Linear), 0.0);
        assert_eq!(interpolate_linear(0.0, 40.0, f64::NAN, Easing::Cubic), 0.0);
    }

    #[test]
    fn test_pitch_clamped_before_smoothing() {
        // Target far above: raw pitch -80°, clamped to -40° before easing
        let current = JointCommand::neutral();
        let (cmd, events) = look_at_with_report(
            GazePoint::new(0.2, 0.0, 1.2),
            &current,
            0.0,
            0.5,
            Easing::Linear,
            &SafetyLimits::default(),
        );
        assert!((cmd.pitch + 20.0).abs() < 1e-6);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::Pitch);
    }

    #[test]
    fn test_body_relative_yaw_clamp() {
        let limits = SafetyLimits::default();
        let (cmd, events) = apply_safety_limits(JointCommand::new(100.0, 0.0, 0.0), 0.0, &limits);
        assert_eq!(cmd.yaw, 65.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::BodyRelativeYaw);

        let (cmd, _) = apply_safety_limits(JointCommand::new(-100.0, 0.0, 0.0), 20.0, &limits);
        assert_eq!(cmd.yaw, -45.0);
    }

    #[test]
    fn test_body_relative_band_respects_absolute_limit() {
        let limits = SafetyLimits::default();
        let (cmd, _) = apply_safety_limits(JointCommand::new(179.0, 0.0, 0.0), 150.0, &limits);
        assert_eq!(cmd.yaw, 179.0);
        let (cmd, _) = apply_safety_limits(JointCommand::new(250.0, 0.0, 0.0), 150.0, &limits);
        assert_eq!(cmd.yaw, 180.0);
    }

    #[test]
    fn test_full_progress_jumps_to_target() {
        let current = JointCommand::new(10.0, 10.0, 10.0);
        let cmd = look_at(GazePoint::new(1.0, 0.0, 0.0), &current, 0.0, 1.0, Easing::Cubic);
        assert!(cmd.yaw.abs() < EPS);
        assert!(cmd.pitch.abs() < EPS);
        assert_eq!(cmd.roll, 0.0);
    }

    #[test]
    fn test_max_axis_distance_wraps_yaw() {
        let a = JointCommand::new(179.0, 0.0, 0.0);
        let b = JointCommand::new(-179.0, 5.0, 0.0);
        assert!((a.max_axis_distance(&b) - 5.0).abs() < 1e-9);
    }
}

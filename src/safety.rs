//! Final hardware safety gate for head joint commands.
//!
//! Every command headed for the actuator passes through [`SafetyFilter::enforce`],
//! no matter which code path produced it. Out-of-range axes are clamped to the
//! nearest bound and reported; the filter never fails and never blocks.

use crate::{
    constants::{BODY_HEAD_YAW_DIFF_LIMIT_DEG, HEAD_PITCH_LIMIT_DEG, HEAD_ROLL_LIMIT_DEG, HEAD_YAW_LIMIT_DEG},
    kinematics::JointCommand,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard angle limits of the head (degrees, symmetric about zero)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// Absolute yaw bound
    pub yaw: f64,
    /// Pitch bound
    pub pitch: f64,
    /// Roll bound
    pub roll: f64,
    /// Maximum head yaw away from the body yaw
    pub body_yaw_diff: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            yaw: HEAD_YAW_LIMIT_DEG,
            pitch: HEAD_PITCH_LIMIT_DEG,
            roll: HEAD_ROLL_LIMIT_DEG,
            body_yaw_diff: BODY_HEAD_YAW_DIFF_LIMIT_DEG,
        }
    }
}

/// Joint axis named in a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Yaw,
    Pitch,
    Roll,
    /// Yaw measured relative to the body
    BodyRelativeYaw,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yaw => "yaw",
            Self::Pitch => "pitch",
            Self::Roll => "roll",
            Self::BodyRelativeYaw => "body-relative yaw",
        };
        f.write_str(name)
    }
}

/// One axis that had to be clamped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub axis: Axis,
    pub offending_value: f64,
    pub clamped_value: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offending_value.is_nan() {
            write!(f, "{} NaN° replaced by {}°", self.axis, self.clamped_value)
        } else if self.offending_value > self.clamped_value {
            write!(f, "{} {:.1}° > {}°", self.axis, self.offending_value, self.clamped_value)
        } else {
            write!(f, "{} {:.1}° < {}°", self.axis, self.offending_value, self.clamped_value)
        }
    }
}

/// Clamp one axis value into `[lo, hi]`, reporting when it changes.
///
/// NaN is replaced by the neutral angle (0°, pulled into range).
pub(crate) fn clamp_axis(axis: Axis, value: f64, lo: f64, hi: f64) -> (f64, Option<Violation>) {
    let clamped = if value.is_nan() { 0.0_f64.clamp(lo, hi) } else { value.clamp(lo, hi) };

    if value.is_nan() || clamped != value {
        (
            clamped,
            Some(Violation {
                axis,
                offending_value: value,
                clamped_value: clamped,
            }),
        )
    } else {
        (clamped, None)
    }
}

/// Last gate before commands reach the actuator
#[derive(Debug, Clone, Default)]
pub struct SafetyFilter {
    limits: SafetyLimits,
    total_violations: u64,
}

impl SafetyFilter {
    #[must_use]
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            total_violations: 0,
        }
    }

    /// Clamp a command into the hardware envelope and list what was changed
    pub fn enforce(&mut self, cmd: JointCommand) -> (JointCommand, Vec<Violation>) {
        let (safe, violations) = enforce_limits(cmd, &self.limits);
        for violation in &violations {
            warn!("Safety violation: {}", violation);
        }
        self.total_violations += violations.len() as u64;
        (safe, violations)
    }

    /// Violations reported since construction
    #[must_use]
    pub const fn total_violations(&self) -> u64 {
        self.total_violations
    }
}

/// Stateless form of [`SafetyFilter::enforce`]
#[must_use]
pub fn enforce_limits(cmd: JointCommand, limits: &SafetyLimits) -> (JointCommand, Vec<Violation>) {
    let mut violations = Vec::new();

    let (yaw, v) = clamp_axis(Axis::Yaw, cmd.yaw, -limits.yaw, limits.yaw);
    violations.extend(v);
    let (pitch, v) = clamp_axis(Axis::Pitch, cmd.pitch, -limits.pitch, limits.pitch);
    violations.extend(v);
    let (roll, v) = clamp_axis(Axis::Roll, cmd.roll, -limits.roll, limits.roll);
    violations.extend(v);

    (
        JointCommand {
            yaw,
            pitch,
            roll,
            duration: cmd.duration,
        },
        violations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_limits_untouched() {
        let mut filter = SafetyFilter::default();
        let cmd = JointCommand::new(30.0, 20.0, 10.0);
        let (safe, violations) = filter.enforce(cmd);
        assert_eq!(safe, cmd);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_all_axes_clamped() {
        let mut filter = SafetyFilter::default();
        let (safe, violations) = filter.enforce(JointCommand::new(200.0, -50.0, 50.0));
        assert_eq!((safe.yaw, safe.pitch, safe.roll), (180.0, -40.0, 40.0));
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0].axis, Axis::Yaw);
        assert_eq!(violations[1].axis, Axis::Pitch);
        assert_eq!(violations[2].axis, Axis::Roll);
        assert_eq!(filter.total_violations(), 3);
    }

    #[test]
    fn test_violation_messages() {
        let (_, violations) = enforce_limits(JointCommand::new(200.0, -50.0, 0.0), &SafetyLimits::default());
        assert_eq!(violations[0].to_string(), "yaw 200.0° > 180°");
        assert_eq!(violations[1].to_string(), "pitch -50.0° < -40°");
    }

    #[test]
    fn test_boundary_values_not_violations() {
        let (safe, violations) = enforce_limits(JointCommand::new(-180.0, 40.0, -40.0), &SafetyLimits::default());
        assert!(violations.is_empty());
        assert_eq!(safe.yaw, -180.0);
    }

    #[test]
    fn test_nan_replaced_with_neutral() {
        let (safe, violations) = enforce_limits(JointCommand::new(f64::NAN, 0.0, 0.0), &SafetyLimits::default());
        assert_eq!(safe.yaw, 0.0);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].offending_value.is_nan());
    }

    #[test]
    fn test_infinity_clamped_to_bound() {
        let (safe, _) = enforce_limits(
            JointCommand::new(f64::INFINITY, f64::NEG_INFINITY, 0.0),
            &SafetyLimits::default(),
        );
        assert_eq!(safe.yaw, 180.0);
        assert_eq!(safe.pitch, -40.0);
    }

    #[test]
    fn test_duration_preserved() {
        let cmd = JointCommand::new(300.0, 0.0, 0.0).with_duration(0.01);
        let (safe, _) = enforce_limits(cmd, &SafetyLimits::default());
        assert_eq!(safe.duration, Some(0.01));
    }
}

//! Configuration management for the face gaze tracker

use crate::{
    constants::{
        DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CONTROL_RATE_HZ, DEFAULT_FACE_LOST_GRACE_SECS, DEFAULT_FRAME_HEIGHT,
        DEFAULT_FRAME_WIDTH, DEFAULT_HORIZONTAL_FOV_DEG, DEFAULT_MAX_MATCH_DISTANCE, DEFAULT_PROGRESS_PER_TICK,
        DEFAULT_RETURN_TO_NEUTRAL_SECS, DEFAULT_TRACK_TIMEOUT_SECS,
    },
    kinematics::Easing,
    safety::SafetyLimits,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target tracker configuration
    pub tracker: TrackerConfig,

    /// Camera calibration
    pub camera: CameraConfig,

    /// Control loop configuration
    pub control: ControlConfig,

    /// Hardware safety envelope
    pub safety: SafetyLimits,
}

/// Target tracker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centroid distance for a match (pixels)
    pub max_match_distance: f64,

    /// Time before an unmatched track is dropped (seconds)
    pub track_timeout_secs: f64,

    /// Minimum detector confidence to enter tracking (0.0-1.0)
    pub confidence_threshold: f64,
}

/// Camera calibration constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Horizontal field of view (degrees)
    pub horizontal_fov_deg: f64,

    /// Frame width assumed before the first batch arrives
    pub frame_width: u32,

    /// Frame height assumed before the first batch arrives
    pub frame_height: u32,
}

/// Control loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control loop rate (Hz)
    pub control_rate_hz: u32,

    /// Fraction of the remaining angular gap closed per tick (0.0-1.0]
    pub progress_per_tick: f64,

    /// Easing curve name (linear, cubic)
    pub easing: String,

    /// Time without a primary target before returning to neutral (seconds)
    pub face_lost_grace_secs: f64,

    /// Duration of the return to neutral (seconds)
    pub return_to_neutral_secs: f64,

    /// Smoothing applied to the primary target position (none, exponential[:alpha])
    pub target_filter: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_match_distance: DEFAULT_MAX_MATCH_DISTANCE,
            track_timeout_secs: DEFAULT_TRACK_TIMEOUT_SECS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            horizontal_fov_deg: DEFAULT_HORIZONTAL_FOV_DEG,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: DEFAULT_CONTROL_RATE_HZ,
            progress_per_tick: DEFAULT_PROGRESS_PER_TICK,
            easing: "linear".to_string(),
            face_lost_grace_secs: DEFAULT_FACE_LOST_GRACE_SECS,
            return_to_neutral_secs: DEFAULT_RETURN_TO_NEUTRAL_SECS,
            target_filter: "exponential:0.7".to_string(),
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn track_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.track_timeout_secs.max(0.0))
    }
}

impl ControlConfig {
    #[must_use]
    pub fn easing(&self) -> Easing {
        Easing::from_name(&self.easing)
    }

    /// Period of one control tick
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.control_rate_hz.max(1)))
    }

    #[must_use]
    pub fn face_lost_grace(&self) -> Duration {
        Duration::from_secs_f64(self.face_lost_grace_secs.max(0.0))
    }

    #[must_use]
    pub fn return_to_neutral(&self) -> Duration {
        Duration::from_secs_f64(self.return_to_neutral_secs.max(0.0))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Create the primary-target smoothing filter from configuration
    pub fn create_filter(&self) -> Result<Box<dyn crate::filters::TargetFilter>> {
        crate::filters::create_filter(&self.control.target_filter)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Tracker
        if !(self.tracker.max_match_distance.is_finite() && self.tracker.max_match_distance > 0.0) {
            return Err(Error::ConfigError(
                "Max match distance must be a positive number of pixels".to_string(),
            ));
        }
        if !(self.tracker.track_timeout_secs.is_finite() && self.tracker.track_timeout_secs > 0.0) {
            return Err(Error::ConfigError("Track timeout must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.tracker.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Camera
        if !(self.camera.horizontal_fov_deg > 0.0 && self.camera.horizontal_fov_deg < 180.0) {
            return Err(Error::ConfigError(
                "Horizontal field of view must be between 0 and 180 degrees".to_string(),
            ));
        }
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            return Err(Error::ConfigError("Frame size must be non-zero".to_string()));
        }

        // Control
        if self.control.control_rate_hz == 0 {
            return Err(Error::ConfigError("Control rate must be greater than 0".to_string()));
        }
        if !(self.control.progress_per_tick > 0.0 && self.control.progress_per_tick <= 1.0) {
            return Err(Error::ConfigError(
                "Progress per tick must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.control.face_lost_grace_secs.is_finite() && self.control.face_lost_grace_secs >= 0.0) {
            return Err(Error::ConfigError("Face lost grace period must be non-negative".to_string()));
        }
        if !(self.control.return_to_neutral_secs.is_finite() && self.control.return_to_neutral_secs >= 0.0) {
            return Err(Error::ConfigError("Return to neutral duration must be non-negative".to_string()));
        }
        crate::filters::create_filter(&self.control.target_filter)?;

        // Safety limits may be tightened but never loosened beyond the hardware envelope
        let hardware = SafetyLimits::default();
        let limits = [
            ("yaw", self.safety.yaw, hardware.yaw),
            ("pitch", self.safety.pitch, hardware.pitch),
            ("roll", self.safety.roll, hardware.roll),
            ("body yaw difference", self.safety.body_yaw_diff, hardware.body_yaw_diff),
        ];
        for (name, value, max) in limits {
            if !(value > 0.0 && value <= max) {
                return Err(Error::ConfigError(format!(
                    "Safety limit for {name} must be in (0, {max}], got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Gaze Tracker Configuration

# Target tracker
tracker:
  max_match_distance: 100.0
  track_timeout_secs: 2.0
  confidence_threshold: 0.5

# Camera calibration
camera:
  horizontal_fov_deg: 60.0
  frame_width: 640
  frame_height: 480

# Control loop
control:
  control_rate_hz: 100
  progress_per_tick: 0.5
  easing: "linear"
  face_lost_grace_secs: 1.5
  return_to_neutral_secs: 2.0
  target_filter: "exponential:0.7"

# Hardware safety envelope (degrees). Do not loosen without hardware review.
safety:
  yaw: 180.0
  pitch: 40.0
  roll: 40.0
  body_yaw_diff: 65.0
"#;

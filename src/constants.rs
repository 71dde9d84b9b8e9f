//! Constants used throughout the application

/// Maximum centroid distance for matching a detection to a track (pixels)
pub const DEFAULT_MAX_MATCH_DISTANCE: f64 = 100.0;

/// Time without a match before a track is dropped (seconds)
pub const DEFAULT_TRACK_TIMEOUT_SECS: f64 = 2.0;

/// Minimum detector confidence for a detection to enter tracking
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Confidence gained by a track per successful match
pub const TRACKING_CONFIDENCE_STEP: f64 = 0.05;

/// Camera horizontal field of view (degrees)
pub const DEFAULT_HORIZONTAL_FOV_DEG: f64 = 60.0;

/// Default frame size assumed before the first detection batch
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Assumed real-world width of a human head (meters)
pub const REFERENCE_HEAD_WIDTH_M: f64 = 0.2;

/// Range of trusted depth estimates (meters)
pub const MIN_DEPTH_M: f64 = 0.3;
pub const MAX_DEPTH_M: f64 = 5.0;

/// Primary-target scoring weights
pub const CENTRALITY_WEIGHT: f64 = 0.4;
pub const SIZE_WEIGHT: f64 = 0.4;
pub const CONFIDENCE_WEIGHT: f64 = 0.2;

/// Hardware safety envelope (degrees). Physical constants of the head.
pub const HEAD_YAW_LIMIT_DEG: f64 = 180.0;
pub const HEAD_PITCH_LIMIT_DEG: f64 = 40.0;
pub const HEAD_ROLL_LIMIT_DEG: f64 = 40.0;
pub const BODY_HEAD_YAW_DIFF_LIMIT_DEG: f64 = 65.0;

/// Below this horizontal distance the target is treated as straight up/down (meters)
pub const OVERHEAD_EPSILON_M: f64 = 0.001;

/// Control loop defaults
pub const DEFAULT_CONTROL_RATE_HZ: u32 = 100;
pub const DEFAULT_PROGRESS_PER_TICK: f64 = 0.5;
pub const DEFAULT_FACE_LOST_GRACE_SECS: f64 = 1.5;
pub const DEFAULT_RETURN_TO_NEUTRAL_SECS: f64 = 2.0;

/// Exponential smoothing factor applied to the primary target position
pub const DEFAULT_TARGET_SMOOTHING_ALPHA: f64 = 0.7;

/// Poll interval of the tracking loop while waiting for a detection batch (milliseconds)
pub const DETECTION_POLL_INTERVAL_MS: u64 = 50;

/// Capacity of the detection ingest channel
pub const DETECTION_CHANNEL_CAPACITY: usize = 4;

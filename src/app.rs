//! Detection sources that feed the pipeline when no live detector is attached.
//!
//! A replay file is YAML of the form:
//!
//! ```yaml
//! frame_width: 640
//! frame_height: 480
//! frames:
//!   - t: 0.0
//!     detections:
//!       - { x: 295, y: 215, width: 50, height: 50, confidence: 0.9 }
//!   - t: 0.033
//!     detections: []
//! ```

use crate::{
    constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH},
    detection::{Detection, DetectionBatch},
    scheduler::StopHandle,
    Error, Result,
};
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Recorded detector output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFile {
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    pub frames: Vec<ReplayFrame>,
}

/// One recorded frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Seconds since the start of the recording
    pub t: f64,
    #[serde(default)]
    pub detections: Vec<ReplayDetection>,
}

/// One recorded bounding box
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplayDetection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

const fn default_frame_width() -> u32 {
    DEFAULT_FRAME_WIDTH
}

const fn default_frame_height() -> u32 {
    DEFAULT_FRAME_HEIGHT
}

const fn default_confidence() -> f64 {
    1.0
}

impl ReplayFile {
    /// Load a recording from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a recording from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        let replay: Self = serde_yaml::from_str(content)?;
        if replay.frames.iter().any(|f| !f.t.is_finite() || f.t < 0.0) {
            return Err(Error::InvalidInput(
                "Replay frame times must be non-negative seconds".to_string(),
            ));
        }
        Ok(replay)
    }

    /// Detection batch for a recorded frame, stamped with `timestamp`
    #[must_use]
    pub fn batch(&self, frame: &ReplayFrame, timestamp: Instant) -> DetectionBatch {
        let detections = frame
            .detections
            .iter()
            .map(|d| Detection::new(d.x, d.y, d.width, d.height, d.confidence, timestamp))
            .collect();
        DetectionBatch::new(detections, self.frame_width, self.frame_height, timestamp)
    }

    /// Time of the last frame
    #[must_use]
    pub fn duration(&self) -> Duration {
        let last = self.frames.iter().map(|f| f.t).fold(0.0, f64::max);
        Duration::from_secs_f64(last)
    }
}

/// Face sweeping left and right across the frame with periodic absences
#[derive(Debug, Clone)]
pub struct SyntheticSweep {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames per second produced
    pub fps: f64,
    /// One full left-right-left sweep (seconds)
    pub sweep_period: f64,
    /// The face is absent for the last `absent_secs` of every `cycle_secs`
    pub cycle_secs: f64,
    pub absent_secs: f64,
}

impl Default for SyntheticSweep {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            fps: 30.0,
            sweep_period: 6.0,
            cycle_secs: 12.0,
            absent_secs: 4.0,
        }
    }
}

impl SyntheticSweep {
    /// Detections for the frame at `elapsed` seconds
    #[must_use]
    pub fn detections_at(&self, elapsed: f64, timestamp: Instant) -> Vec<Detection> {
        if self.cycle_secs > 0.0 && elapsed % self.cycle_secs >= self.cycle_secs - self.absent_secs {
            return Vec::new();
        }

        let w = f64::from(self.frame_width);
        let h = f64::from(self.frame_height);
        let size = (w.min(h) * 0.15).max(1.0);
        let phase = 2.0 * std::f64::consts::PI * elapsed / self.sweep_period.max(f64::EPSILON);
        let cx = (w / 2.0) + (w * 0.35) * phase.sin();
        let cy = (h / 2.0) + (h * 0.1) * (phase * 0.5).sin();

        vec![Detection::new(cx - size / 2.0, cy - size / 2.0, size, size, 0.9, timestamp)]
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1.0))
    }
}

/// Where detection batches come from
#[derive(Debug, Clone)]
pub enum DetectionSource {
    /// Recorded frames paced by their timestamps
    Replay(ReplayFile),
    /// Generated sweep, optionally limited in time
    Synthetic(SyntheticSweep, Option<Duration>),
}

/// Counters of a source thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub sent: u64,
    /// Batches dropped because the tracking loop was behind
    pub dropped: u64,
}

/// Outcome of offering one batch to the ingest channel
enum Offer {
    Sent,
    Dropped,
    Closed,
}

fn offer(tx: &Sender<DetectionBatch>, batch: DetectionBatch, stats: &mut SourceStats) -> Offer {
    match tx.try_send(batch) {
        Ok(()) => {
            stats.sent += 1;
            Offer::Sent
        }
        Err(TrySendError::Full(_)) => {
            stats.dropped += 1;
            debug!("Tracking loop busy, dropped a detection batch");
            Offer::Dropped
        }
        Err(TrySendError::Disconnected(_)) => Offer::Closed,
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

fn run_replay(replay: &ReplayFile, tx: &Sender<DetectionBatch>, stop: &StopHandle) -> SourceStats {
    let mut stats = SourceStats::default();
    let start = Instant::now();
    info!(
        "Replaying {} frames over {:.1}s",
        replay.frames.len(),
        replay.duration().as_secs_f64()
    );

    for frame in &replay.frames {
        sleep_until(start + Duration::from_secs_f64(frame.t));
        if stop.is_stopped() {
            break;
        }
        if matches!(offer(tx, replay.batch(frame, Instant::now()), &mut stats), Offer::Closed) {
            break;
        }
    }
    stats
}

fn run_synthetic(
    sweep: &SyntheticSweep,
    limit: Option<Duration>,
    tx: &Sender<DetectionBatch>,
    stop: &StopHandle,
) -> SourceStats {
    let mut stats = SourceStats::default();
    let start = Instant::now();
    let interval = sweep.frame_interval();
    info!("Generating synthetic detections at {:.0} fps", sweep.fps);

    let mut next = start;
    while !stop.is_stopped() {
        let now = Instant::now();
        let elapsed = now.duration_since(start);
        if limit.is_some_and(|l| elapsed >= l) {
            break;
        }

        let detections = sweep.detections_at(elapsed.as_secs_f64(), now);
        let batch = DetectionBatch::new(detections, sweep.frame_width, sweep.frame_height, now);
        if matches!(offer(tx, batch, &mut stats), Offer::Closed) {
            break;
        }

        next += interval;
        sleep_until(next);
    }
    stats
}

/// Start the source on its own thread; the channel closes when it finishes
pub fn spawn_source(source: DetectionSource, tx: Sender<DetectionBatch>, stop: StopHandle) -> Result<JoinHandle<SourceStats>> {
    thread::Builder::new()
        .name("detector".to_string())
        .spawn(move || {
            let stats = match &source {
                DetectionSource::Replay(replay) => run_replay(replay, &tx, &stop),
                DetectionSource::Synthetic(sweep, limit) => run_synthetic(sweep, *limit, &tx, &stop),
            };
            info!("Detection source finished: {} sent, {} dropped", stats.sent, stats.dropped);
            stats
        })
        .map_err(|e| Error::ThreadError(format!("Failed to spawn detection source: {e}")))
}

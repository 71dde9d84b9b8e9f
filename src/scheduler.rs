//! Runs the tracking loop and the control loop on their own threads.

use crate::{
    config::Config,
    control::{Actuator, ControlLoop, ControlSettings, ControlStats, JointStateSource},
    detection::DetectionBatch,
    perception::{TrackingLoop, TrackingStats},
    snapshot::{SnapshotCell, TrackingSnapshot},
    Error, Result,
};
use crossbeam_channel::Receiver;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Cooperative stop flag shared by both loops
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Statistics of both loops after shutdown
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub tracking: TrackingStats,
    pub control: ControlStats,
}

/// Handle to the running pipeline
pub struct Scheduler {
    stop: StopHandle,
    cell: Arc<SnapshotCell>,
    tracking_enabled: Arc<AtomicBool>,
    tracking: JoinHandle<TrackingStats>,
    control: JoinHandle<ControlStats>,
}

impl Scheduler {
    /// Build both loops from `config` and start them
    pub fn spawn(
        config: &Config,
        detections: Receiver<DetectionBatch>,
        mut source: Box<dyn JointStateSource>,
        mut actuator: Box<dyn Actuator>,
    ) -> Result<Self> {
        config.validate()?;

        let stop = StopHandle::new();
        let cell = Arc::new(SnapshotCell::new(TrackingSnapshot::empty(
            config.camera.frame_width,
            config.camera.frame_height,
            Instant::now(),
        )));

        let mut tracking_loop = TrackingLoop::from_config(config, Arc::clone(&cell));
        let mut control_loop = ControlLoop::new(
            ControlSettings::from_config(config),
            Arc::clone(&cell),
            config.create_filter()?,
        );
        let tracking_enabled = control_loop.tracking_switch();

        let tracking_stop = stop.clone();
        let tracking = thread::Builder::new()
            .name("tracking".to_string())
            .spawn(move || tracking_loop.run(&detections, &tracking_stop))
            .map_err(|e| Error::ThreadError(format!("Failed to spawn tracking loop: {e}")))?;

        let control_stop = stop.clone();
        let control = match thread::Builder::new()
            .name("control".to_string())
            .spawn(move || control_loop.run(source.as_mut(), actuator.as_mut(), &control_stop))
        {
            Ok(handle) => handle,
            Err(e) => {
                stop.stop();
                let _ = tracking.join();
                return Err(Error::ThreadError(format!("Failed to spawn control loop: {e}")));
            }
        };

        info!("Scheduler started");
        Ok(Self {
            stop,
            cell,
            tracking_enabled,
            tracking,
            control,
        })
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Latest published tracking snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<TrackingSnapshot> {
        self.cell.latest()
    }

    /// Enable or disable head tracking; disabling returns the head to neutral
    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.tracking_enabled.store(enabled, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_tracking_enabled(&self) -> bool {
        self.tracking_enabled.load(Ordering::SeqCst)
    }

    /// True once the tracking loop has exited, e.g. because the detection source closed
    #[must_use]
    pub fn tracking_finished(&self) -> bool {
        self.tracking.is_finished()
    }

    /// Stop both loops and wait for them; the control loop commands neutral on its way out
    pub fn shutdown(self) -> Result<SchedulerStats> {
        info!("Scheduler shutting down");
        self.stop.stop();

        let tracking = self
            .tracking
            .join()
            .map_err(|_| Error::ThreadError("Tracking loop panicked".to_string()))?;
        let control = self
            .control
            .join()
            .map_err(|_| Error::ThreadError("Control loop panicked".to_string()))?;

        Ok(SchedulerStats { tracking, control })
    }
}

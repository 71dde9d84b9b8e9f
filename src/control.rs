//! Fixed-rate control loop: latest snapshot in, safe head command out.
//!
//! Each tick reads whatever snapshot the tracking loop published last,
//! smooths the primary target position (once per snapshot, not per tick),
//! runs the look-at controller and
//! passes the result through the [`SafetyFilter`]. When the primary target
//! disappears the head holds its last gaze for a grace period, then eases
//! back to neutral.

use crate::{
    config::Config,
    filters::{NoFilter, TargetFilter},
    geometry::Position3D,
    kinematics::{interpolate_pose, look_at_with_report, Easing, JointCommand},
    safety::{SafetyFilter, SafetyLimits, Violation},
    scheduler::StopHandle,
    snapshot::SnapshotCell,
    Result,
};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Measured head pose plus the body orientation it is mounted on (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub body_yaw: f64,
}

impl JointState {
    #[must_use]
    pub const fn new(yaw: f64, pitch: f64, roll: f64, body_yaw: f64) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            body_yaw,
        }
    }

    /// Head part of the state as a command
    #[must_use]
    pub const fn head(&self) -> JointCommand {
        JointCommand::new(self.yaw, self.pitch, self.roll)
    }
}

/// Source of the measured joint state
pub trait JointStateSource: Send {
    /// Current state, or `None` when nothing could be read this tick
    fn read(&mut self) -> Option<JointState>;

    /// Called with every command that reached the actuator
    fn observe_command(&mut self, _cmd: &JointCommand) {}
}

/// Destination for head commands
pub trait Actuator: Send {
    fn send(&mut self, cmd: &JointCommand) -> Result<()>;

    fn name(&self) -> &str;
}

/// Open-loop state source that reports the last command back as the pose
#[derive(Debug, Clone, Default)]
pub struct EchoJointState {
    state: JointState,
}

impl EchoJointState {
    #[must_use]
    pub fn new(body_yaw: f64) -> Self {
        Self {
            state: JointState::new(0.0, 0.0, 0.0, body_yaw),
        }
    }
}

impl JointStateSource for EchoJointState {
    fn read(&mut self) -> Option<JointState> {
        Some(self.state)
    }

    fn observe_command(&mut self, cmd: &JointCommand) {
        self.state.yaw = cmd.yaw;
        self.state.pitch = cmd.pitch;
        self.state.roll = cmd.roll;
    }
}

/// Actuator that only logs what it is asked to do
#[derive(Debug, Default)]
pub struct LoggingActuator {
    sent: u64,
}

impl LoggingActuator {
    #[must_use]
    pub const fn new() -> Self {
        Self { sent: 0 }
    }
}

impl Actuator for LoggingActuator {
    fn send(&mut self, cmd: &JointCommand) -> Result<()> {
        self.sent += 1;
        debug!(
            "Head command {}: yaw={:.1}°, pitch={:.1}°, roll={:.1}°",
            self.sent, cmd.yaw, cmd.pitch, cmd.roll
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LoggingActuator"
    }
}

/// What the controller is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Following the primary target
    Tracking,
    /// No target; keeping the last gaze direction
    Hold,
    /// Returning to, or resting at, the neutral pose
    Neutral,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tracking => "TRACKING",
            Self::Hold => "HOLD",
            Self::Neutral => "NEUTRAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GazeState {
    /// Nothing seen since start
    Idle,
    Following { last_seen: Instant },
    Returning { started: Instant, from: JointCommand },
    AtNeutral,
}

/// Result of one control tick
#[derive(Debug, Clone)]
pub struct ControlOutput {
    /// Safe command for the actuator
    pub command: JointCommand,
    /// Everything clamped on the way, gaze clamp and final filter
    pub violations: Vec<Violation>,
    pub mode: ControlMode,
    /// Primary target followed this tick
    pub primary: Option<u64>,
    /// Live tracks in the snapshot read this tick
    pub track_count: usize,
}

/// Counters reported when the control loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlStats {
    pub ticks: u64,
    pub commands_sent: u64,
    pub actuator_errors: u64,
    pub state_read_failures: u64,
    pub violations: u64,
    pub neutral_returns: u64,
}

/// Tuning for the control loop
#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub tick_period: Duration,
    pub progress_per_tick: f64,
    pub easing: Easing,
    pub face_lost_grace: Duration,
    pub return_to_neutral: Duration,
    /// A snapshot older than this no longer counts as a sighting
    pub target_stale_after: Duration,
    pub limits: SafetyLimits,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ControlSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_period: config.control.tick_period(),
            progress_per_tick: config.control.progress_per_tick,
            easing: config.control.easing(),
            face_lost_grace: config.control.face_lost_grace(),
            return_to_neutral: config.control.return_to_neutral(),
            target_stale_after: config.tracker.track_timeout(),
            limits: config.safety,
        }
    }

    /// Ticks per second, at least one
    #[must_use]
    pub fn ticks_per_second(&self) -> u64 {
        let secs = self.tick_period.as_secs_f64();
        if secs > 0.0 {
            ((1.0 / secs).round() as u64).max(1)
        } else {
            1
        }
    }
}

/// Gaze and safety pipeline driven at a fixed rate
pub struct ControlLoop {
    settings: ControlSettings,
    cell: Arc<SnapshotCell>,
    filter: Box<dyn TargetFilter>,
    safety: SafetyFilter,
    tracking_enabled: Arc<AtomicBool>,
    was_enabled: bool,
    state: GazeState,
    filtered_id: Option<u64>,
    /// Filter output for the snapshot sequence it was computed from
    filtered_position: Option<(u64, Position3D)>,
    last_command: JointCommand,
    stats: ControlStats,
}

impl ControlLoop {
    #[must_use]
    pub fn new(settings: ControlSettings, cell: Arc<SnapshotCell>, filter: Box<dyn TargetFilter>) -> Self {
        let safety = SafetyFilter::new(settings.limits);
        Self {
            settings,
            cell,
            filter,
            safety,
            tracking_enabled: Arc::new(AtomicBool::new(true)),
            was_enabled: true,
            state: GazeState::Idle,
            filtered_id: None,
            filtered_position: None,
            last_command: JointCommand::neutral(),
            stats: ControlStats::default(),
        }
    }

    /// Control loop that follows the raw estimated position
    #[must_use]
    pub fn unfiltered(settings: ControlSettings, cell: Arc<SnapshotCell>) -> Self {
        Self::new(settings, cell, Box::new(NoFilter))
    }

    /// Shared switch for head tracking; clearing it sends the head back to
    /// neutral once the grace period has passed
    #[must_use]
    pub fn tracking_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.tracking_enabled)
    }

    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.tracking_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Compute the command for one tick
    pub fn tick(&mut self, now: Instant, joint_state: Option<JointState>) -> ControlOutput {
        self.stats.ticks += 1;
        if joint_state.is_none() {
            self.stats.state_read_failures += 1;
        }

        let enabled = self.tracking_enabled.load(Ordering::SeqCst);
        if self.was_enabled && !enabled {
            info!("Head tracking disabled, returning to neutral after the grace period");
            if let GazeState::Following { .. } = self.state {
                // Grace restarts from the moment tracking was switched off
                self.state = GazeState::Following { last_seen: now };
            }
            self.forget_target();
        } else if !self.was_enabled && enabled {
            info!("Head tracking enabled");
        }
        self.was_enabled = enabled;

        let current = joint_state.map_or(self.last_command, |s| s.head());
        let body_yaw = joint_state.map_or(0.0, |s| s.body_yaw);

        let snapshot = self.cell.latest();
        // Only a primary matched in the latest batch counts as seen
        let primary = if enabled {
            snapshot.primary_target().filter(|t| {
                t.track.last_seen >= snapshot.timestamp && t.track.age(now) <= self.settings.target_stale_after
            })
        } else {
            None
        };

        let (command, mut violations, mode) = if let Some(target) = primary {
            if self.filtered_id != Some(target.id()) {
                debug!("Primary target is now {}", target.id());
                self.forget_target();
                self.filtered_id = Some(target.id());
            }
            self.state = GazeState::Following {
                last_seen: target.track.last_seen,
            };

            let position = match self.filtered_position {
                Some((sequence, position)) if sequence == snapshot.sequence => position,
                _ => {
                    let position = self.filter.apply(target.position);
                    self.filtered_position = Some((snapshot.sequence, position));
                    position
                }
            };
            let (command, violations) = look_at_with_report(
                position.to_gaze_frame(),
                &current,
                body_yaw,
                self.settings.progress_per_tick,
                self.settings.easing,
                &self.settings.limits,
            );
            (command, violations, ControlMode::Tracking)
        } else {
            let (command, mode) = self.without_target(now);
            (command, Vec::new(), mode)
        };

        let (command, filtered) = self.safety.enforce(command);
        violations.extend(filtered);
        self.stats.violations += violations.len() as u64;
        self.last_command = command;

        ControlOutput {
            command,
            violations,
            mode,
            primary: primary.map(|t| t.id()),
            track_count: snapshot.track_count(),
        }
    }

    fn forget_target(&mut self) {
        self.filter.reset();
        self.filtered_id = None;
        self.filtered_position = None;
    }

    fn begin_return(&mut self, now: Instant) {
        debug!(
            "Returning to neutral from yaw={:.1}°, pitch={:.1}°",
            self.last_command.yaw, self.last_command.pitch
        );
        self.state = GazeState::Returning {
            started: now,
            from: self.last_command,
        };
    }

    fn without_target(&mut self, now: Instant) -> (JointCommand, ControlMode) {
        if let GazeState::Following { last_seen } = self.state {
            if now.saturating_duration_since(last_seen) < self.settings.face_lost_grace {
                return (self.last_command, ControlMode::Hold);
            }
            self.forget_target();
            self.begin_return(now);
        }

        match self.state {
            GazeState::Idle | GazeState::Following { .. } => (self.last_command, ControlMode::Hold),
            GazeState::Returning { started, from } => {
                let total = self.settings.return_to_neutral.as_secs_f64();
                let elapsed = now.saturating_duration_since(started).as_secs_f64();
                let t = if total > 0.0 { (elapsed / total).min(1.0) } else { 1.0 };
                let command = interpolate_pose(&from, &JointCommand::neutral(), t, self.settings.easing);
                if t >= 1.0 {
                    info!("Reached neutral pose");
                    self.stats.neutral_returns += 1;
                    self.state = GazeState::AtNeutral;
                }
                (command, ControlMode::Neutral)
            }
            GazeState::AtNeutral => (JointCommand::neutral(), ControlMode::Neutral),
        }
    }

    /// Safe neutral command sent when the loop stops
    pub fn stop_command(&mut self) -> JointCommand {
        let neutral = JointCommand::neutral().with_duration(self.settings.return_to_neutral.as_secs_f64());
        let (command, _) = self.safety.enforce(neutral);
        self.last_command = command;
        self.state = GazeState::AtNeutral;
        command
    }

    fn dispatch(&mut self, cmd: &JointCommand, source: &mut dyn JointStateSource, actuator: &mut dyn Actuator) {
        match actuator.send(cmd) {
            Ok(()) => {
                self.stats.commands_sent += 1;
                source.observe_command(cmd);
            }
            Err(e) => {
                self.stats.actuator_errors += 1;
                warn!("{} rejected command: {}", actuator.name(), e);
            }
        }
    }

    /// Tick at the configured rate until stopped, then command neutral
    pub fn run(&mut self, source: &mut dyn JointStateSource, actuator: &mut dyn Actuator, stop: &StopHandle) -> ControlStats {
        let period = self.settings.tick_period;
        let report_every = self.settings.ticks_per_second();
        info!(
            "Control loop started at {} Hz with {} easing",
            report_every,
            self.settings.easing.name()
        );

        let mut next_tick = Instant::now();
        while !stop.is_stopped() {
            let now = Instant::now();
            let state = source.read();
            let output = self.tick(now, state);
            self.dispatch(&output.command, source, actuator);

            if self.stats.ticks % report_every == 0 {
                info!(
                    "{} yaw={:.1}° pitch={:.1}° roll={:.1}° tracks={} primary={:?} confidence=[{}]",
                    output.mode,
                    output.command.yaw,
                    output.command.pitch,
                    output.command.roll,
                    output.track_count,
                    output.primary,
                    format_confidences(&self.cell.latest().confidences())
                );
            }

            next_tick += period;
            let after = Instant::now();
            if next_tick > after {
                std::thread::sleep(next_tick - after);
            } else {
                // Overran; do not try to catch up
                next_tick = after;
            }
        }

        let neutral = self.stop_command();
        self.dispatch(&neutral, source, actuator);
        info!(
            "Control loop stopped after {} ticks, {} safety violations",
            self.stats.ticks, self.stats.violations
        );
        self.stats.clone()
    }

    #[must_use]
    pub const fn stats(&self) -> &ControlStats {
        &self.stats
    }
}

/// `id:confidence` pairs for the diagnostics line
fn format_confidences(confidences: &[(u64, f64)]) -> String {
    confidences
        .iter()
        .map(|(id, confidence)| format!("{id}:{confidence:.2}"))
        .collect::<Vec<_>>()
        .join(", ")
}

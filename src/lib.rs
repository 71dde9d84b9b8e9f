//! Face gaze tracking library for a robot head.
//!
//! Turns per-frame face detections from an external detector into safe head
//! joint commands:
//! - A centroid tracker keeps a persistent id per face
//! - Each track gets a 3D position from a pinhole model
//! - One primary target is picked for the head to look at
//! - A look-at controller eases the head toward it inside a hard safety envelope
//!
//! The pipeline runs as two loops sharing one snapshot:
//! 1. The tracking loop consumes detection batches and publishes a complete
//!    [`snapshot::TrackingSnapshot`] per batch
//! 2. The control loop ticks at a fixed rate, reads the latest snapshot and
//!    emits one [`kinematics::JointCommand`] per tick
//!
//! # Examples
//!
//! ## Tracking and target selection
//!
//! ```
//! use face_gaze_tracker::{detection::Detection, tracker::{estimate_position, select_primary, TargetTracker}};
//! use std::time::{Duration, Instant};
//!
//! let now = Instant::now();
//! let mut tracker = TargetTracker::new(100.0, Duration::from_secs(2));
//! let tracks = tracker.update(&[Detection::new(295.0, 215.0, 50.0, 50.0, 0.9, now)], now);
//!
//! let primary = select_primary(&tracks, 640, 480);
//! assert_eq!(primary, Some(tracks[0].id));
//!
//! let position = estimate_position(&tracks[0], 640, 480, 60.0);
//! println!("Face at {:.2} m", position.z);
//! ```
//!
//! ## Looking at a target
//!
//! ```
//! use face_gaze_tracker::{geometry::Position3D, kinematics::{look_at, Easing, JointCommand}};
//!
//! let target = Position3D::new(0.0, 0.0, 1.5).to_gaze_frame();
//! let current = JointCommand::new(20.0, 0.0, 0.0);
//!
//! // Close half of the gap this tick
//! let next = look_at(target, &current, 0.0, 0.5, Easing::Linear);
//! assert!((next.yaw - 10.0).abs() < 1e-9);
//! ```
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use face_gaze_tracker::{
//!     config::Config,
//!     control::{EchoJointState, LoggingActuator},
//!     scheduler::Scheduler,
//! };
//!
//! # fn main() -> face_gaze_tracker::Result<()> {
//! let config = Config::default();
//! let (detections_tx, detections_rx) = crossbeam_channel::bounded(4);
//!
//! let scheduler = Scheduler::spawn(
//!     &config,
//!     detections_rx,
//!     Box::new(EchoJointState::new(0.0)),
//!     Box::new(LoggingActuator::new()),
//! )?;
//!
//! // Feed detection batches from the detector through `detections_tx`
//! drop(detections_tx);
//!
//! let stats = scheduler.shutdown()?;
//! println!("{} control ticks", stats.control.ticks);
//! # Ok(())
//! # }
//! ```

/// Face detections as delivered by the external detector
pub mod detection;

/// Centroid tracking, depth estimation and primary target selection
pub mod tracker;

/// Coordinate frames and angle helpers
pub mod geometry;

/// Smoothing filters for the primary target position
pub mod filters;

/// Look-at controller and pose interpolation
pub mod kinematics;

/// Hard joint limits and the final safety filter
pub mod safety;

/// Snapshot shared between the tracking and control loops
pub mod snapshot;

/// Detection-driven tracking loop
pub mod perception;

/// Fixed-rate control loop
pub mod control;

/// Thread management for both loops
pub mod scheduler;

/// Detection sources for the binary: replay files and a synthetic sweep
pub mod app;

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};

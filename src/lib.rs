#![forbid(unsafe_code)]

//! Recording, playback and noise-check core for the task recorder.
//!
//! [`AudioRecordingManager`] drives a single record-review-submit session
//! over any [`AudioRecorder`] and [`AudioPlayer`]; [`AppController`] wires
//! configuration, logging and clip storage into the concrete adapters.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testing;

pub use app::{run_noise_check, AppController, AudioRecordingManager};
pub use domain::{
    AppConfig, DomainError, DurationPolicy, NoiseCheckOutcome, RecordingSession, SessionPhase,
};
pub use ports::{AudioPlayer, AudioRecorder, CameraController, NoiseDetector};

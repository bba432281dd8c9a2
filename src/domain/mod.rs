pub mod config;
pub mod error;
pub mod noise;
pub mod playback;
pub mod recording;

pub use config::{
    AppConfig, LoggingConfig, NoiseConfig, PlaybackConfig, RecordingConfig, StorageConfig,
};
pub use error::DomainError;
pub use noise::{DecibelMeter, NoiseCheckOutcome};
pub use recording::{ClipVerdict, DurationPolicy, RecordingSession, SessionPhase};

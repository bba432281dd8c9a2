use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::DomainError;

/// Port for microphone recording into clip files.
///
/// Clips are written to temporary storage first and only become durable
/// through [`AudioRecorder::move_to_permanent_storage`].
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    /// Live recording flag.
    fn is_recording(&self) -> watch::Receiver<bool>;

    /// Live recording duration in milliseconds, updated while recording and
    /// set to the final value on stop.
    fn recording_duration(&self) -> watch::Receiver<u64>;

    /// Start capturing into a fresh temporary file.
    async fn start_recording(&self) -> Result<(), DomainError>;

    /// Stop capturing and return the temporary file path.
    ///
    /// Captures under the native floor are deleted and reported as
    /// [`DomainError::RecordingTooShort`].
    async fn stop_recording(&self) -> Result<PathBuf, DomainError>;

    /// Whether microphone access is currently granted.
    async fn has_permission(&self) -> bool;

    /// Ask for microphone access, returning whether it is granted.
    async fn request_permission(&self) -> bool;

    /// Copy a temporary clip into permanent storage and delete the original.
    ///
    /// Returns `None` on any I/O failure.
    fn move_to_permanent_storage(&self, temp_path: &Path) -> Option<PathBuf>;

    /// Best-effort delete of a temporary clip.
    fn delete_temp_file(&self, path: Option<&Path>);
}

/// Port for clip playback.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    fn is_playing(&self) -> watch::Receiver<bool>;

    /// Last published playhead position in milliseconds.
    fn current_position(&self) -> watch::Receiver<u64>;

    /// Duration of the loaded clip in milliseconds (0 before the first play).
    fn duration(&self) -> watch::Receiver<u64>;

    /// Play `path`, reusing the loaded clip when resuming the same file.
    async fn play(&self, path: &Path) -> Result<(), DomainError>;

    /// Pause without releasing the loaded clip.
    async fn pause(&self);

    /// Release the loaded clip and reset the position.
    async fn stop(&self);

    /// Move the playhead; the published position changes immediately.
    async fn seek_to(&self, position_ms: u64);

    /// Synchronous read of the native playhead.
    fn position_ms(&self) -> u64;

    fn duration_ms(&self) -> u64 {
        *self.duration().borrow()
    }
}

/// Port for ambient noise measurement on the 0–60 dB gauge scale.
#[async_trait]
pub trait NoiseDetector: Send + Sync {
    /// Most recent reading.
    fn current_decibel(&self) -> watch::Receiver<f32>;

    /// Mean of the retained readings.
    fn average_decibel(&self) -> watch::Receiver<f32>;

    /// Open the capture stream and start sampling.
    async fn start_measuring(&self) -> Result<(), DomainError>;

    /// Stop sampling and release the capture stream. Idempotent.
    async fn stop_measuring(&self);

    async fn has_permission(&self) -> bool;

    async fn request_permission(&self) -> bool;
}

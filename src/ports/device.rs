//! Narrow seams over the native audio and camera drivers.
//!
//! The capability adapters own all contract logic (file naming, timing,
//! floors, observables); implementations of these traits only talk to the
//! platform.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Native microphone capture that encodes into a clip file.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// File extension of the clips this device writes, without the dot.
    fn clip_extension(&self) -> &'static str;

    /// Prepare and start capturing into `path`.
    async fn begin(&self, path: &Path) -> Result<(), DomainError>;

    /// Stop capturing.
    ///
    /// With `finalize` false the capture is only released and the file may be
    /// left incomplete or missing.
    async fn finish(&self, finalize: bool) -> Result<(), DomainError>;

    fn has_permission(&self) -> bool;

    fn request_permission(&self) -> bool {
        self.has_permission()
    }
}

/// Raw 16-bit mono PCM input used for metering.
#[async_trait]
pub trait PcmSource: Send + Sync {
    async fn open(&self) -> Result<(), DomainError>;

    /// Move up to `buf.len()` buffered samples into `buf` without blocking.
    fn read(&self, buf: &mut [i16]) -> usize;

    async fn close(&self);

    /// Preferred read size in samples.
    fn frame_len(&self) -> usize;

    fn has_permission(&self) -> bool;

    fn request_permission(&self) -> bool {
        self.has_permission()
    }
}

/// Called once when a clip plays to its natural end.
pub type CompletionCallback = Box<dyn Fn() + Send + Sync>;

/// Native decoder/output for a single clip.
pub trait PlaybackDevice: Send + Sync {
    /// Load `path` and return a paused handle.
    fn open(
        &self,
        path: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn PlaybackHandle>, DomainError>;
}

/// A loaded clip. Dropping the handle releases the output.
pub trait PlaybackHandle: Send {
    fn duration_ms(&self) -> u64;

    fn start(&self) -> Result<(), DomainError>;

    fn pause(&self);

    fn seek(&self, position_ms: u64);

    fn position_ms(&self) -> u64;
}

/// Native still-image capture.
#[async_trait]
pub trait StillCaptureDevice: Send + Sync {
    /// Capture one frame encoded as JPEG.
    async fn capture_jpeg(&self) -> Result<Vec<u8>, DomainError>;

    fn has_permission(&self) -> bool;

    fn request_permission(&self) -> bool {
        self.has_permission()
    }
}

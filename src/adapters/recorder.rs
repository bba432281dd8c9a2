use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::adapters::ClipStorage;
use crate::domain::{DomainError, RecordingConfig};
use crate::infrastructure::PollTask;
use crate::ports::{AudioRecorder, CaptureDevice};

/// A capture in progress.
struct ActiveCapture {
    path: PathBuf,
    started: Instant,
    _ticker: PollTask,
}

/// [`AudioRecorder`] over a native [`CaptureDevice`].
///
/// Owns the clip file lifecycle and the live duration; the device only
/// starts and stops the encoder.
pub struct ClipRecorder<D: CaptureDevice> {
    device: D,
    storage: Arc<ClipStorage>,
    native_floor: Duration,
    tick: Duration,
    is_recording: Arc<watch::Sender<bool>>,
    duration_ms: Arc<watch::Sender<u64>>,
    active: Mutex<Option<ActiveCapture>>,
}

impl<D: CaptureDevice> ClipRecorder<D> {
    pub fn new(device: D, storage: Arc<ClipStorage>, config: &RecordingConfig) -> Self {
        let (is_recording, _) = watch::channel(false);
        let (duration_ms, _) = watch::channel(0);
        Self {
            device,
            storage,
            native_floor: Duration::from_millis(config.native_floor_ms),
            tick: config.duration_tick(),
            is_recording: Arc::new(is_recording),
            duration_ms: Arc::new(duration_ms),
            active: Mutex::new(None),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn storage(&self) -> &ClipStorage {
        &self.storage
    }

    /// Publish `now - started` every tick until recording stops.
    fn spawn_ticker(&self, started: Instant) -> PollTask {
        let is_recording = Arc::clone(&self.is_recording);
        let duration_ms = Arc::clone(&self.duration_ms);
        let tick = self.tick;

        PollTask::spawn(move |live| async move {
            loop {
                if !*is_recording.borrow() {
                    break;
                }
                let elapsed = started.elapsed().as_millis() as u64;
                let published = duration_ms.send_if_modified(|d| {
                    if !live.is_alive() {
                        return false;
                    }
                    *d = elapsed;
                    true
                });
                if !published {
                    break;
                }
                tokio::time::sleep(tick).await;
            }
        })
    }

    /// Release a capture that is being replaced, dropping its clip.
    async fn release(&self, capture: ActiveCapture) {
        if let Err(e) = self.device.finish(false).await {
            debug!(error = %e, "Native release failed");
        }
        self.storage.discard(Some(&capture.path));
    }
}

#[async_trait]
impl<D: CaptureDevice> AudioRecorder for ClipRecorder<D> {
    fn is_recording(&self) -> watch::Receiver<bool> {
        self.is_recording.subscribe()
    }

    fn recording_duration(&self) -> watch::Receiver<u64> {
        self.duration_ms.subscribe()
    }

    async fn start_recording(&self) -> Result<(), DomainError> {
        let mut active = self.active.lock().await;

        // Allocated while the previous clip still exists so the names differ.
        let path = self.storage.allocate_temp_clip(self.device.clip_extension())?;

        if let Some(previous) = active.take() {
            warn!(path = ?previous.path, "Recording already active, releasing previous capture");
            self.release(previous).await;
        }

        if let Err(e) = self.device.begin(&path).await {
            error!(error = %e, "Failed to start recording");
            self.storage.discard(Some(&path));
            self.is_recording.send_replace(false);
            return Err(e);
        }

        let started = Instant::now();
        self.duration_ms.send_replace(0);
        self.is_recording.send_replace(true);

        *active = Some(ActiveCapture {
            path: path.clone(),
            started,
            _ticker: self.spawn_ticker(started),
        });

        info!(path = ?path, "Recording started");
        Ok(())
    }

    async fn stop_recording(&self) -> Result<PathBuf, DomainError> {
        let Some(capture) = self.active.lock().await.take() else {
            return Err(DomainError::AudioNotRecording);
        };
        let ActiveCapture {
            path,
            started,
            _ticker: ticker,
        } = capture;
        ticker.cancel();

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        self.duration_ms.send_replace(elapsed_ms);
        self.is_recording.send_replace(false);

        let long_enough = elapsed >= self.native_floor;

        // The clip is released either way; a failing native stop is not
        // actionable.
        if let Err(e) = self.device.finish(long_enough).await {
            debug!(error = %e, "Native stop failed");
        }

        if !long_enough {
            info!(duration_ms = elapsed_ms, "Recording below native floor, discarded");
            self.storage.discard(Some(&path));
            return Err(DomainError::RecordingTooShort);
        }

        info!(path = ?path, duration_ms = elapsed_ms, "Recording stopped");
        Ok(path)
    }

    async fn has_permission(&self) -> bool {
        self.device.has_permission()
    }

    async fn request_permission(&self) -> bool {
        self.device.request_permission()
    }

    fn move_to_permanent_storage(&self, temp_path: &Path) -> Option<PathBuf> {
        self.storage.promote(temp_path)
    }

    fn delete_temp_file(&self, path: Option<&Path>) {
        self.storage.discard(path);
    }
}

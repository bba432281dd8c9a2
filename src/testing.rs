//! In-memory device fakes shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::adapters::ClipStorage;
use crate::domain::DomainError;
use crate::ports::{
    AudioRecorder, CaptureDevice, CompletionCallback, PcmSource, PlaybackDevice, PlaybackHandle,
    StillCaptureDevice,
};

pub(crate) fn temp_storage() -> (tempfile::TempDir, Arc<ClipStorage>) {
    let root = tempfile::tempdir().unwrap();
    let storage = ClipStorage::new(root.path().join("cache/temp_recordings"), root.path().join("data"));
    (root, Arc::new(storage))
}

fn device_error(message: &str) -> DomainError {
    DomainError::AudioDevice {
        message: message.to_string(),
    }
}

/// Writes a placeholder file on `begin` and records every `finish`.
#[derive(Default)]
pub(crate) struct FakeCaptureDevice {
    begin_error: Mutex<Option<String>>,
    finish_fails: AtomicBool,
    denied: AtomicBool,
    finishes: Mutex<Vec<bool>>,
    current: Mutex<Option<PathBuf>>,
}

impl FakeCaptureDevice {
    pub fn fail_begin(&self, message: &str) {
        *self.begin_error.lock() = Some(message.to_string());
    }

    pub fn fail_finish(&self) {
        self.finish_fails.store(true, Ordering::SeqCst);
    }

    pub fn deny_permission(&self) {
        self.denied.store(true, Ordering::SeqCst);
    }

    pub fn finishes(&self) -> Vec<bool> {
        self.finishes.lock().clone()
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl CaptureDevice for FakeCaptureDevice {
    fn clip_extension(&self) -> &'static str {
        "wav"
    }

    async fn begin(&self, path: &Path) -> Result<(), DomainError> {
        if let Some(message) = self.begin_error.lock().clone() {
            return Err(device_error(&message));
        }
        std::fs::write(path, b"RIFF")?;
        *self.current.lock() = Some(path.to_path_buf());
        Ok(())
    }

    async fn finish(&self, finalize: bool) -> Result<(), DomainError> {
        self.finishes.lock().push(finalize);
        if self.finish_fails.load(Ordering::SeqCst) {
            return Err(device_error("stop failed"));
        }
        Ok(())
    }

    fn has_permission(&self) -> bool {
        !self.denied.load(Ordering::SeqCst)
    }
}

/// A clip whose playhead advances with tokio time.
struct FakeClip {
    duration_ms: u64,
    base_ms: u64,
    started: Option<Instant>,
    on_complete: CompletionCallback,
}

impl FakeClip {
    fn position_ms(&self) -> u64 {
        let running = self
            .started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_ms + running).min(self.duration_ms)
    }
}

pub(crate) struct FakePlaybackDevice {
    clip_ms: u64,
    opens: AtomicU32,
    open_error: Mutex<Option<String>>,
    seeks: Arc<Mutex<Vec<u64>>>,
    current: Mutex<Option<Arc<Mutex<FakeClip>>>>,
}

impl FakePlaybackDevice {
    pub fn with_clip_ms(clip_ms: u64) -> Self {
        Self {
            clip_ms,
            opens: AtomicU32::new(0),
            open_error: Mutex::new(None),
            seeks: Arc::new(Mutex::new(Vec::new())),
            current: Mutex::new(None),
        }
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().clone()
    }

    pub fn fail_open(&self, message: &str) {
        *self.open_error.lock() = Some(message.to_string());
    }

    /// Play the current clip to its natural end.
    pub fn complete(&self) {
        let Some(clip) = self.current.lock().clone() else {
            return;
        };
        let mut clip = clip.lock();
        clip.base_ms = clip.duration_ms;
        clip.started = None;
        (clip.on_complete)();
    }
}

impl PlaybackDevice for FakePlaybackDevice {
    fn open(
        &self,
        _path: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn PlaybackHandle>, DomainError> {
        if let Some(message) = self.open_error.lock().clone() {
            return Err(DomainError::Playback(message));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let clip = Arc::new(Mutex::new(FakeClip {
            duration_ms: self.clip_ms,
            base_ms: 0,
            started: None,
            on_complete,
        }));
        *self.current.lock() = Some(Arc::clone(&clip));

        Ok(Box::new(FakePlaybackHandle {
            clip,
            seeks: Arc::clone(&self.seeks),
        }))
    }
}

struct FakePlaybackHandle {
    clip: Arc<Mutex<FakeClip>>,
    seeks: Arc<Mutex<Vec<u64>>>,
}

impl PlaybackHandle for FakePlaybackHandle {
    fn duration_ms(&self) -> u64 {
        self.clip.lock().duration_ms
    }

    fn start(&self) -> Result<(), DomainError> {
        let mut clip = self.clip.lock();
        if clip.started.is_none() {
            clip.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut clip = self.clip.lock();
        clip.base_ms = clip.position_ms();
        clip.started = None;
    }

    fn seek(&self, position_ms: u64) {
        self.seeks.lock().push(position_ms);
        let mut clip = self.clip.lock();
        clip.base_ms = position_ms.min(clip.duration_ms);
        if clip.started.is_some() {
            clip.started = Some(Instant::now());
        }
    }

    fn position_ms(&self) -> u64 {
        self.clip.lock().position_ms()
    }
}

/// Square wave PCM at a settable amplitude.
pub(crate) struct FakePcmSource {
    amplitude: AtomicI32,
    open: AtomicBool,
    opens: AtomicU32,
    closes: AtomicU32,
    open_error: Mutex<Option<String>>,
}

impl FakePcmSource {
    pub fn with_amplitude(amplitude: i16) -> Self {
        Self {
            amplitude: AtomicI32::new(amplitude as i32),
            open: AtomicBool::new(false),
            opens: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            open_error: Mutex::new(None),
        }
    }

    pub fn set_amplitude(&self, amplitude: i16) {
        self.amplitude.store(amplitude as i32, Ordering::SeqCst);
    }

    pub fn fail_open(&self, message: &str) {
        *self.open_error.lock() = Some(message.to_string());
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PcmSource for FakePcmSource {
    async fn open(&self) -> Result<(), DomainError> {
        if let Some(message) = self.open_error.lock().clone() {
            return Err(device_error(&message));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, buf: &mut [i16]) -> usize {
        if !self.is_open() {
            return 0;
        }
        let amplitude = self.amplitude.load(Ordering::SeqCst) as i16;
        for (i, sample) in buf.iter_mut().enumerate() {
            *sample = if i % 2 == 0 { amplitude } else { -amplitude };
        }
        buf.len()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }

    fn frame_len(&self) -> usize {
        160
    }

    fn has_permission(&self) -> bool {
        true
    }
}

pub(crate) struct FakeStillDevice {
    frame: Vec<u8>,
    error: Mutex<Option<String>>,
}

impl FakeStillDevice {
    pub fn with_frame(frame: Vec<u8>) -> Self {
        Self {
            frame,
            error: Mutex::new(None),
        }
    }

    pub fn fail(&self, message: &str) {
        *self.error.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl StillCaptureDevice for FakeStillDevice {
    async fn capture_jpeg(&self) -> Result<Vec<u8>, DomainError> {
        if let Some(message) = self.error.lock().clone() {
            return Err(DomainError::Camera(message));
        }
        Ok(self.frame.clone())
    }

    fn has_permission(&self) -> bool {
        true
    }
}

/// Records every temp-file deletion before delegating.
pub(crate) struct CountingRecorder<R> {
    inner: R,
    deletions: Mutex<Vec<Option<PathBuf>>>,
}

impl<R> CountingRecorder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            deletions: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn deletions(&self) -> Vec<Option<PathBuf>> {
        self.deletions.lock().clone()
    }
}

#[async_trait]
impl<R: AudioRecorder> AudioRecorder for CountingRecorder<R> {
    fn is_recording(&self) -> watch::Receiver<bool> {
        self.inner.is_recording()
    }

    fn recording_duration(&self) -> watch::Receiver<u64> {
        self.inner.recording_duration()
    }

    async fn start_recording(&self) -> Result<(), DomainError> {
        self.inner.start_recording().await
    }

    async fn stop_recording(&self) -> Result<PathBuf, DomainError> {
        self.inner.stop_recording().await
    }

    async fn has_permission(&self) -> bool {
        self.inner.has_permission().await
    }

    async fn request_permission(&self) -> bool {
        self.inner.request_permission().await
    }

    fn move_to_permanent_storage(&self, temp_path: &Path) -> Option<PathBuf> {
        self.inner.move_to_permanent_storage(temp_path)
    }

    fn delete_temp_file(&self, path: Option<&Path>) {
        self.deletions.lock().push(path.map(Path::to_path_buf));
        self.inner.delete_temp_file(path);
    }
}

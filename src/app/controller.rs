use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{ClipPlayer, ClipRecorder, ClipStorage, PcmNoiseDetector, StillCamera, TomlConfigStore};
use crate::app::{run_noise_check, AudioRecordingManager};
use crate::domain::{AppConfig, DomainError, NoiseCheckOutcome};
use crate::infrastructure::init_logging;
use crate::ports::{
    AudioPlayer, AudioRecorder, CaptureDevice, ConfigStore, NoiseDetector, PcmSource,
    PlaybackDevice, StillCaptureDevice,
};

#[cfg(feature = "desktop")]
use crate::adapters::{CpalCaptureDevice, CpalPcmSource, CpalPlaybackDevice};

/// Recording manager over the cpal desktop devices.
#[cfg(feature = "desktop")]
pub type DesktopRecordingManager =
    AudioRecordingManager<ClipRecorder<CpalCaptureDevice>, ClipPlayer<CpalPlaybackDevice>>;

/// Application controller that owns configuration, logging and clip storage,
/// and wires capability adapters from them.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    storage: RwLock<Arc<ClipStorage>>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize from the OS application directories.
    pub fn new() -> Result<Self, DomainError> {
        Self::with_store(TomlConfigStore::new()?)
    }

    /// Initialize from an explicit config store.
    pub fn with_store(config_store: TomlConfigStore) -> Result<Self, DomainError> {
        let config = config_store.load()?;

        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!("TaskRecorder starting up");

        let storage = ClipStorage::from_config(&config.storage, &config_store);

        info!(
            temp_dir = ?storage.temp_dir(),
            recordings_dir = ?storage.recordings_dir(),
            "AppController initialized"
        );

        Ok(Self {
            config: RwLock::new(config),
            config_store: Arc::new(config_store),
            storage: RwLock::new(Arc::new(storage)),
            _log_guard: log_guard,
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Persist a new configuration. Adapters built afterwards use it.
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        self.config_store.save(&config)?;

        let storage = ClipStorage::from_config(&config.storage, self.config_store.as_ref());
        *self.storage.write() = Arc::new(storage);
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    pub fn storage(&self) -> Arc<ClipStorage> {
        Arc::clone(&self.storage.read())
    }

    pub fn recorder<D: CaptureDevice>(&self, device: D) -> ClipRecorder<D> {
        ClipRecorder::new(device, self.storage(), &self.config.read().recording)
    }

    pub fn player<D: PlaybackDevice>(&self, device: D) -> ClipPlayer<D> {
        ClipPlayer::new(device)
    }

    pub fn noise_detector<S: PcmSource + 'static>(&self, source: S) -> PcmNoiseDetector<S> {
        PcmNoiseDetector::new(source, &self.config.read().noise)
    }

    pub fn camera<D: StillCaptureDevice>(&self, device: D) -> StillCamera<D> {
        StillCamera::new(device, self.storage())
    }

    pub fn recording_manager<R, P>(&self, recorder: Arc<R>, player: Arc<P>) -> AudioRecordingManager<R, P>
    where
        R: AudioRecorder + 'static,
        P: AudioPlayer + 'static,
    {
        let config = self.config.read();
        AudioRecordingManager::with_config(recorder, player, &config.recording, &config.playback)
    }

    /// Run the timed noise check with the configured window and ceiling.
    pub async fn noise_check<N>(&self, detector: &N) -> Result<NoiseCheckOutcome, DomainError>
    where
        N: NoiseDetector + ?Sized,
    {
        let noise = self.config.read().noise.clone();
        run_noise_check(detector, &noise).await
    }

    /// Recording manager over the default microphone and speakers.
    #[cfg(feature = "desktop")]
    pub fn desktop_recording_manager(&self) -> Result<DesktopRecordingManager, DomainError> {
        let buffer_secs = self.config.read().recording.capture_buffer_secs;
        let recorder = self.recorder(CpalCaptureDevice::new(buffer_secs)?);
        let player = self.player(CpalPlaybackDevice::new());
        Ok(self.recording_manager(Arc::new(recorder), Arc::new(player)))
    }

    /// Noise detector over the default microphone.
    #[cfg(feature = "desktop")]
    pub fn desktop_noise_detector(&self) -> Result<PcmNoiseDetector<CpalPcmSource>, DomainError> {
        Ok(self.noise_detector(CpalPcmSource::new()?))
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> String {
        self.config_store.data_dir().to_string_lossy().to_string()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> String {
        self.config_store.logs_dir().to_string_lossy().to_string()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> String {
        self.config_store.config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CameraController;
    use crate::testing::{FakeCaptureDevice, FakePcmSource, FakePlaybackDevice, FakeStillDevice};
    use std::time::Duration;

    fn controller() -> (tempfile::TempDir, AppController) {
        let root = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_dirs(
            root.path().join("config"),
            root.path().join("data"),
            root.path().join("cache"),
        )
        .unwrap();
        let controller = AppController::with_store(store).unwrap();
        (root, controller)
    }

    #[test]
    fn test_startup_writes_default_config() {
        let (root, controller) = controller();

        assert!(root.path().join("config/config.toml").is_file());
        assert_eq!(controller.config().recording.max_clip_secs, 20);
        assert_eq!(
            controller.storage().temp_dir(),
            root.path().join("cache/temp_recordings")
        );
        assert!(controller.logs_dir().ends_with("logs"));
    }

    #[test]
    fn test_update_config_persists_and_relocates_storage() {
        let (root, controller) = controller();

        let mut config = controller.config();
        config.storage.data_dir = Some(root.path().join("archive"));
        config.recording.min_clip_secs = 3;
        controller.update_config(config).unwrap();

        assert_eq!(
            controller.storage().recordings_dir(),
            root.path().join("archive/Recordings")
        );

        let reloaded = TomlConfigStore::with_dirs(
            root.path().join("config"),
            root.path().join("data"),
            root.path().join("cache"),
        )
        .unwrap()
        .load()
        .unwrap();
        assert_eq!(reloaded.recording.min_clip_secs, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wired_manager_uses_configured_policy() {
        let (_root, controller) = controller();
        let mut config = controller.config();
        config.recording.min_clip_secs = 2;
        controller.update_config(config).unwrap();

        let recorder = Arc::new(controller.recorder(FakeCaptureDevice::default()));
        let player = Arc::new(controller.player(FakePlaybackDevice::with_clip_ms(3000)));
        let manager = controller.recording_manager(recorder, player);

        manager.start_recording().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        manager.stop_recording().await;

        let path = manager.state().audio_path.unwrap();
        assert!(path.starts_with(controller.storage().temp_dir()));

        let permanent = manager.move_to_permanent_storage().await.unwrap();
        assert!(permanent.starts_with(controller.storage().recordings_dir()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_check_and_camera_wiring() {
        let (_root, controller) = controller();

        let detector = controller.noise_detector(FakePcmSource::with_amplitude(10));
        let outcome = controller.noise_check(&detector).await.unwrap();
        assert!(outcome.passed);

        let camera = controller.camera(FakeStillDevice::with_frame(vec![0xFF, 0xD8]));
        let photo = camera.capture_photo().await.unwrap();
        assert!(photo.starts_with(controller.storage().photos_dir()));
    }
}

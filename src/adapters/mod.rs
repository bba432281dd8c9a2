#[cfg(feature = "desktop")]
pub mod audio_cpal;
pub mod camera;
pub mod config_store;
pub mod noise_meter;
pub mod player;
pub mod recorder;
pub mod storage;

#[cfg(feature = "desktop")]
pub use audio_cpal::{CpalCaptureDevice, CpalPcmSource, CpalPlaybackDevice};
pub use camera::StillCamera;
pub use config_store::TomlConfigStore;
pub use noise_meter::PcmNoiseDetector;
pub use player::ClipPlayer;
pub use recorder::ClipRecorder;
pub use storage::ClipStorage;

pub mod audio;
pub mod camera;
pub mod config;
pub mod device;

pub use audio::{AudioPlayer, AudioRecorder, NoiseDetector};
pub use camera::CameraController;
pub use config::ConfigStore;
pub use device::{
    CaptureDevice, CompletionCallback, PcmSource, PlaybackDevice, PlaybackHandle,
    StillCaptureDevice,
};

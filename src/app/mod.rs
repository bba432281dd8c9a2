mod controller;
mod noise_check;
mod recording_manager;

#[cfg(feature = "desktop")]
pub use controller::DesktopRecordingManager;
pub use controller::AppController;
pub use noise_check::run_noise_check;
pub use recording_manager::AudioRecordingManager;

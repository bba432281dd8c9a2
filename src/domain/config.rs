use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Storage location overrides.
///
/// When unset, clips live under the OS cache directory while recording and
/// under the OS data directory once promoted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for provisional recordings.
    pub temp_dir: Option<PathBuf>,
    /// Root for the `Recordings` and `Photos` folders.
    pub data_dir: Option<PathBuf>,
}

/// Recording policy and capture timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Shortest accepted clip in whole seconds.
    pub min_clip_secs: u64,
    /// Longest accepted clip in whole seconds.
    pub max_clip_secs: u64,
    /// Captures shorter than this are discarded by the recorder itself.
    pub native_floor_ms: u64,
    /// Interval of the live duration updates.
    pub duration_tick_ms: u64,
    /// Capacity of the desktop capture ring buffer in seconds.
    pub capture_buffer_secs: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_clip_secs: 10,
            max_clip_secs: 20,
            native_floor_ms: 1000,
            duration_tick_ms: 100,
            capture_buffer_secs: 120,
        }
    }
}

impl RecordingConfig {
    pub fn duration_tick(&self) -> Duration {
        Duration::from_millis(self.duration_tick_ms.max(1))
    }
}

/// Playback polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval of the position poll while playing.
    pub poll_interval_ms: u64,
    /// A position this close to the clip end counts as finished.
    pub end_tolerance_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            end_tolerance_ms: 30,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Noise test configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Interval between decibel readings.
    pub sample_interval_ms: u64,
    /// Number of readings kept for the rolling average (0 = unbounded).
    pub history_limit: usize,
    /// Length of the noise check window.
    pub test_duration_ms: u64,
    /// The check passes when the average stays below this level.
    pub max_average_db: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            history_limit: 100,
            test_duration_ms: 5000,
            max_average_db: 40.0,
        }
    }
}

impl NoiseConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_millis(self.test_duration_ms)
    }

    /// Retention limit for the rolling average, `None` when unbounded.
    pub fn history_capacity(&self) -> Option<usize> {
        (self.history_limit > 0).then_some(self.history_limit)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
    pub playback: PlaybackConfig,
    pub noise: NoiseConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

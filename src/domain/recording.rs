use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::RecordingConfig;

/// Snapshot of a recording session as shown to the UI.
///
/// The coordinator replaces the whole value on every update; nothing else
/// mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub is_recording: bool,
    pub recording_duration_ms: u64,
    /// Set only once a stopped recording passed duration validation.
    pub audio_path: Option<PathBuf>,
    pub is_playing: bool,
    pub playback_position_ms: u64,
    pub error_message: Option<String>,
}

impl RecordingSession {
    /// Return playback to the idle position.
    pub fn reset_playback(&mut self) {
        self.is_playing = false;
        self.playback_position_ms = 0;
    }

    /// Drop the current clip and every derived field, keeping only the
    /// live recording flag.
    pub fn clear_clip(&mut self) {
        self.audio_path = None;
        self.recording_duration_ms = 0;
        self.error_message = None;
        self.reset_playback();
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_recording {
            SessionPhase::Recording
        } else if self.is_playing {
            SessionPhase::Playing
        } else if self.audio_path.is_some() {
            if self.playback_position_ms > 0 {
                SessionPhase::Paused
            } else {
                SessionPhase::Recorded
            }
        } else if self.error_message.is_some() {
            SessionPhase::Rejected
        } else {
            SessionPhase::Idle
        }
    }
}

/// Coarse lifecycle position derived from a [`RecordingSession`].
///
/// ```text
/// Idle -> Recording -> (Rejected | Recorded) -> Playing <-> Paused
///   ^                                                         |
///   +---------------- record again / submit ------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Recording,
    /// The last attempt failed or was rejected; `error_message` says why.
    Rejected,
    Recorded,
    Playing,
    Paused,
}

/// Outcome of checking a finished clip against the [`DurationPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipVerdict {
    Accepted,
    TooShort,
    TooLong,
}

/// Business rule for accepted clip lengths, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            min_secs: 10,
            max_secs: 20,
        }
    }
}

impl From<&RecordingConfig> for DurationPolicy {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            min_secs: config.min_clip_secs,
            max_secs: config.max_clip_secs,
        }
    }
}

impl DurationPolicy {
    /// Classify a clip by its duration truncated to whole seconds.
    #[must_use]
    pub fn classify(&self, duration_ms: u64) -> ClipVerdict {
        let secs = duration_ms / 1000;
        if secs < self.min_secs {
            ClipVerdict::TooShort
        } else if secs > self.max_secs {
            ClipVerdict::TooLong
        } else {
            ClipVerdict::Accepted
        }
    }

    /// UI message for a rejected clip, `None` when accepted.
    pub fn rejection_message(&self, verdict: ClipVerdict) -> Option<String> {
        match verdict {
            ClipVerdict::Accepted => None,
            ClipVerdict::TooShort => Some(format!(
                "Recording too short (min {} s).",
                self.min_secs
            )),
            ClipVerdict::TooLong => Some(format!(
                "Recording too long (max {} s).",
                self.max_secs
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let policy = DurationPolicy::default();
        assert_eq!(policy.classify(0), ClipVerdict::TooShort);
        assert_eq!(policy.classify(9_999), ClipVerdict::TooShort);
        assert_eq!(policy.classify(10_000), ClipVerdict::Accepted);
        assert_eq!(policy.classify(15_500), ClipVerdict::Accepted);
        assert_eq!(policy.classify(20_999), ClipVerdict::Accepted); // truncates to 20 s
        assert_eq!(policy.classify(21_000), ClipVerdict::TooLong);
    }

    #[test]
    fn test_accepted_iff_within_bounds() {
        let policy = DurationPolicy::default();
        for d in (0..30_000).step_by(250) {
            let accepted = policy.classify(d) == ClipVerdict::Accepted;
            assert_eq!(accepted, (10..=20).contains(&(d / 1000)), "duration {d}");
        }
    }

    #[test]
    fn test_rejection_messages() {
        let policy = DurationPolicy::default();
        assert_eq!(policy.rejection_message(ClipVerdict::Accepted), None);
        assert_eq!(
            policy.rejection_message(ClipVerdict::TooShort).as_deref(),
            Some("Recording too short (min 10 s).")
        );
        assert_eq!(
            policy.rejection_message(ClipVerdict::TooLong).as_deref(),
            Some("Recording too long (max 20 s).")
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = RecordingConfig {
            min_clip_secs: 3,
            max_clip_secs: 8,
            ..Default::default()
        };
        let policy = DurationPolicy::from(&config);
        assert_eq!(policy.classify(2_900), ClipVerdict::TooShort);
        assert_eq!(policy.classify(8_900), ClipVerdict::Accepted);
    }

    #[test]
    fn test_clear_clip_keeps_recording_flag() {
        let mut session = RecordingSession {
            is_recording: true,
            recording_duration_ms: 1200,
            audio_path: Some(PathBuf::from("/tmp/a.wav")),
            is_playing: true,
            playback_position_ms: 400,
            error_message: Some("x".to_string()),
        };
        session.clear_clip();
        assert!(session.is_recording);
        assert_eq!(session.recording_duration_ms, 0);
        assert!(session.audio_path.is_none());
        assert!(!session.is_playing);
        assert_eq!(session.playback_position_ms, 0);
        assert!(session.error_message.is_none());
    }

    #[test]
    fn test_phase() {
        let mut session = RecordingSession::default();
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.error_message = Some("Recording too short (min 10 s).".to_string());
        assert_eq!(session.phase(), SessionPhase::Rejected);

        session.error_message = None;
        session.audio_path = Some(PathBuf::from("/tmp/a.wav"));
        assert_eq!(session.phase(), SessionPhase::Recorded);

        session.is_playing = true;
        assert_eq!(session.phase(), SessionPhase::Playing);

        session.is_playing = false;
        session.playback_position_ms = 900;
        assert_eq!(session.phase(), SessionPhase::Paused);
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = RecordingSession {
            recording_duration_ms: 12_000,
            audio_path: Some(PathBuf::from("/tmp/clip.wav")),
            ..Default::default()
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["recordingDurationMs"], 12_000);
        assert_eq!(json["audioPath"], "/tmp/clip.wav");
        assert_eq!(json["isPlaying"], false);
        assert!(json["errorMessage"].is_null());
    }
}

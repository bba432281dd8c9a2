use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::playback::is_at_end;
use crate::domain::{DurationPolicy, PlaybackConfig, RecordingConfig, RecordingSession};
use crate::infrastructure::{Liveness, PollTask};
use crate::ports::{AudioPlayer, AudioRecorder};

const START_FAILED: &str = "Failed to start recording";
const STOP_FAILED: &str = "Failed to stop recording";
const PLAY_FAILED: &str = "Failed to play recording";

/// Background loops owned by the manager. Dropping them cancels them.
#[derive(Default)]
struct SessionTasks {
    recording_mirror: Option<PollTask>,
    playback_poll: Option<PollTask>,
}

/// Apply `update` only while the owning loop is still alive.
fn publish(
    state: &watch::Sender<RecordingSession>,
    live: &Liveness,
    update: impl FnOnce(&mut RecordingSession),
) -> bool {
    state.send_if_modified(|session| {
        if !live.is_alive() {
            return false;
        }
        update(session);
        true
    })
}

fn is_playing(state: &watch::Sender<RecordingSession>) -> bool {
    state.borrow().is_playing
}

/// Coordinates one recorder and one player into a single observable
/// [`RecordingSession`].
///
/// Every operation is serialized; background loops mirror the recorder while
/// capturing and poll the player while playing.
pub struct AudioRecordingManager<R: AudioRecorder + 'static, P: AudioPlayer + 'static> {
    recorder: Arc<R>,
    player: Arc<P>,
    policy: DurationPolicy,
    playback: PlaybackConfig,
    state: Arc<watch::Sender<RecordingSession>>,
    tasks: Mutex<SessionTasks>,
    op_lock: Arc<tokio::sync::Mutex<()>>,
    cleaned_up: AtomicBool,
}

impl<R: AudioRecorder + 'static, P: AudioPlayer + 'static> AudioRecordingManager<R, P> {
    pub fn new(recorder: Arc<R>, player: Arc<P>) -> Self {
        Self::with_config(
            recorder,
            player,
            &RecordingConfig::default(),
            &PlaybackConfig::default(),
        )
    }

    pub fn with_config(
        recorder: Arc<R>,
        player: Arc<P>,
        recording: &RecordingConfig,
        playback: &PlaybackConfig,
    ) -> Self {
        let (state, _) = watch::channel(RecordingSession::default());
        Self {
            recorder,
            player,
            policy: DurationPolicy::from(recording),
            playback: playback.clone(),
            state: Arc::new(state),
            tasks: Mutex::new(SessionTasks::default()),
            op_lock: Arc::new(tokio::sync::Mutex::new(())),
            cleaned_up: AtomicBool::new(false),
        }
    }

    /// Current session snapshot.
    pub fn state(&self) -> RecordingSession {
        self.state.borrow().clone()
    }

    /// Receiver that sees every session update.
    pub fn subscribe(&self) -> watch::Receiver<RecordingSession> {
        self.state.subscribe()
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    fn update(&self, update: impl FnOnce(&mut RecordingSession)) {
        self.state.send_modify(update);
    }

    fn cancel_recording_mirror(&self) {
        let task = self.tasks.lock().recording_mirror.take();
        drop(task);
    }

    fn cancel_playback_poll(&self) {
        let task = self.tasks.lock().playback_poll.take();
        drop(task);
    }

    /// Copy the recorder's flag and duration into the session on every change.
    fn spawn_recording_mirror(&self) -> PollTask {
        let state = Arc::clone(&self.state);
        let mut recording = self.recorder.is_recording();
        let mut duration = self.recorder.recording_duration();

        PollTask::spawn(move |live| async move {
            loop {
                let is_recording = *recording.borrow_and_update();
                let duration_ms = *duration.borrow_and_update();
                let mirrored = publish(&state, &live, |session| {
                    session.is_recording = is_recording;
                    session.recording_duration_ms = duration_ms;
                });
                if !mirrored {
                    break;
                }

                tokio::select! {
                    changed = recording.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = duration.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Publish the playhead until playback stops or reaches the clip end.
    ///
    /// The end-of-clip transition runs under the operation lock so it cannot
    /// interleave with a concurrent play, seek or record.
    fn spawn_playback_poll(&self) -> PollTask {
        let state = Arc::clone(&self.state);
        let player = Arc::clone(&self.player);
        let op_lock = Arc::clone(&self.op_lock);
        let interval = self.playback.poll_interval();
        let tolerance_ms = self.playback.end_tolerance_ms;

        PollTask::spawn(move |live| async move {
            loop {
                if !live.is_alive() || !is_playing(&state) {
                    break;
                }

                let position_ms = player.position_ms();
                if is_at_end(position_ms, player.duration_ms(), tolerance_ms) {
                    let _op = op_lock.lock().await;
                    if publish(&state, &live, RecordingSession::reset_playback) {
                        player.stop().await;
                        debug!("Playback reached end of clip");
                    }
                    break;
                }

                if !publish(&state, &live, |session| {
                    session.playback_position_ms = position_ms;
                }) {
                    break;
                }

                tokio::time::sleep(interval).await;
            }
        })
    }

    /// Begin a new recording, discarding any clip from the previous one.
    pub async fn start_recording(&self) {
        let _op = self.op_lock.lock().await;

        self.cancel_playback_poll();
        self.player.stop().await;
        self.cancel_recording_mirror();

        self.update(RecordingSession::reset_playback);

        if let Err(e) = self.recorder.start_recording().await {
            warn!(error = %e, "Recording failed to start");
            let message = e.user_message(START_FAILED);
            self.update(|session| {
                session.is_recording = false;
                session.error_message = Some(message);
            });
            return;
        }

        // The accepted clip is only dropped once the new capture is running.
        let superseded = self.state.borrow().audio_path.clone();
        let is_recording = *self.recorder.is_recording().borrow();
        self.update(|session| {
            session.clear_clip();
            session.is_recording = is_recording;
        });
        if superseded.is_some() {
            self.recorder.delete_temp_file(superseded.as_deref());
        }
        let mirror = self.spawn_recording_mirror();
        self.tasks.lock().recording_mirror = Some(mirror);

        info!("Recording session started");
    }

    /// Stop recording and accept or reject the clip by its duration.
    pub async fn stop_recording(&self) {
        let _op = self.op_lock.lock().await;

        let result = self.recorder.stop_recording().await;
        self.cancel_recording_mirror();

        let is_recording = *self.recorder.is_recording().borrow();
        let duration_ms = *self.recorder.recording_duration().borrow();

        let path = match result {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Recording failed to stop");
                let message = e.user_message(STOP_FAILED);
                self.update(|session| {
                    session.is_recording = is_recording;
                    session.recording_duration_ms = duration_ms;
                    session.error_message = Some(message);
                });
                return;
            }
        };

        let verdict = self.policy.classify(duration_ms);
        match self.policy.rejection_message(verdict) {
            None => {
                info!(path = ?path, duration_ms, "Clip accepted");
                self.update(|session| {
                    session.is_recording = is_recording;
                    session.recording_duration_ms = duration_ms;
                    session.audio_path = Some(path);
                    session.error_message = None;
                });
            }
            Some(message) => {
                info!(?verdict, duration_ms, "Clip rejected");
                self.update(|session| {
                    session.is_recording = is_recording;
                    session.recording_duration_ms = 0;
                    session.audio_path = None;
                    session.error_message = Some(message);
                });
                self.recorder.delete_temp_file(Some(&path));
            }
        }
    }

    /// Pause when playing; otherwise play the accepted clip from the last
    /// position. No-op without an accepted clip.
    pub async fn toggle_play_pause(&self) {
        let _op = self.op_lock.lock().await;

        let (audio_path, playing, resume_at) = {
            let session = self.state.borrow();
            (
                session.audio_path.clone(),
                session.is_playing,
                session.playback_position_ms,
            )
        };
        let Some(path) = audio_path else {
            return;
        };

        self.cancel_playback_poll();

        if playing {
            self.player.pause().await;
            self.update(|session| session.is_playing = false);
            debug!(position_ms = resume_at, "Playback paused");
            return;
        }

        self.player.stop().await;
        if let Err(e) = self.player.play(&path).await {
            warn!(error = %e, "Playback failed to start");
            let message = e.user_message(PLAY_FAILED);
            self.update(|session| {
                session.is_playing = false;
                session.error_message = Some(message);
            });
            return;
        }
        if resume_at > 0 {
            self.player.seek_to(resume_at).await;
        }

        self.update(|session| session.is_playing = true);
        let poll = self.spawn_playback_poll();
        self.tasks.lock().playback_poll = Some(poll);

        debug!(position_ms = resume_at, "Playback started");
    }

    /// Move the playhead. Seeking to within the end tolerance finishes
    /// playback instead.
    pub async fn seek_to(&self, position_ms: u64) {
        let _op = self.op_lock.lock().await;

        let duration_ms = self.player.duration_ms();
        if is_at_end(position_ms, duration_ms, self.playback.end_tolerance_ms) {
            self.cancel_playback_poll();
            self.update(RecordingSession::reset_playback);
            self.player.stop().await;
            return;
        }

        self.update(|session| session.playback_position_ms = position_ms);
        if is_playing(&self.state) {
            self.player.seek_to(position_ms).await;
        }
    }

    /// Throw away the current clip and return to idle.
    pub async fn record_again(&self) {
        let _op = self.op_lock.lock().await;

        self.cancel_playback_poll();
        self.player.stop().await;

        let path = self.state.borrow().audio_path.clone();
        self.recorder.delete_temp_file(path.as_deref());
        self.update(RecordingSession::clear_clip);

        info!("Clip discarded, ready to record again");
    }

    /// Promote the accepted clip into permanent storage.
    ///
    /// The copy runs on the blocking pool. The session still points at the
    /// temp path afterwards.
    pub async fn move_to_permanent_storage(&self) -> Option<PathBuf> {
        let _op = self.op_lock.lock().await;

        let path = self.state.borrow().audio_path.clone()?;
        let recorder = Arc::clone(&self.recorder);
        match tokio::task::spawn_blocking(move || recorder.move_to_permanent_storage(&path)).await {
            Ok(promoted) => promoted,
            Err(e) => {
                warn!(error = %e, "Clip promotion task failed");
                None
            }
        }
    }

    /// Cancel background work, stop the devices and delete the temp clip.
    /// Only the first call has any effect.
    pub async fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }
        let _op = self.op_lock.lock().await;

        self.cancel_recording_mirror();
        self.cancel_playback_poll();

        let still_recording = *self.recorder.is_recording().borrow();
        if still_recording {
            match self.recorder.stop_recording().await {
                Ok(path) => self.recorder.delete_temp_file(Some(&path)),
                Err(e) => debug!(error = %e, "Recording released during cleanup"),
            }
        }
        self.player.stop().await;

        let path = self.state.borrow().audio_path.clone();
        self.recorder.delete_temp_file(path.as_deref());
        self.update(|session| {
            session.is_recording = false;
            session.reset_playback();
        });

        info!("Recording session cleaned up");
    }
}

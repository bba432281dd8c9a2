use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::DomainError;
use crate::ports::{AudioPlayer, CompletionCallback, PlaybackDevice, PlaybackHandle};

struct LoadedClip {
    path: PathBuf,
    handle: Box<dyn PlaybackHandle>,
}

/// [`AudioPlayer`] over a native [`PlaybackDevice`].
///
/// Keeps at most one clip loaded. Resuming the same file reuses the loaded
/// handle; any other file replaces it.
pub struct ClipPlayer<D: PlaybackDevice> {
    device: D,
    loaded: Mutex<Option<LoadedClip>>,
    is_playing: Arc<watch::Sender<bool>>,
    position_ms: Arc<watch::Sender<u64>>,
    duration_ms: watch::Sender<u64>,
}

impl<D: PlaybackDevice> ClipPlayer<D> {
    pub fn new(device: D) -> Self {
        let (is_playing, _) = watch::channel(false);
        let (position_ms, _) = watch::channel(0);
        let (duration_ms, _) = watch::channel(0);
        Self {
            device,
            loaded: Mutex::new(None),
            is_playing: Arc::new(is_playing),
            position_ms: Arc::new(position_ms),
            duration_ms,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn completion_callback(&self) -> CompletionCallback {
        let is_playing = Arc::clone(&self.is_playing);
        let position_ms = Arc::clone(&self.position_ms);
        Box::new(move || {
            debug!("Clip played to completion");
            is_playing.send_replace(false);
            position_ms.send_replace(0);
        })
    }

    fn start_clip(&self, path: &Path) -> Result<(), DomainError> {
        let mut loaded = self.loaded.lock();

        if loaded.as_ref().is_some_and(|clip| clip.path != path) {
            debug!(path = ?path, "Replacing loaded clip");
            *loaded = None;
        }

        let clip = match loaded.take() {
            Some(clip) => clip,
            None => {
                let handle = self.device.open(path, self.completion_callback())?;
                self.duration_ms.send_replace(handle.duration_ms());
                LoadedClip {
                    path: path.to_path_buf(),
                    handle,
                }
            }
        };

        clip.handle.start()?;
        *loaded = Some(clip);
        Ok(())
    }
}

#[async_trait]
impl<D: PlaybackDevice> AudioPlayer for ClipPlayer<D> {
    fn is_playing(&self) -> watch::Receiver<bool> {
        self.is_playing.subscribe()
    }

    fn current_position(&self) -> watch::Receiver<u64> {
        self.position_ms.subscribe()
    }

    fn duration(&self) -> watch::Receiver<u64> {
        self.duration_ms.subscribe()
    }

    async fn play(&self, path: &Path) -> Result<(), DomainError> {
        if let Err(e) = self.start_clip(path) {
            warn!(path = ?path, error = %e, "Failed to play clip");
            self.is_playing.send_replace(false);
            return Err(e);
        }
        self.is_playing.send_replace(true);
        info!(path = ?path, "Playback started");
        Ok(())
    }

    async fn pause(&self) {
        if let Some(clip) = self.loaded.lock().as_ref() {
            clip.handle.pause();
        }
        self.is_playing.send_replace(false);
    }

    async fn stop(&self) {
        let released = self.loaded.lock().take();
        if released.is_some() {
            debug!("Playback stopped");
        }
        drop(released);
        self.is_playing.send_replace(false);
        self.position_ms.send_replace(0);
    }

    async fn seek_to(&self, position_ms: u64) {
        if let Some(clip) = self.loaded.lock().as_ref() {
            clip.handle.seek(position_ms);
        }
        self.position_ms.send_replace(position_ms);
    }

    fn position_ms(&self) -> u64 {
        self.loaded
            .lock()
            .as_ref()
            .map(|clip| clip.handle.position_ms())
            .unwrap_or(0)
    }
}

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{DomainError, StorageConfig};
use crate::ports::ConfigStore;

const TEMP_CLIP_PREFIX: &str = "temp_recording";
const CLIP_PREFIX: &str = "recording";
const PHOTO_PREFIX: &str = "photo";

/// On-disk layout for clips and photos.
///
/// - provisional clips: `<temp_dir>/temp_recording_<millis>.<ext>`
/// - promoted clips: `<data_dir>/Recordings/recording_<millis>.<ext>`
/// - photos: `<data_dir>/Photos/photo_<millis>.jpg`
///
/// Stamps handed out by one storage never repeat, even when the clock does
/// not advance between allocations.
#[derive(Debug)]
pub struct ClipStorage {
    temp_dir: PathBuf,
    recordings_dir: PathBuf,
    photos_dir: PathBuf,
    last_stamp: AtomicI64,
}

impl ClipStorage {
    pub fn new(temp_dir: impl Into<PathBuf>, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            temp_dir: temp_dir.into(),
            recordings_dir: data_dir.join("Recordings"),
            photos_dir: data_dir.join("Photos"),
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Resolve the layout from config overrides, falling back to the
    /// store's cache and data directories.
    pub fn from_config(config: &StorageConfig, store: &dyn ConfigStore) -> Self {
        let temp_dir = config
            .temp_dir
            .clone()
            .unwrap_or_else(|| store.cache_dir().join("temp_recordings"));
        let data_dir = config.data_dir.clone().unwrap_or_else(|| store.data_dir());
        Self::new(temp_dir, data_dir)
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    /// Reserve a fresh provisional clip path. The file itself is not created.
    pub fn allocate_temp_clip(&self, extension: &str) -> Result<PathBuf, DomainError> {
        fs::create_dir_all(&self.temp_dir)?;
        Ok(unique_path(&self.temp_dir, TEMP_CLIP_PREFIX, self.next_stamp(), extension))
    }

    /// Copy a provisional clip into `Recordings` and delete the original.
    ///
    /// Returns `None` if the clip is missing or any I/O step fails.
    pub fn promote(&self, temp_path: &Path) -> Option<PathBuf> {
        if !temp_path.is_file() {
            warn!(path = ?temp_path, "Cannot promote missing clip");
            return None;
        }

        let extension = temp_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let promoted = (|| -> io::Result<PathBuf> {
            fs::create_dir_all(&self.recordings_dir)?;
            let target = unique_path(&self.recordings_dir, CLIP_PREFIX, self.next_stamp(), extension);
            write_clip(&target, fs::File::open(temp_path)?)?;
            Ok(target)
        })();

        match promoted {
            Ok(target) => {
                if let Err(e) = fs::remove_file(temp_path) {
                    debug!(path = ?temp_path, error = %e, "Failed to remove promoted temp clip");
                }
                info!(from = ?temp_path, to = ?target, "Clip moved to permanent storage");
                Some(target)
            }
            Err(e) => {
                warn!(path = ?temp_path, error = %e, "Failed to move clip to permanent storage");
                None
            }
        }
    }

    /// Best-effort delete; missing files and I/O errors are ignored.
    pub fn discard(&self, path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => debug!(path = ?path, "Temp clip deleted"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = ?path, error = %e, "Failed to delete temp clip"),
        }
    }

    /// Write an encoded photo into `Photos` under a timestamped name.
    pub fn store_photo(&self, jpeg: &[u8]) -> Result<PathBuf, DomainError> {
        fs::create_dir_all(&self.photos_dir)?;
        let path = unique_path(&self.photos_dir, PHOTO_PREFIX, self.next_stamp(), "jpg");
        fs::write(&path, jpeg)?;
        info!(path = ?path, bytes = jpeg.len(), "Photo stored");
        Ok(path)
    }

    /// Wall-clock millis, bumped past the previous stamp when needed.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

/// Stream `source` into a new file at `target`. A partially written target
/// is removed when the copy fails.
fn write_clip(target: &Path, mut source: impl Read) -> io::Result<u64> {
    let copied = fs::File::create(target).and_then(|mut file| {
        let bytes = io::copy(&mut source, &mut file)?;
        file.sync_all()?;
        Ok(bytes)
    });
    if copied.is_err() {
        if let Err(e) = fs::remove_file(target) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = ?target, error = %e, "Failed to remove partial clip");
            }
        }
    }
    copied
}

/// `<dir>/<prefix>_<stamp>.<ext>`, with a counter appended on collision.
fn unique_path(dir: &Path, prefix: &str, stamp: i64, extension: &str) -> PathBuf {
    let name = |suffix: Option<u32>| {
        let stem = match suffix {
            Some(n) => format!("{prefix}_{stamp}_{n}"),
            None => format!("{prefix}_{stamp}"),
        };
        if extension.is_empty() {
            stem
        } else {
            format!("{stem}.{extension}")
        }
    };

    let mut candidate = dir.join(name(None));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(name(Some(n)));
        n += 1;
    }
    candidate
}

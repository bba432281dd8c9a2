use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::ClipStorage;
use crate::domain::DomainError;
use crate::ports::{CameraController, StillCaptureDevice};

/// [`CameraController`] that stores frames from a [`StillCaptureDevice`]
/// under the `Photos` directory.
pub struct StillCamera<D: StillCaptureDevice> {
    device: D,
    storage: Arc<ClipStorage>,
}

impl<D: StillCaptureDevice> StillCamera<D> {
    pub fn new(device: D, storage: Arc<ClipStorage>) -> Self {
        Self { device, storage }
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

#[async_trait]
impl<D: StillCaptureDevice> CameraController for StillCamera<D> {
    async fn capture_photo(&self) -> Result<PathBuf, DomainError> {
        let jpeg = self.device.capture_jpeg().await.map_err(|e| {
            warn!(error = %e, "Photo capture failed");
            e
        })?;

        if jpeg.is_empty() {
            return Err(DomainError::Camera("Camera returned an empty frame".to_string()));
        }

        let path = self.storage.store_photo(&jpeg)?;
        info!(path = ?path, "Photo captured");
        Ok(path)
    }

    async fn has_permission(&self) -> bool {
        self.device.has_permission()
    }

    async fn request_permission(&self) -> bool {
        self.device.request_permission()
    }
}

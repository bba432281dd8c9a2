use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Port for photo capture into permanent storage.
#[async_trait]
pub trait CameraController: Send + Sync {
    /// Capture a photo and return where it was stored.
    async fn capture_photo(&self) -> Result<PathBuf, DomainError>;

    async fn has_permission(&self) -> bool;

    async fn request_permission(&self) -> bool;
}

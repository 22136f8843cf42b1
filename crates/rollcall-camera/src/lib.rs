//! Camera access and the single-stream media guard.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_types::{
    config::CameraConfig,
    frame::{ImageFrame, StillImage},
    Result, RollcallError,
};
use tracing::{debug, info, warn};

mod mock;
mod still;

pub use mock::MockCamera;
pub use still::{encode_jpeg, StillImageCamera};

/// Constraints passed to the platform when requesting a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
    pub audio: bool,
}

impl VideoConstraints {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
            facing_mode: config.facing_mode.clone(),
            audio: false,
        }
    }
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// A live, video-capable stream handed out by a backend.
#[async_trait]
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;
    async fn grab_frame(&self) -> Result<ImageFrame>;
    /// Stop every track of the stream. Must be idempotent.
    fn stop_tracks(&mut self);
    fn is_live(&self) -> bool;
}

/// Platform camera access (`getUserMedia` and friends).
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn MediaStream>>;
}

/// A stream bound to a named display surface.
pub struct CameraHandle {
    stream: Box<dyn MediaStream>,
    surface: String,
    acquired_at: DateTime<Utc>,
}

impl CameraHandle {
    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn stream_id(&self) -> &str {
        self.stream.id()
    }
}

/// Owns at most one live camera handle. Every mutation of the camera goes
/// through [`MediaGuard::acquire`] and [`MediaGuard::release`].
pub struct MediaGuard {
    backend: Arc<dyn CameraBackend>,
    constraints: VideoConstraints,
    active: Option<CameraHandle>,
}

impl MediaGuard {
    pub fn new(backend: Arc<dyn CameraBackend>, constraints: VideoConstraints) -> Self {
        Self {
            backend,
            constraints,
            active: None,
        }
    }

    /// Request a stream and bind it to `surface`, releasing any prior handle
    /// first. On failure no handle is left active.
    pub async fn acquire(&mut self, surface: &str) -> Result<()> {
        self.release();

        if surface.trim().is_empty() {
            return Err(camera_error("no display surface to bind the stream to"));
        }

        let mut stream = self.backend.open(&self.constraints).await.map_err(|err| {
            warn!(surface, error = %err, "camera acquisition failed");
            match err {
                RollcallError::CameraUnavailable(_) => err,
                other => camera_error(other.to_string()),
            }
        })?;

        if !stream.is_live() {
            stream.stop_tracks();
            return Err(camera_error("stream ended before it could be bound"));
        }

        info!(surface, stream = stream.id(), "camera stream bound");
        self.active = Some(CameraHandle {
            stream,
            surface: surface.to_string(),
            acquired_at: Utc::now(),
        });
        Ok(())
    }

    /// Stop all tracks of the active handle and clear it. Returns whether a
    /// handle was actually released.
    pub fn release(&mut self) -> bool {
        match self.active.take() {
            Some(mut handle) => {
                handle.stream.stop_tracks();
                let held_ms = (Utc::now() - handle.acquired_at).num_milliseconds();
                info!(
                    surface = %handle.surface,
                    stream = handle.stream.id(),
                    held_ms,
                    "camera released"
                );
                true
            }
            None => {
                debug!("camera release requested with no active stream");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&CameraHandle> {
        self.active.as_ref()
    }

    pub fn active_surface(&self) -> Option<&str> {
        self.active.as_ref().map(CameraHandle::surface)
    }

    /// Freeze the current frame of the live stream into a JPEG still.
    pub async fn capture_still(&self, quality: u8) -> Result<StillImage> {
        let handle = self
            .active
            .as_ref()
            .ok_or_else(|| camera_error("no active camera stream"))?;
        let frame = handle.stream.grab_frame().await?;
        encode_jpeg(&frame, quality)
    }
}

impl Drop for MediaGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Generate an error aligned with camera semantics.
pub fn camera_error(message: impl Into<String>) -> RollcallError {
    RollcallError::CameraUnavailable(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with(camera: &MockCamera) -> MediaGuard {
        MediaGuard::new(Arc::new(camera.clone()), VideoConstraints::default())
    }

    #[tokio::test]
    async fn acquire_twice_keeps_a_single_handle() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);

        guard.acquire("register-video").await.expect("first acquire");
        let first = guard.active().expect("handle").stream_id().to_string();
        guard.acquire("capture-video").await.expect("second acquire");

        assert_eq!(camera.opened(), 2);
        assert_eq!(camera.live_streams(), 1);
        assert!(camera.was_stopped(&first));
        assert_eq!(guard.active_surface(), Some("capture-video"));
    }

    #[tokio::test]
    async fn frame_failure_keeps_the_handle_until_released() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);
        guard.acquire("capture-video").await.expect("acquire");

        camera.break_frames("device disconnected");
        let err = guard.capture_still(90).await.expect_err("no frame");
        assert!(matches!(err, RollcallError::CameraUnavailable(_)));
        assert!(guard.is_active());
        assert_eq!(camera.live_streams(), 1);

        assert!(guard.release());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn failed_acquire_leaves_no_handle() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);
        guard.acquire("register-video").await.expect("acquire");

        camera.deny("permission denied");
        let err = guard
            .acquire("capture-video")
            .await
            .expect_err("acquire must fail");

        assert!(matches!(err, RollcallError::CameraUnavailable(ref msg) if msg.contains("permission denied")));
        assert!(!guard.is_active());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);
        assert!(!guard.release());

        guard.acquire("capture-video").await.expect("acquire");
        assert!(guard.release());
        assert!(!guard.release());
        assert_eq!(camera.stopped(), 1);
    }

    #[tokio::test]
    async fn empty_surface_is_rejected() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);
        assert!(guard.acquire("").await.is_err());
        assert_eq!(camera.opened(), 0);
    }

    #[tokio::test]
    async fn drop_releases_the_stream() {
        let camera = MockCamera::new();
        {
            let mut guard = guard_with(&camera);
            guard.acquire("capture-video").await.expect("acquire");
            assert_eq!(camera.live_streams(), 1);
        }
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn capture_still_requires_live_stream() {
        let camera = MockCamera::new();
        let mut guard = guard_with(&camera);
        assert!(guard.capture_still(90).await.is_err());

        guard.acquire("capture-video").await.expect("acquire");
        let still = guard.capture_still(90).await.expect("still");
        assert!(!still.jpeg.is_empty());
        assert_eq!((still.width, still.height), (camera.width(), camera.height()));
    }
}

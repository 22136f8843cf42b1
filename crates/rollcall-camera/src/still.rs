use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, RgbaImage};
use rollcall_types::{
    frame::{ImageFrame, StillImage},
    Result, RollcallError,
};
use tracing::info;
use uuid::Uuid;

use crate::{camera_error, CameraBackend, MediaStream, VideoConstraints};

/// Encode an RGBA frame as a JPEG still. Alpha is dropped.
pub fn encode_jpeg(frame: &ImageFrame, quality: u8) -> Result<StillImage> {
    if frame.is_empty() {
        return Err(camera_error("captured frame is empty"));
    }
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| camera_error("frame buffer does not match its dimensions"))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(rgb.as_raw(), frame.width, frame.height, ColorType::Rgb8)
        .map_err(|err| RollcallError::Ops(format!("JPEG encoding failed: {err}")))?;

    Ok(StillImage {
        jpeg,
        width: frame.width,
        height: frame.height,
        captured_at: frame.captured_at,
    })
}

/// Camera backend serving a fixed image from disk, for machines without a
/// capture device.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraBackend for StillImageCamera {
    async fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn MediaStream>> {
        let path = self.path.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let raw = std::fs::read(&path)
                .map_err(|err| camera_error(format!("device not found ({}): {err}", path.display())))?;
            let img = image::load_from_memory(&raw)
                .map_err(|err| camera_error(format!("unreadable source image: {err}")))?;
            Ok::<_, RollcallError>(img.to_rgba8())
        })
        .await
        .map_err(|err| camera_error(format!("camera task failed: {err}")))??;

        let (width, height) = decoded.dimensions();
        info!(
            path = %self.path.display(),
            width,
            height,
            ideal_width = constraints.ideal_width,
            ideal_height = constraints.ideal_height,
            "still image camera opened"
        );
        Ok(Box::new(StillImageStream {
            id: Uuid::new_v4().to_string(),
            pixels: Arc::new(decoded.into_raw()),
            width,
            height,
            live: true,
        }))
    }
}

struct StillImageStream {
    id: String,
    pixels: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    live: bool,
}

#[async_trait]
impl MediaStream for StillImageStream {
    fn id(&self) -> &str {
        &self.id
    }

    async fn grab_frame(&self) -> Result<ImageFrame> {
        if !self.live {
            return Err(camera_error("stream has been stopped"));
        }
        Ok(ImageFrame {
            width: self.width,
            height: self.height,
            data: self.pixels.as_ref().clone(),
            captured_at: Utc::now(),
        })
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frame_as_jpeg() {
        let frame = ImageFrame::from_rgba(8, 4, [10u8, 200, 30, 255].repeat(32));
        let still = encode_jpeg(&frame, 90).expect("encode");
        assert_eq!(&still.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!((still.width, still.height), (8, 4));
    }

    #[test]
    fn reject_mismatched_buffer() {
        let frame = ImageFrame::from_rgba(8, 4, vec![0u8; 10]);
        assert!(encode_jpeg(&frame, 90).is_err());
        assert!(encode_jpeg(&ImageFrame::empty(), 90).is_err());
    }

    #[tokio::test]
    async fn missing_source_is_camera_unavailable() {
        let camera = StillImageCamera::new("/nonexistent/rollcall/room.png");
        let err = camera
            .open(&VideoConstraints::default())
            .await
            .err()
            .expect("open must fail");
        assert!(matches!(err, RollcallError::CameraUnavailable(_)));
    }

    #[tokio::test]
    async fn serve_frames_from_png() {
        let path = std::env::temp_dir().join("rollcall-still-camera-test.png");
        RgbaImage::from_pixel(6, 5, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .expect("write png");

        let camera = StillImageCamera::new(&path);
        let mut stream = camera
            .open(&VideoConstraints::default())
            .await
            .expect("open");
        let frame = stream.grab_frame().await.expect("frame");
        assert_eq!((frame.width, frame.height), (6, 5));
        stream.stop_tracks();
        assert!(!stream.is_live());
        assert!(stream.grab_frame().await.is_err());
        std::fs::remove_file(&path).expect("cleanup");
    }
}

//! Bounded photo batch collected during student registration.

use chrono::{DateTime, Utc};
use futures::{stream::FuturesUnordered, StreamExt};
use rollcall_types::RollcallError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

mod upload;

pub use upload::UploadBlob;

pub const MAX_PHOTOS: usize = 5;
pub const MIN_PHOTOS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoOrigin {
    Camera,
    Upload,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub id: Uuid,
    /// Encoded image bytes (JPEG for camera captures, the file as-is for uploads).
    pub image_data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub origin: PhotoOrigin,
    pub source_file_name: Option<String>,
    sequence: u64,
}

/// What happened to each file of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub added: Vec<Uuid>,
    pub skipped_non_image: Vec<String>,
    pub skipped_over_capacity: Vec<String>,
    pub failed_decode: Vec<String>,
}

/// Ordered photo batch capped at [`MAX_PHOTOS`]. Display order is the
/// submission order of each photo, whatever order decodes complete in.
#[derive(Debug, Default)]
pub struct PhotoCollection {
    photos: Vec<Photo>,
    next_sequence: u64,
}

impl PhotoCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        if !self.photos.is_empty() {
            debug!(count = self.photos.len(), "clearing photo batch");
        }
        self.photos.clear();
    }

    /// Append a camera capture. Returns `None` when the batch is full.
    pub fn add_captured(&mut self, image_data: Vec<u8>) -> Option<Uuid> {
        if self.is_full() {
            info!("photo batch full, capture ignored");
            return None;
        }
        let sequence = self.claim_sequence();
        let photo = Photo {
            id: Uuid::new_v4(),
            image_data,
            captured_at: Utc::now(),
            origin: PhotoOrigin::Camera,
            source_file_name: None,
            sequence,
        };
        let id = photo.id;
        self.insert_ordered(photo);
        Some(id)
    }

    /// Decode every image blob concurrently and append the ones that decode.
    ///
    /// Slots are reserved at submission: image files beyond the remaining
    /// capacity are skipped up front, non-image blobs are skipped, and corrupt
    /// images are dropped individually.
    pub async fn add_uploaded(&mut self, files: Vec<UploadBlob>) -> UploadReport {
        let mut report = UploadReport::default();
        let mut remaining = self.remaining_capacity();
        let mut decodes = FuturesUnordered::new();

        for blob in files {
            if !blob.is_image() {
                debug!(file = %blob.file_name, mime = %blob.mime_type, "skipping non-image upload");
                report.skipped_non_image.push(blob.file_name);
                continue;
            }
            if remaining == 0 {
                report.skipped_over_capacity.push(blob.file_name);
                continue;
            }
            remaining -= 1;
            let sequence = self.claim_sequence();
            decodes.push(async move {
                let outcome = blob.decode().await;
                (sequence, blob, outcome)
            });
        }

        while let Some((sequence, blob, outcome)) = decodes.next().await {
            match outcome {
                Ok(()) => {
                    let photo = Photo {
                        id: Uuid::new_v4(),
                        image_data: blob.bytes,
                        captured_at: Utc::now(),
                        origin: PhotoOrigin::Upload,
                        source_file_name: Some(blob.file_name),
                        sequence,
                    };
                    report.added.push(photo.id);
                    self.insert_ordered(photo);
                }
                Err(RollcallError::Decode(reason)) => {
                    warn!(file = %blob.file_name, %reason, "skipping undecodable upload");
                    report.failed_decode.push(blob.file_name);
                }
                Err(other) => {
                    warn!(file = %blob.file_name, error = %other, "upload decode task failed");
                    report.failed_decode.push(blob.file_name);
                }
            }
        }

        if !report.skipped_over_capacity.is_empty() {
            info!(
                skipped = report.skipped_over_capacity.len(),
                "upload exceeded the photo cap"
            );
        }
        report
    }

    /// Remove a photo by id. Returns whether anything was removed.
    pub fn remove(&mut self, photo_id: Uuid) -> bool {
        let before = self.photos.len();
        self.photos.retain(|photo| photo.id != photo_id);
        before != self.photos.len()
    }

    /// `min(len / MIN_PHOTOS, 1.0)`, independent of the cap.
    pub fn progress_fraction(&self) -> f32 {
        (self.photos.len() as f32 / MIN_PHOTOS as f32).min(1.0)
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.photos.len() >= MAX_PHOTOS
    }

    pub fn can_submit(&self) -> bool {
        self.photos.len() >= MIN_PHOTOS
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_PHOTOS.saturating_sub(self.photos.len())
    }

    fn claim_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn insert_ordered(&mut self, photo: Photo) {
        if self.photos.len() >= MAX_PHOTOS {
            return;
        }
        let index = self
            .photos
            .partition_point(|existing| existing.sequence < photo.sequence);
        self.photos.insert(index, photo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(size: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            size,
            size,
            image::Rgba([20, 40, 60, 255]),
        ))
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .expect("encode png");
        buffer.into_inner()
    }

    fn png_blob(name: &str, size: u32) -> UploadBlob {
        UploadBlob::new(name, "image/png", png_bytes(size))
    }

    #[test]
    fn capture_is_capped_at_max() {
        let mut photos = PhotoCollection::new();
        for _ in 0..MAX_PHOTOS {
            assert!(photos.add_captured(vec![1, 2, 3]).is_some());
        }
        let ids: Vec<Uuid> = photos.photos().iter().map(|p| p.id).collect();

        assert!(photos.add_captured(vec![4]).is_none());
        assert_eq!(photos.len(), MAX_PHOTOS);
        let after: Vec<Uuid> = photos.photos().iter().map(|p| p.id).collect();
        assert_eq!(ids, after);
    }

    #[test]
    fn progress_tracks_minimum_quota() {
        let mut photos = PhotoCollection::new();
        assert_eq!(photos.progress_fraction(), 0.0);
        photos.add_captured(vec![1]);
        photos.add_captured(vec![2]);
        assert!((photos.progress_fraction() - 0.667).abs() < 0.001);
        assert!(!photos.can_submit());
        photos.add_captured(vec![3]);
        assert_eq!(photos.progress_fraction(), 1.0);
        photos.add_captured(vec![4]);
        assert_eq!(photos.progress_fraction(), 1.0);
        assert!(photos.can_submit());
    }

    #[test]
    fn remove_and_reset() {
        let mut photos = PhotoCollection::new();
        let first = photos.add_captured(vec![1]).expect("first");
        let second = photos.add_captured(vec![2]).expect("second");

        assert!(photos.remove(first));
        assert!(!photos.remove(first));
        assert_eq!(photos.photos()[0].id, second);

        photos.reset();
        assert!(photos.is_empty());
        assert!(photos.add_captured(vec![3]).is_some());
    }

    #[tokio::test]
    async fn uploads_skip_non_images_and_corrupt_files() {
        let mut photos = PhotoCollection::new();
        let report = photos
            .add_uploaded(vec![
                png_blob("a.png", 4),
                UploadBlob::new("notes.txt", "text/plain", b"hello".to_vec()),
                UploadBlob::new("broken.jpg", "image/jpeg", vec![0, 1, 2, 3]),
                png_blob("b.png", 4),
            ])
            .await;

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.skipped_non_image, vec!["notes.txt".to_string()]);
        assert_eq!(report.failed_decode, vec!["broken.jpg".to_string()]);
        assert_eq!(photos.len(), 2);
        assert!(photos
            .photos()
            .iter()
            .all(|photo| photo.origin == PhotoOrigin::Upload));
    }

    #[tokio::test]
    async fn upload_order_follows_submission() {
        let mut photos = PhotoCollection::new();
        photos.add_captured(vec![9]);
        // Larger images take longer to decode, so completion order differs.
        photos
            .add_uploaded(vec![
                png_blob("big.png", 512),
                png_blob("small.png", 2),
                png_blob("medium.png", 64),
            ])
            .await;

        let names: Vec<Option<&str>> = photos
            .photos()
            .iter()
            .map(|p| p.source_file_name.as_deref())
            .collect();
        assert_eq!(
            names,
            vec![None, Some("big.png"), Some("small.png"), Some("medium.png")]
        );
    }

    #[tokio::test]
    async fn uploads_respect_the_cap() {
        let mut photos = PhotoCollection::new();
        photos.add_captured(vec![1]);
        photos.add_captured(vec![2]);
        let blobs = (0..6).map(|i| png_blob(&format!("p{i}.png"), 3)).collect();

        let report = photos.add_uploaded(blobs).await;

        assert_eq!(photos.len(), MAX_PHOTOS);
        assert_eq!(report.added.len(), 3);
        assert_eq!(
            report.skipped_over_capacity,
            vec!["p3.png", "p4.png", "p5.png"]
        );
        assert!(photos.add_captured(vec![3]).is_none());
    }
}

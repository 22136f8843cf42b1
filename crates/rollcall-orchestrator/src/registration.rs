//! Student registration: the photo batch, its collection mode, and the
//! submit rules checked before anything reaches the network.

use rollcall_camera::MediaGuard;
use rollcall_network::{RegistrationPhoto, RegistrationRequest};
use rollcall_photos::{PhotoCollection, UploadBlob, UploadReport, MAX_PHOTOS, MIN_PHOTOS};
use rollcall_types::{view::PhotoMode, Result, RollcallError};
use tracing::{debug, info};
use uuid::Uuid;

/// Identity fields typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub name: String,
    pub matricule: String,
}

impl RegistrationForm {
    pub fn new(name: impl Into<String>, matricule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matricule: matricule.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoCapture {
    Added(Uuid),
    /// The batch is at [`MAX_PHOTOS`]; nothing was captured.
    AtCapacity,
}

#[derive(Debug, Default)]
pub struct RegistrationWorkflow {
    photos: PhotoCollection,
    mode: PhotoMode,
    submitting: bool,
}

impl RegistrationWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh batch in camera mode.
    pub fn reset(&mut self) {
        self.photos.reset();
        self.mode = PhotoMode::Camera;
        self.submitting = false;
    }

    pub fn photos(&self) -> &PhotoCollection {
        &self.photos
    }

    pub fn mode(&self) -> PhotoMode {
        self.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Switching into camera mode starts a new batch.
    pub fn set_mode(&mut self, mode: PhotoMode) {
        if mode == PhotoMode::Camera {
            self.photos.reset();
        }
        self.mode = mode;
    }

    pub async fn capture(&mut self, guard: &MediaGuard, quality: u8) -> Result<PhotoCapture> {
        if self.mode != PhotoMode::Camera {
            return Err(RollcallError::Validation(
                "switch to camera mode to capture photos".into(),
            ));
        }
        if self.photos.is_full() {
            return Ok(PhotoCapture::AtCapacity);
        }
        let still = guard.capture_still(quality).await?;
        match self.photos.add_captured(still.jpeg) {
            Some(id) => Ok(PhotoCapture::Added(id)),
            None => Ok(PhotoCapture::AtCapacity),
        }
    }

    pub async fn upload(&mut self, files: Vec<UploadBlob>) -> UploadReport {
        self.photos.add_uploaded(files).await
    }

    pub fn remove(&mut self, photo_id: Uuid) -> bool {
        self.photos.remove(photo_id)
    }

    pub fn validate(&self, form: &RegistrationForm) -> Result<()> {
        if form.name.trim().is_empty() || form.matricule.trim().is_empty() {
            return Err(RollcallError::Validation("Please fill in all fields".into()));
        }
        if !self.photos.can_submit() {
            return Err(RollcallError::Validation(format!(
                "Please provide at least {MIN_PHOTOS} photos ({} currently)",
                self.photos.len()
            )));
        }
        Ok(())
    }

    /// Validate and build the upload, marking the workflow as submitting.
    /// Photos are named `photo{i}.jpg` in display order.
    pub fn begin_submit(&mut self, form: &RegistrationForm) -> Result<RegistrationRequest> {
        if self.submitting {
            return Err(RollcallError::Validation("registration already in progress".into()));
        }
        self.validate(form)?;
        self.submitting = true;

        let photos = self
            .photos
            .photos()
            .iter()
            .enumerate()
            .map(|(idx, photo)| RegistrationPhoto {
                file_name: format!("photo{}.jpg", idx + 1),
                bytes: photo.image_data.clone(),
            })
            .collect::<Vec<_>>();
        debug!(count = photos.len(), max = MAX_PHOTOS, "registration photos prepared");

        Ok(RegistrationRequest {
            name: form.name.trim().to_string(),
            matricule: form.matricule.trim().to_string(),
            photos,
        })
    }

    /// Success clears the batch; failure keeps it so the operator can retry.
    pub fn finish_submit(&mut self, succeeded: bool) {
        self.submitting = false;
        if succeeded {
            info!("registration accepted, clearing photo batch");
            self.reset();
        }
    }
}

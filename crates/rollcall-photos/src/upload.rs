use std::path::Path;

use rollcall_types::{Result, RollcallError};

/// A file-like blob handed to the collection by an upload control.
#[derive(Debug, Clone)]
pub struct UploadBlob {
    pub file_name: String,
    /// Declared MIME type, as reported by the picker.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadBlob {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            RollcallError::Validation(format!("unable to read {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_from_extension(path).to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Decode off the async thread to confirm the bytes are a readable image.
    pub(crate) async fn decode(&self) -> Result<()> {
        let bytes = self.bytes.clone();
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|_| ())
                .map_err(|err| RollcallError::Decode(err.to_string()))
        })
        .await
        .map_err(|err| RollcallError::Decode(format!("decode task failed: {err}")))?
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_from_extension() {
        assert_eq!(mime_from_extension(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(mime_from_extension(Path::new("scan.png")), "image/png");
        assert_eq!(
            mime_from_extension(Path::new("notes.txt")),
            "application/octet-stream"
        );
        assert!(UploadBlob::new("x.png", "image/png", vec![]).is_image());
        assert!(!UploadBlob::new("x.pdf", "application/pdf", vec![]).is_image());
    }

    #[test]
    fn missing_file_is_validation_error() {
        let err = UploadBlob::from_path("/nonexistent/rollcall/photo.jpg").expect_err("missing");
        assert!(matches!(err, RollcallError::Validation(_)));
    }
}

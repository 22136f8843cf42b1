use thiserror::Error;

pub type Result<T, E = RollcallError> = std::result::Result<T, E>;

/// Unified error type covering the failure classes of the client.
#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Permission denied, no device, or the stream could not be bound.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    /// Rejected locally before any network call is issued.
    #[error("validation error: {0}")]
    Validation(String),
    /// Non-success status or malformed response from a collaborator.
    #[error("collaborator error: {0}")]
    Collaborator(String),
    /// Non-image or corrupt upload. Skipped per file, never fatal to a batch.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RollcallError {
    /// Message suitable for a user-facing alert.
    pub fn user_message(&self) -> String {
        match self {
            RollcallError::CameraUnavailable(cause) => format!(
                "Unable to access the camera: {cause}. Make sure camera access is allowed."
            ),
            RollcallError::Validation(msg)
            | RollcallError::Collaborator(msg)
            | RollcallError::Decode(msg)
            | RollcallError::Session(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_strips_category_prefix() {
        let err = RollcallError::Collaborator("Name and matricule are required".into());
        assert_eq!(err.user_message(), "Name and matricule are required");
        assert_eq!(
            err.to_string(),
            "collaborator error: Name and matricule are required"
        );
    }

    #[test]
    fn camera_message_mentions_permission() {
        let err = RollcallError::CameraUnavailable("permission denied".into());
        assert!(err.user_message().contains("permission denied"));
        assert!(err.user_message().contains("camera access"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    attendance::{AttendancePreview, AttendanceReport, DetectionSummary},
    roster::DashboardStats,
    view::View,
};

/// Inline camera indicator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraStatus {
    Initializing,
    Live,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Info,
    Success,
    Error,
}

/// State change the presentation layer should reflect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UiPayload {
    ViewChanged(View),
    CameraStatus(CameraStatus),
    /// Blocking notice, the equivalent of a modal alert.
    Alert { level: AlertLevel, message: String },
    PhotosChanged { count: usize, progress: f32 },
    DashboardLoaded(DashboardStats),
    ReviewLoaded(AttendanceReport),
    ScanReviewed {
        summary: DetectionSummary,
        preview: AttendancePreview,
    },
    SessionSaved,
}

/// Immutable event envelope for the notice bus and activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: UiPayload,
}

impl UiEvent {
    pub fn new(payload: UiPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn alert(level: AlertLevel, message: impl Into<String>) -> Self {
        Self::new(UiPayload::Alert {
            level,
            message: message.into(),
        })
    }
}

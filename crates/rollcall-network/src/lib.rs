//! Collaborator contracts and notice publication.

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use rollcall_types::{
    events::UiEvent,
    roster::{DashboardStats, RecognitionResult, RosterEntry},
    session::{SessionRecord, StoredSession},
    RollcallError, Result,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

mod http;
mod local;

pub use http::HttpApi;
pub use local::{Endpoint, LocalApi, ScanGate};

/// One reference photo of a registration, uploaded as `image/jpeg`.
#[derive(Debug, Clone)]
pub struct RegistrationPhoto {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub name: String,
    pub matricule: String,
    pub photos: Vec<RegistrationPhoto>,
}

/// Request/response contract of the roster, recognition, and persistence
/// collaborators.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn roster(&self) -> Result<Vec<RosterEntry>>;
    async fn sessions(&self) -> Result<Vec<StoredSession>>;
    async fn stats(&self) -> Result<DashboardStats>;
    async fn register(&self, request: RegistrationRequest) -> Result<()>;
    /// Submit one still image for recognition.
    async fn scan(&self, jpeg: Vec<u8>) -> Result<RecognitionResult>;
    async fn create_session(&self, record: &SessionRecord) -> Result<()>;
}

/// In-process fan-out of UI events backed by a broadcast channel.
#[derive(Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<UiEvent>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: UiEvent) {
        // No subscribers is not an error: nothing is rendering.
        if self.tx.send(event).is_err() {
            debug!("notice published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> BoxStream<'static, UiEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

/// Generate an error aligned with collaborator semantics.
pub fn collaborator_error(message: impl Into<String>) -> RollcallError {
    RollcallError::Collaborator(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_types::events::{AlertLevel, UiPayload};

    #[tokio::test]
    async fn subscribers_receive_published_notices() {
        let bus = NoticeBus::new(8);
        let mut stream = bus.subscribe();
        bus.publish(UiEvent::alert(AlertLevel::Info, "hello"));

        let event = stream.next().await.expect("event");
        assert!(matches!(
            event.payload,
            UiPayload::Alert { level: AlertLevel::Info, ref message } if message == "hello"
        ));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = NoticeBus::new(1);
        bus.publish(UiEvent::alert(AlertLevel::Error, "nobody listening"));
    }
}

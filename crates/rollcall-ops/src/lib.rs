//! Operational helpers: logging setup and the activity log of UI events.

use std::{collections::VecDeque, sync::Arc};

use rollcall_types::{
    config::OpsConfig,
    events::{AlertLevel, UiEvent, UiPayload},
    Result, RollcallError,
};
use tokio::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| RollcallError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| RollcallError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Bounded in-memory record of every event the client emitted, oldest first.
#[derive(Clone)]
pub struct ActivityLog {
    events: Arc<Mutex<VecDeque<UiEvent>>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn from_config(config: &OpsConfig) -> Self {
        Self::new(config.activity_capacity)
    }

    pub async fn record(&self, event: UiEvent) {
        let mut events = self.events.lock().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        debug!(payload = ?event.payload, "ui event");
        events.push_back(event);
    }

    pub async fn snapshot(&self) -> Vec<UiEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    /// Alert messages of the given level, oldest first.
    pub async fn alerts(&self, level: AlertLevel) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match &event.payload {
                UiPayload::Alert { level: l, message } if *l == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::from_config(&OpsConfig::default())
    }
}

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use rollcall_types::{frame::ImageFrame, Result};
use tokio::time::{sleep, Duration};
use tracing::info;
use uuid::Uuid;

use crate::{camera_error, CameraBackend, MediaStream, VideoConstraints};

#[derive(Default)]
struct MockState {
    opened: AtomicUsize,
    stopped: AtomicUsize,
    live: AtomicUsize,
    denial: Mutex<Option<String>>,
    frame_fault: Mutex<Option<String>>,
    stopped_ids: Mutex<Vec<String>>,
}

/// In-process camera producing flat grey frames. Clones share counters so a
/// test can hand one clone to the guard and inspect the other.
#[derive(Clone)]
pub struct MockCamera {
    state: Arc<MockState>,
    width: u32,
    height: u32,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::with_size(64, 48)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            width,
            height,
        }
    }

    /// Make subsequent opens fail with `reason`.
    pub fn deny(&self, reason: impl Into<String>) {
        if let Ok(mut denial) = self.state.denial.lock() {
            *denial = Some(reason.into());
        }
    }

    pub fn allow(&self) {
        if let Ok(mut denial) = self.state.denial.lock() {
            *denial = None;
        }
    }

    /// Make frame grabs on every open stream fail with `reason` (a device
    /// that opens but stops delivering frames).
    pub fn break_frames(&self, reason: impl Into<String>) {
        if let Ok(mut fault) = self.state.frame_fault.lock() {
            *fault = Some(reason.into());
        }
    }

    pub fn fix_frames(&self) {
        if let Ok(mut fault) = self.state.frame_fault.lock() {
            *fault = None;
        }
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.state.stopped.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self, stream_id: &str) -> bool {
        self.state
            .stopped_ids
            .lock()
            .map(|ids| ids.iter().any(|id| id == stream_id))
            .unwrap_or(false)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraBackend for MockCamera {
    async fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn MediaStream>> {
        sleep(Duration::from_millis(5)).await;
        let denial = self.state.denial.lock().ok().and_then(|d| d.clone());
        if let Some(reason) = denial {
            return Err(camera_error(reason));
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        let id = Uuid::new_v4().to_string();
        info!(
            "Opening mock camera stream {} (ideal {}x{}, facing {})",
            id, constraints.ideal_width, constraints.ideal_height, constraints.facing_mode
        );
        Ok(Box::new(MockStream {
            id,
            state: Arc::clone(&self.state),
            width: self.width,
            height: self.height,
            live: true,
        }))
    }
}

struct MockStream {
    id: String,
    state: Arc<MockState>,
    width: u32,
    height: u32,
    live: bool,
}

#[async_trait]
impl MediaStream for MockStream {
    fn id(&self) -> &str {
        &self.id
    }

    async fn grab_frame(&self) -> Result<ImageFrame> {
        if !self.live {
            return Err(camera_error("stream has been stopped"));
        }
        sleep(Duration::from_millis(2)).await;
        let fault = self.state.frame_fault.lock().ok().and_then(|f| f.clone());
        if let Some(reason) = fault {
            return Err(camera_error(reason));
        }
        let pixels = (self.width * self.height) as usize;
        let data = [128u8, 128, 128, 255].repeat(pixels);
        Ok(ImageFrame::from_rgba(self.width, self.height, data))
    }

    fn stop_tracks(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.state.stopped.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut ids) = self.state.stopped_ids.lock() {
            ids.push(self.id.clone());
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

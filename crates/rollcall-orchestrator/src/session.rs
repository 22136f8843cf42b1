//! Room-capture state machine.
//!
//! `Idle -> Live -> Capturing -> AwaitingResult -> Reviewed -> Saved`, with
//! `Errored` reachable from the three middle states. Each session carries an
//! instance identity; results addressed to another instance are ignored.

use chrono::{DateTime, Utc};
use rollcall_camera::MediaGuard;
use rollcall_types::{
    config::CourseConfig, frame::StillImage, roster::RecognitionResult, session::SessionRecord,
    Result, RollcallError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::orchestrator_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInstance(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Live,
    Capturing,
    AwaitingResult,
    Reviewed,
    Saved,
    Errored,
}

/// Where an `Errored` session came from; decides where acknowledgment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorOrigin {
    Camera,
    Recognition,
}

/// A still image on its way to the recognition collaborator.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    pub instance: SessionInstance,
    pub image: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reviewed,
    Failed(String),
    /// The result arrived for a session that is no longer waiting for it.
    Ignored,
}

#[derive(Debug)]
pub struct CaptureSession {
    instance: SessionInstance,
    state: CaptureState,
    still: Option<StillImage>,
    result: Option<RecognitionResult>,
    captured_at: Option<DateTime<Utc>>,
    error: Option<(ErrorOrigin, String)>,
    saving: bool,
}

impl CaptureSession {
    pub fn new(instance: SessionInstance) -> Self {
        Self {
            instance,
            state: CaptureState::Idle,
            still: None,
            result: None,
            captured_at: None,
            error: None,
            saving: false,
        }
    }

    pub fn instance(&self) -> SessionInstance {
        self.instance
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        self.result.as_ref()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    pub fn still(&self) -> Option<&StillImage> {
        self.still.as_ref()
    }

    pub fn error_origin(&self) -> Option<ErrorOrigin> {
        self.error.as_ref().map(|(origin, _)| *origin)
    }

    /// Capture is only offered while the camera is live and nothing is in flight.
    pub fn can_capture(&self) -> bool {
        self.state == CaptureState::Live
    }

    pub fn can_save(&self) -> bool {
        self.state == CaptureState::Reviewed && !self.saving
    }

    /// `Idle -> Live`, acquiring the camera for `surface`.
    pub async fn start(&mut self, guard: &mut MediaGuard, surface: &str) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(self.invalid("start the camera"));
        }
        match guard.acquire(surface).await {
            Ok(()) => {
                self.state = CaptureState::Live;
                info!(instance = self.instance.0, "capture session live");
                Ok(())
            }
            Err(err) => {
                self.fail(ErrorOrigin::Camera, err.user_message());
                Err(err)
            }
        }
    }

    /// `Live -> Capturing -> AwaitingResult`: freeze the current frame and
    /// hand back the request to submit.
    pub async fn begin_capture(&mut self, guard: &MediaGuard, quality: u8) -> Result<ScanTicket> {
        if self.state != CaptureState::Live {
            return Err(self.invalid("capture"));
        }
        self.state = CaptureState::Capturing;

        let still = match guard.capture_still(quality).await {
            Ok(still) => still,
            Err(err) => {
                self.fail(ErrorOrigin::Camera, err.user_message());
                return Err(err);
            }
        };

        let ticket = ScanTicket {
            instance: self.instance,
            image: still.jpeg.clone(),
            captured_at: still.captured_at,
        };
        self.still = Some(still);
        self.state = CaptureState::AwaitingResult;
        debug!(instance = self.instance.0, bytes = ticket.image.len(), "still submitted for recognition");
        Ok(ticket)
    }

    /// Apply the collaborator's answer if this session issued the request and
    /// is still waiting for it.
    pub fn resolve(
        &mut self,
        instance: SessionInstance,
        outcome: Result<RecognitionResult>,
    ) -> Resolution {
        if instance != self.instance || self.state != CaptureState::AwaitingResult {
            debug!(
                result_for = instance.0,
                current = self.instance.0,
                state = ?self.state,
                "ignoring late recognition result"
            );
            return Resolution::Ignored;
        }

        match outcome {
            Ok(result) => {
                self.captured_at = self.still.as_ref().map(|still| still.captured_at);
                info!(
                    instance = self.instance.0,
                    recognized = result.recognized_count(),
                    unknowns = result.unknown_count,
                    "capture reviewed"
                );
                self.result = Some(result);
                self.state = CaptureState::Reviewed;
                Resolution::Reviewed
            }
            Err(err) => {
                self.still = None;
                let message = err.user_message();
                self.fail(ErrorOrigin::Recognition, message.clone());
                Resolution::Failed(message)
            }
        }
    }

    /// Leave `Errored`: back to `Live` after a recognition failure while the
    /// camera is still held (retry without re-acquiring), otherwise release
    /// the camera and return to the pre-acquire `Idle`.
    pub fn acknowledge_error(&mut self, guard: &mut MediaGuard) -> CaptureState {
        if self.state != CaptureState::Errored {
            return self.state;
        }
        self.state = match self.error_origin() {
            Some(ErrorOrigin::Recognition) if guard.is_active() => CaptureState::Live,
            _ => {
                guard.release();
                CaptureState::Idle
            }
        };
        if let Some((origin, message)) = self.error.take() {
            debug!(instance = self.instance.0, ?origin, %message, next = ?self.state, "error acknowledged");
        }
        self.state
    }

    /// Assemble the record to persist and mark the save as in flight.
    pub fn begin_save(&mut self, course: &CourseConfig) -> Result<SessionRecord> {
        if self.saving {
            return Err(RollcallError::Validation("session save already in progress".into()));
        }
        let (Some(result), CaptureState::Reviewed) = (&self.result, self.state) else {
            return Err(RollcallError::Validation("No capture to save".into()));
        };
        self.saving = true;
        Ok(SessionRecord::from_result(
            &course.name,
            &course.code,
            result,
            self.captured_at.unwrap_or_else(Utc::now),
        ))
    }

    /// `Reviewed -> Saved` on success; stays `Reviewed` on failure.
    pub fn finish_save(&mut self, succeeded: bool) {
        self.saving = false;
        if self.state != CaptureState::Reviewed {
            return;
        }
        if succeeded {
            self.state = CaptureState::Saved;
            info!(instance = self.instance.0, "capture session saved");
        } else {
            warn!(instance = self.instance.0, "session save failed, keeping review");
        }
    }

    fn fail(&mut self, origin: ErrorOrigin, message: String) {
        warn!(instance = self.instance.0, ?origin, %message, "capture session errored");
        self.error = Some((origin, message));
        self.state = CaptureState::Errored;
    }

    fn invalid(&self, action: &str) -> RollcallError {
        orchestrator_error(format!("cannot {action} while {:?}", self.state))
    }
}

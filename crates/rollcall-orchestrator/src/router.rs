//! View router owning the camera guard and every per-view workflow.

use std::sync::Arc;

use rollcall_attendance::{preview, reconcile_latest, summarize_detection};
use rollcall_camera::{CameraBackend, MediaGuard, VideoConstraints};
use rollcall_network::{AttendanceApi, NoticeBus};
use rollcall_ops::ActivityLog;
use rollcall_photos::{UploadBlob, UploadReport, MAX_PHOTOS};
use rollcall_types::{
    attendance::{AttendancePreview, AttendanceReport, DetectionSummary},
    config::RollcallConfig,
    events::{AlertLevel, CameraStatus, UiEvent, UiPayload},
    roster::{DashboardStats, RecognitionResult},
    view::{PhotoMode, View},
    Result, RollcallError,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    orchestrator_error,
    registration::{PhotoCapture, RegistrationForm, RegistrationWorkflow},
    session::{CaptureSession, CaptureState, Resolution, ScanTicket, SessionInstance},
};

struct RouterState {
    view: View,
    /// Bumped on every navigation; loads started under an older value are stale.
    generation: u64,
    guard: MediaGuard,
    capture: CaptureSession,
    next_instance: u64,
    registration: RegistrationWorkflow,
    dashboard: Option<DashboardStats>,
    review: Option<AttendanceReport>,
    detection: Option<(DetectionSummary, AttendancePreview)>,
}

impl RouterState {
    fn renew_capture(&mut self) {
        self.next_instance += 1;
        let instance = SessionInstance(self.next_instance);
        self.capture = CaptureSession::new(instance);
        self.detection = None;
    }

    fn require_view(&self, view: View, action: &str) -> Result<()> {
        if self.view == view {
            Ok(())
        } else {
            Err(orchestrator_error(format!(
                "{action} is only available from the {view} view (current: {})",
                self.view
            )))
        }
    }

    fn photos_changed(&self) -> UiPayload {
        let photos = self.registration.photos();
        UiPayload::PhotosChanged {
            count: photos.len(),
            progress: photos.progress_fraction(),
        }
    }
}

/// Single entry point for switching views. Navigation always releases the
/// camera before the next view initializes, and every asynchronous result is
/// checked against the navigation or session it was started for.
pub struct Router<A: AttendanceApi> {
    state: Arc<Mutex<RouterState>>,
    api: Arc<A>,
    bus: NoticeBus,
    activity: ActivityLog,
    config: Arc<RollcallConfig>,
}

impl<A: AttendanceApi> Clone for Router<A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            api: Arc::clone(&self.api),
            bus: self.bus.clone(),
            activity: self.activity.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: AttendanceApi + 'static> Router<A> {
    pub fn new(
        config: RollcallConfig,
        camera: Arc<dyn CameraBackend>,
        api: A,
        bus: NoticeBus,
        activity: ActivityLog,
    ) -> Self {
        let guard = MediaGuard::new(camera, VideoConstraints::from_config(&config.camera));
        let state = RouterState {
            view: View::Dashboard,
            generation: 0,
            guard,
            capture: CaptureSession::new(SessionInstance(0)),
            next_instance: 0,
            registration: RegistrationWorkflow::new(),
            dashboard: None,
            review: None,
            detection: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            api: Arc::new(api),
            bus,
            activity,
            config: Arc::new(config),
        }
    }

    /// Enter the dashboard, the initial view.
    pub async fn boot(&self) {
        self.navigate(View::Dashboard).await;
    }

    pub async fn navigate(&self, view: View) {
        let generation = {
            let mut state = self.state.lock().await;
            state.guard.release();
            let from = state.view;
            state.view = view;
            state.generation += 1;
            state.renew_capture();
            info!(%from, to = %view, generation = state.generation, "navigating");
            state.generation
        };

        match view {
            View::Dashboard => self.load_dashboard(generation).await,
            View::Register => self.enter_register(generation).await,
            View::Capture => self.enter_capture(generation).await,
            View::Review => self.load_review(generation).await,
        }

        self.publish(UiPayload::ViewChanged(view)).await;
    }

    /// Release the camera; the router stays usable.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.guard.release() {
            info!("camera released on shutdown");
        }
    }

    async fn current(&self, generation: u64) -> Option<MutexGuard<'_, RouterState>> {
        let state = self.state.lock().await;
        if state.generation == generation {
            Some(state)
        } else {
            debug!(generation, current = state.generation, "dropping stale view load");
            None
        }
    }

    async fn load_dashboard(&self, generation: u64) {
        let stats = match self.api.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "failed to load dashboard stats");
                return;
            }
        };
        let Some(mut state) = self.current(generation).await else {
            return;
        };
        state.dashboard = Some(stats.clone());
        drop(state);
        self.publish(UiPayload::DashboardLoaded(stats)).await;
    }

    async fn load_review(&self, generation: u64) {
        let (roster, sessions) = match futures::try_join!(self.api.roster(), self.api.sessions()) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, "failed to load review data");
                return;
            }
        };
        let report = reconcile_latest(&roster, &sessions);
        let Some(mut state) = self.current(generation).await else {
            return;
        };
        state.review = Some(report.clone());
        drop(state);
        self.publish(UiPayload::ReviewLoaded(report)).await;
    }

    async fn enter_register(&self, generation: u64) {
        let Some(mut state) = self.current(generation).await else {
            return;
        };
        state.registration.reset();
        self.publish(state.photos_changed()).await;
        if let Err(err) = self.start_register_camera(&mut state).await {
            debug!(error = %err, "register view opened without a camera");
        }
    }

    async fn enter_capture(&self, generation: u64) {
        let Some(mut state) = self.current(generation).await else {
            return;
        };
        if let Err(err) = self.start_capture_camera(&mut state).await {
            debug!(error = %err, "capture view opened without a camera");
        }
    }

    async fn start_capture_camera(&self, state: &mut RouterState) -> Result<()> {
        self.publish(UiPayload::CameraStatus(CameraStatus::Initializing))
            .await;
        match state
            .capture
            .start(&mut state.guard, &self.config.camera.capture_surface)
            .await
        {
            Ok(()) => {
                self.publish(UiPayload::CameraStatus(CameraStatus::Live)).await;
                Ok(())
            }
            Err(err) => {
                self.camera_failed(&err).await;
                Err(err)
            }
        }
    }

    /// Re-acquire the room camera after an acknowledged camera error,
    /// without leaving the capture view.
    pub async fn restart_camera(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.require_view(View::Capture, "restarting the camera")?;
        if state.capture.state() != CaptureState::Idle {
            return Err(orchestrator_error(format!(
                "cannot restart the camera while {:?}",
                state.capture.state()
            )));
        }
        self.start_capture_camera(&mut state).await
    }

    async fn start_register_camera(&self, state: &mut RouterState) -> Result<()> {
        self.publish(UiPayload::CameraStatus(CameraStatus::Initializing))
            .await;
        match state.guard.acquire(&self.config.camera.register_surface).await {
            Ok(()) => {
                self.publish(UiPayload::CameraStatus(CameraStatus::Live)).await;
                Ok(())
            }
            Err(err) => {
                self.camera_failed(&err).await;
                Err(err)
            }
        }
    }

    async fn camera_failed(&self, err: &RollcallError) {
        self.publish(UiPayload::CameraStatus(CameraStatus::Error))
            .await;
        self.alert(AlertLevel::Error, err.user_message()).await;
    }

    pub async fn set_photo_mode(&self, mode: PhotoMode) -> Result<()> {
        let mut state = self.state.lock().await;
        state.require_view(View::Register, "changing photo mode")?;
        if state.registration.mode() == mode {
            return Ok(());
        }
        state.registration.set_mode(mode);
        self.publish(state.photos_changed()).await;
        match mode {
            PhotoMode::Upload => {
                state.guard.release();
                Ok(())
            }
            PhotoMode::Camera => self.start_register_camera(&mut state).await,
        }
    }

    /// Add one camera photo to the registration batch. `Ok(None)` when the
    /// batch is already full.
    pub async fn capture_photo(&self) -> Result<Option<Uuid>> {
        let mut state = self.state.lock().await;
        state.require_view(View::Register, "photo capture")?;
        let quality = self.config.camera.register_jpeg_quality;
        let state = &mut *state;
        match state.registration.capture(&state.guard, quality).await {
            Ok(PhotoCapture::Added(id)) => {
                self.publish(state.photos_changed()).await;
                Ok(Some(id))
            }
            Ok(PhotoCapture::AtCapacity) => {
                self.alert(
                    AlertLevel::Info,
                    format!("Maximum number of photos ({MAX_PHOTOS}) reached"),
                )
                .await;
                Ok(None)
            }
            Err(err) => {
                self.alert(AlertLevel::Error, err.user_message()).await;
                Err(err)
            }
        }
    }

    pub async fn upload_photos(&self, files: Vec<UploadBlob>) -> Result<UploadReport> {
        let mut state = self.state.lock().await;
        state.require_view(View::Register, "photo upload")?;
        let report = state.registration.upload(files).await;
        self.publish(state.photos_changed()).await;
        drop(state);

        if !report.skipped_over_capacity.is_empty() {
            self.alert(
                AlertLevel::Info,
                format!("Maximum number of photos ({MAX_PHOTOS}) reached"),
            )
            .await;
        }
        if !report.failed_decode.is_empty() || !report.skipped_non_image.is_empty() {
            debug!(
                undecodable = ?report.failed_decode,
                non_image = ?report.skipped_non_image,
                "upload files skipped"
            );
        }
        Ok(report)
    }

    pub async fn remove_photo(&self, photo_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.registration.remove(photo_id);
        if removed {
            self.publish(state.photos_changed()).await;
        }
        removed
    }

    /// Validate locally, upload, and on success return to the dashboard.
    pub async fn submit_registration(&self, form: RegistrationForm) -> Result<()> {
        let prepared = {
            let mut state = self.state.lock().await;
            state
                .require_view(View::Register, "registration")
                .and_then(|_| state.registration.begin_submit(&form))
                .map(|request| (request, state.generation))
        };
        let (request, generation) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.alert(AlertLevel::Error, err.user_message()).await;
                return Err(err);
            }
        };
        let (name, matricule) = (request.name.clone(), request.matricule.clone());

        let outcome = self.api.register(request).await;
        let still_current = match self.current(generation).await {
            Some(mut state) => {
                state.registration.finish_submit(outcome.is_ok());
                true
            }
            None => false,
        };

        match outcome {
            Ok(()) => {
                self.alert(
                    AlertLevel::Success,
                    format!("Student {name} ({matricule}) registered successfully"),
                )
                .await;
                if still_current {
                    self.navigate(View::Dashboard).await;
                }
                Ok(())
            }
            Err(err) => {
                self.alert(
                    AlertLevel::Error,
                    format!("Registration failed: {}", err.user_message()),
                )
                .await;
                Err(err)
            }
        }
    }

    /// Freeze the room camera and hand back the request to submit.
    pub async fn begin_room_scan(&self) -> Result<ScanTicket> {
        let captured = {
            let mut state = self.state.lock().await;
            let quality = self.config.camera.capture_jpeg_quality;
            let state = &mut *state;
            match state.require_view(View::Capture, "room capture") {
                Ok(()) => state.capture.begin_capture(&state.guard, quality).await,
                Err(err) => Err(err),
            }
        };
        if let Err(err) = &captured {
            self.alert(AlertLevel::Error, err.user_message()).await;
        }
        captured
    }

    /// Apply a recognition outcome to the session that requested it.
    pub async fn complete_room_scan(
        &self,
        instance: SessionInstance,
        outcome: Result<RecognitionResult>,
    ) -> Resolution {
        let mut state = self.state.lock().await;
        let resolution = state.capture.resolve(instance, outcome);
        match &resolution {
            Resolution::Reviewed => {
                let class_size = self.config.course.expected_class_size;
                let reviewed = state
                    .capture
                    .result()
                    .map(|result| (summarize_detection(result), preview(result, class_size)));
                if let Some((summary, preview)) = reviewed {
                    state.detection = Some((summary.clone(), preview.clone()));
                    drop(state);
                    self.publish(UiPayload::ScanReviewed { summary, preview })
                        .await;
                }
            }
            Resolution::Failed(message) => {
                drop(state);
                self.alert(AlertLevel::Error, format!("Scan failed: {message}"))
                    .await;
            }
            Resolution::Ignored => {
                debug!(instance = instance.0, "recognition result arrived after navigation");
            }
        }
        resolution
    }

    /// Capture the room, submit it for recognition, and review the result.
    pub async fn capture_room(&self) -> Result<Resolution> {
        let ScanTicket {
            instance, image, ..
        } = self.begin_room_scan().await?;
        let outcome = self.api.scan(image).await;
        Ok(self.complete_room_scan(instance, outcome).await)
    }

    pub async fn acknowledge_error(&self) -> CaptureState {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        state.capture.acknowledge_error(&mut state.guard)
    }

    /// Persist the reviewed capture, then show the review.
    pub async fn save_session(&self) -> Result<()> {
        let prepared = {
            let mut state = self.state.lock().await;
            state
                .require_view(View::Capture, "saving a session")
                .and_then(|_| state.capture.begin_save(&self.config.course))
                .map(|record| (record, state.capture.instance()))
        };
        let (record, instance) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.alert(AlertLevel::Error, err.user_message()).await;
                return Err(err);
            }
        };

        let outcome = self.api.create_session(&record).await;
        let still_current = {
            let mut state = self.state.lock().await;
            let current = state.capture.instance() == instance;
            if current {
                state.capture.finish_save(outcome.is_ok());
            }
            current
        };

        match outcome {
            Ok(()) => {
                self.publish(UiPayload::SessionSaved).await;
                self.alert(AlertLevel::Success, "Session saved successfully")
                    .await;
                if still_current {
                    self.navigate(View::Review).await;
                }
                Ok(())
            }
            Err(err) => {
                self.alert(
                    AlertLevel::Error,
                    format!("Failed to save session: {}", err.user_message()),
                )
                .await;
                Err(err)
            }
        }
    }

    pub async fn current_view(&self) -> View {
        self.state.lock().await.view
    }

    pub async fn capture_state(&self) -> CaptureState {
        self.state.lock().await.capture.state()
    }

    pub async fn capture_instance(&self) -> SessionInstance {
        self.state.lock().await.capture.instance()
    }

    pub async fn camera_active(&self) -> bool {
        self.state.lock().await.guard.is_active()
    }

    pub async fn camera_surface(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .guard
            .active_surface()
            .map(str::to_string)
    }

    pub async fn photo_mode(&self) -> PhotoMode {
        self.state.lock().await.registration.mode()
    }

    pub async fn photo_count(&self) -> usize {
        self.state.lock().await.registration.photos().len()
    }

    pub async fn dashboard(&self) -> Option<DashboardStats> {
        self.state.lock().await.dashboard.clone()
    }

    pub async fn review(&self) -> Option<AttendanceReport> {
        self.state.lock().await.review.clone()
    }

    pub async fn detection(&self) -> Option<(DetectionSummary, AttendancePreview)> {
        self.state.lock().await.detection.clone()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.bus
    }

    async fn alert(&self, level: AlertLevel, message: impl Into<String>) {
        self.publish_event(UiEvent::alert(level, message)).await;
    }

    async fn publish(&self, payload: UiPayload) {
        self.publish_event(UiEvent::new(payload)).await;
    }

    async fn publish_event(&self, event: UiEvent) {
        self.bus.publish(event.clone());
        self.activity.record(event).await;
    }
}

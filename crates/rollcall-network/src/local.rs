//! In-process collaborator applying the backend's rules to in-memory state.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Local;
use rollcall_types::{
    roster::{DashboardStats, RecognitionResult, RosterEntry},
    session::{SessionRecord, SessionStudent, StoredSession},
    Result,
};
use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::{collaborator_error, AttendanceApi, RegistrationRequest};

const MIN_REGISTRATION_PHOTOS: usize = 3;
const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Roster,
    Sessions,
    Stats,
    Register,
    Scan,
    CreateSession,
}

/// Holds scan responses until released.
#[derive(Clone, Default)]
pub struct ScanGate {
    notify: Arc<Notify>,
}

impl ScanGate {
    /// Let one pending (or the next) scan respond.
    pub fn release_one(&self) {
        self.notify.notify_one();
    }
}

#[derive(Debug, Clone)]
struct StoredStudent {
    name: String,
    matricule: String,
    photos: Vec<String>,
}

#[derive(Default)]
struct LocalState {
    students: Vec<StoredStudent>,
    sessions: Vec<StoredSession>,
    scan_results: VecDeque<RecognitionResult>,
    failures: HashMap<Endpoint, String>,
    scans_received: usize,
}

/// Collaborator that keeps students and sessions in memory. Scan results are
/// scripted with [`LocalApi::queue_scan`]; an empty script recognizes nobody.
#[derive(Clone, Default)]
pub struct LocalApi {
    state: Arc<Mutex<LocalState>>,
    gate: Option<ScanGate>,
}

impl LocalApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every scan wait for [`ScanGate::release_one`] before responding.
    pub fn with_scan_gate(mut self) -> (Self, ScanGate) {
        let gate = ScanGate::default();
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub async fn seed_student(&self, matricule: &str, name: &str) {
        let mut state = self.state.lock().await;
        state.students.push(StoredStudent {
            name: name.to_string(),
            matricule: matricule.to_string(),
            photos: vec![format!("images/{matricule}/photo1.jpg")],
        });
    }

    pub async fn queue_scan(&self, result: RecognitionResult) {
        self.state.lock().await.scan_results.push_back(result);
    }

    /// Fail the next call to `endpoint` with `message`.
    pub async fn fail_next(&self, endpoint: Endpoint, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .insert(endpoint, message.into());
    }

    pub async fn scans_received(&self) -> usize {
        self.state.lock().await.scans_received
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    async fn take_failure(&self, endpoint: Endpoint) -> Result<()> {
        match self.state.lock().await.failures.remove(&endpoint) {
            Some(message) => Err(collaborator_error(message)),
            None => Ok(()),
        }
    }
}

fn allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl AttendanceApi for LocalApi {
    async fn roster(&self) -> Result<Vec<RosterEntry>> {
        self.take_failure(Endpoint::Roster).await?;
        let state = self.state.lock().await;
        Ok(state
            .students
            .iter()
            .map(|student| RosterEntry {
                matricule: student.matricule.clone(),
                name: student.name.clone(),
                reference_photo_path: student.photos.first().cloned(),
            })
            .collect())
    }

    async fn sessions(&self) -> Result<Vec<StoredSession>> {
        self.take_failure(Endpoint::Sessions).await?;
        Ok(self.state.lock().await.sessions.clone())
    }

    async fn stats(&self) -> Result<DashboardStats> {
        self.take_failure(Endpoint::Stats).await?;
        let state = self.state.lock().await;
        let total_students = state.students.len() as u32;
        let total_sessions = state.sessions.len() as u32;

        let total_possible = total_sessions * total_students;
        let attendance_rate = if total_possible > 0 {
            let recognized: u32 = state.sessions.iter().map(|s| s.recognized_count).sum();
            (recognized as f64 / total_possible as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        let today = Local::now().format("%Y-%m-%d").to_string();
        let today_sessions = state
            .sessions
            .iter()
            .filter(|s| s.date.as_deref() == Some(today.as_str()))
            .count() as u32;

        Ok(DashboardStats {
            total_students,
            total_sessions: today_sessions,
            attendance_rate,
        })
    }

    async fn register(&self, request: RegistrationRequest) -> Result<()> {
        self.take_failure(Endpoint::Register).await?;
        if request.name.is_empty() || request.matricule.is_empty() {
            return Err(collaborator_error("Name and matricule are required"));
        }
        if request.photos.len() < MIN_REGISTRATION_PHOTOS {
            return Err(collaborator_error("At least 3 photos are required"));
        }
        if let Some(bad) = request.photos.iter().find(|p| !allowed_file(&p.file_name)) {
            return Err(collaborator_error(format!("Invalid file: {}", bad.file_name)));
        }

        let mut state = self.state.lock().await;
        if state
            .students
            .iter()
            .any(|s| s.matricule == request.matricule)
        {
            return Err(collaborator_error("Matricule already exists"));
        }
        let photos = (1..=request.photos.len())
            .map(|idx| format!("images/{}/photo{idx}.jpg", request.matricule))
            .collect();
        info!(matricule = %request.matricule, "local collaborator registered student");
        state.students.push(StoredStudent {
            name: request.name,
            matricule: request.matricule,
            photos,
        });
        Ok(())
    }

    async fn scan(&self, jpeg: Vec<u8>) -> Result<RecognitionResult> {
        {
            let mut state = self.state.lock().await;
            state.scans_received += 1;
        }
        if let Some(gate) = &self.gate {
            gate.notify.notified().await;
        }
        self.take_failure(Endpoint::Scan).await?;
        if jpeg.is_empty() {
            return Err(collaborator_error("No image provided"));
        }
        let result = self
            .state
            .lock()
            .await
            .scan_results
            .pop_front()
            .unwrap_or_else(RecognitionResult::empty);
        Ok(result)
    }

    async fn create_session(&self, record: &SessionRecord) -> Result<()> {
        self.take_failure(Endpoint::CreateSession).await?;
        let now = Local::now();
        let session = StoredSession {
            id: Some(format!("session_{}", now.format("%Y%m%d_%H%M%S"))),
            date: Some(now.format("%Y-%m-%d").to_string()),
            time: now.format("%H:%M").to_string(),
            course_name: Some(record.course_name.clone()),
            course_code: Some(record.course_code.clone()),
            recognized_count: record.recognized_students.len() as u32,
            unknown_count: record.unknown_count,
            students: record
                .recognized_students
                .iter()
                .map(|s| SessionStudent {
                    matricule: s.matricule.clone(),
                    name: Some(s.name.clone()),
                })
                .collect(),
        };
        info!(
            id = ?session.id,
            recognized = session.recognized_count,
            captured_at = %record.captured_at,
            "local collaborator stored session"
        );
        self.state.lock().await.sessions.push(session);
        Ok(())
    }
}

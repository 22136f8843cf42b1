//! HTTP client for the attendance backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Response,
};
use rollcall_types::{
    config::ApiConfig,
    roster::{DashboardStats, RecognitionResult, RosterEntry, RosterResponse},
    session::{SessionRecord, SessionsResponse, StoredSession},
    Result,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, warn};

use crate::{collaborator_error, AttendanceApi, RegistrationRequest};

/// Error body returned by the backend on non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| collaborator_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| transport_error(endpoint, err))?;
        read_json(endpoint, resp).await
    }

    async fn post_multipart<T: DeserializeOwned>(&self, endpoint: &str, form: Form) -> Result<T> {
        let url = self.url(endpoint);
        debug!(%url, "POST multipart");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error(endpoint, err))?;
        read_json(endpoint, resp).await
    }
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> rollcall_types::RollcallError {
    warn!(endpoint, error = %err, "collaborator request failed");
    if err.is_timeout() {
        collaborator_error(format!("request to {endpoint} timed out"))
    } else {
        collaborator_error(format!("request to {endpoint} failed: {err}"))
    }
}

/// Decode a JSON response, turning non-success statuses into a collaborator
/// error carrying the server message when one is present.
async fn read_json<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| collaborator_error(format!("failed to read {endpoint} response: {err}")))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error)
            .unwrap_or_else(|| format!("API error ({status})"));
        warn!(endpoint, %status, %message, "collaborator returned an error");
        return Err(collaborator_error(message));
    }

    serde_json::from_str(&body).map_err(|err| {
        collaborator_error(format!("malformed response from {endpoint}: {err}"))
    })
}

fn jpeg_part(bytes: Vec<u8>, file_name: String) -> Result<Part> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/jpeg")
        .map_err(|err| collaborator_error(format!("invalid multipart part: {err}")))
}

#[async_trait]
impl AttendanceApi for HttpApi {
    async fn roster(&self) -> Result<Vec<RosterEntry>> {
        let parsed: RosterResponse = self.get_json("/students").await?;
        Ok(parsed.students)
    }

    async fn sessions(&self) -> Result<Vec<StoredSession>> {
        let parsed: SessionsResponse = self.get_json("/sessions").await?;
        Ok(parsed.sessions)
    }

    async fn stats(&self) -> Result<DashboardStats> {
        self.get_json("/stats").await
    }

    async fn register(&self, request: RegistrationRequest) -> Result<()> {
        let mut form = Form::new()
            .text("name", request.name.clone())
            .text("matricule", request.matricule.clone());
        for photo in request.photos {
            form = form.part("photos", jpeg_part(photo.bytes, photo.file_name)?);
        }
        let _: serde_json::Value = self.post_multipart("/register", form).await?;
        info!(matricule = %request.matricule, "student registered");
        Ok(())
    }

    async fn scan(&self, jpeg: Vec<u8>) -> Result<RecognitionResult> {
        let form = Form::new().part("image", jpeg_part(jpeg, "capture.jpg".into())?);
        let result: RecognitionResult = self.post_multipart("/scan", form).await?;
        info!(
            recognized = result.recognized_count(),
            unknowns = result.unknown_count,
            "scan completed"
        );
        Ok(result)
    }

    async fn create_session(&self, record: &SessionRecord) -> Result<()> {
        let url = self.url("/sessions");
        let resp = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|err| transport_error("/sessions", err))?;
        let _: serde_json::Value = read_json("/sessions", resp).await?;
        Ok(())
    }
}

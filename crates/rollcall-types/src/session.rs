use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::{RecognitionResult, RecognizedStudent};

/// Payload submitted once per saved capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub course_name: String,
    pub course_code: String,
    #[serde(rename = "recognized")]
    pub recognized_students: Vec<RecognizedStudent>,
    #[serde(rename = "unknowns")]
    pub unknown_count: u32,
    pub total_presents: u32,
    pub captured_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_result(
        course_name: impl Into<String>,
        course_code: impl Into<String>,
        result: &RecognitionResult,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            course_name: course_name.into(),
            course_code: course_code.into(),
            recognized_students: result.recognized_students.clone(),
            unknown_count: result.unknown_count,
            total_presents: result.total_presents,
            captured_at,
        }
    }
}

/// Minimal student reference inside a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStudent {
    pub matricule: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A session as returned by the sessions query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Display time of the capture, e.g. `"09:42"`.
    pub time: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub recognized_count: u32,
    #[serde(default)]
    pub unknown_count: u32,
    pub students: Vec<SessionStudent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<StoredSession>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_record_uses_collaborator_field_names() {
        let result = RecognitionResult {
            recognized_students: vec![RecognizedStudent {
                matricule: "A1".into(),
                name: "Alice".into(),
                photo_path: None,
            }],
            unknown_count: 1,
            total_presents: 2,
        };
        let record = SessionRecord::from_result("IHM", "ANI-IA 4057", &result, Utc::now());
        let value = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(value["course_code"], "ANI-IA 4057");
        assert_eq!(value["recognized"][0]["matricule"], "A1");
        assert_eq!(value["unknowns"], 1);
        assert_eq!(value["total_presents"], 2);
    }

    #[test]
    fn parse_sessions_with_optional_fields() {
        let body = r#"{"total": 2, "sessions": [
            {"time": "08:00", "students": [{"matricule": "A1"}]},
            {"id": "session_2", "time": "10:15", "students": [], "recognized_count": 0}
        ]}"#;
        let parsed: SessionsResponse = serde_json::from_str(body).expect("parse sessions");
        assert_eq!(parsed.sessions.len(), 2);
        assert_eq!(parsed.sessions[0].students[0].matricule, "A1");
        assert_eq!(parsed.sessions[0].recognized_count, 0);
        assert_eq!(parsed.sessions[1].id.as_deref(), Some("session_2"));
        assert_eq!(parsed.sessions[1].time, "10:15");
    }
}

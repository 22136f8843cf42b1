//! Roster and recognition types, with the wire shapes of the collaborator
//! endpoints that carry them.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Upper bound on the unknown-face count accepted from the collaborator. A
/// classroom frame never holds more faces than this.
pub const MAX_UNKNOWN_FACES: u32 = 500;

/// An enrolled student as returned by the roster endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub matricule: String,
    pub name: String,
    #[serde(rename = "photo", default)]
    pub reference_photo_path: Option<String>,
}

impl RosterEntry {
    pub fn new(matricule: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            matricule: matricule.into(),
            name: name.into(),
            reference_photo_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    pub students: Vec<RosterEntry>,
}

/// A face the recognition collaborator matched to an enrolled student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedStudent {
    pub matricule: String,
    pub name: String,
    #[serde(rename = "photo", default)]
    pub photo_path: Option<String>,
}

/// Outcome of one room scan. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(rename = "recognized")]
    pub recognized_students: Vec<RecognizedStudent>,
    #[serde(rename = "unknowns", deserialize_with = "bounded_unknowns")]
    pub unknown_count: u32,
    #[serde(rename = "total_presents")]
    pub total_presents: u32,
}

impl RecognitionResult {
    pub fn empty() -> Self {
        Self {
            recognized_students: Vec::new(),
            unknown_count: 0,
            total_presents: 0,
        }
    }

    pub fn recognized_count(&self) -> usize {
        self.recognized_students.len()
    }
}

fn bounded_unknowns<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let count = u32::deserialize(deserializer)?;
    if count > MAX_UNKNOWN_FACES {
        return Err(D::Error::custom(format!(
            "unknowns {count} exceeds the limit of {MAX_UNKNOWN_FACES}"
        )));
    }
    Ok(count)
}

/// Aggregate numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_students: u32,
    pub total_sessions: u32,
    pub attendance_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scan_response() {
        let body = r#"{
            "recognized": [
                {"name": "Alice", "matricule": "A1", "photo": "db/photos/A1_0.jpg"},
                {"name": "Bob", "matricule": "A2", "photo": null}
            ],
            "unknowns": 2,
            "total_presents": 4
        }"#;
        let result: RecognitionResult = serde_json::from_str(body).expect("parse scan");
        assert_eq!(result.recognized_count(), 2);
        assert_eq!(result.recognized_students[0].matricule, "A1");
        assert_eq!(result.recognized_students[1].photo_path, None);
        assert_eq!(result.unknown_count, 2);
        assert_eq!(result.total_presents, 4);
    }

    #[test]
    fn reject_negative_unknown_count() {
        let body = r#"{"recognized": [], "unknowns": -1, "total_presents": 0}"#;
        assert!(serde_json::from_str::<RecognitionResult>(body).is_err());
    }

    #[test]
    fn reject_implausible_unknown_count() {
        let body = r#"{"recognized": [], "unknowns": 4294967295, "total_presents": 0}"#;
        let err = serde_json::from_str::<RecognitionResult>(body).expect_err("too many");
        assert!(err.to_string().contains("exceeds the limit of 500"));

        let body = format!(
            r#"{{"recognized": [], "unknowns": {MAX_UNKNOWN_FACES}, "total_presents": 0}}"#
        );
        let result: RecognitionResult = serde_json::from_str(&body).expect("at the limit");
        assert_eq!(result.unknown_count, MAX_UNKNOWN_FACES);
    }

    #[test]
    fn reject_missing_recognized_list() {
        let body = r#"{"unknowns": 0, "total_presents": 0}"#;
        assert!(serde_json::from_str::<RecognitionResult>(body).is_err());
    }

    #[test]
    fn roster_tolerates_extra_fields() {
        let body = r#"{"total": 1, "students": [
            {"name": "Alice", "matricule": "A1", "photo": "p.jpg", "registered_date": "2025-01-20"}
        ]}"#;
        let roster: RosterResponse = serde_json::from_str(body).expect("parse roster");
        assert_eq!(roster.students.len(), 1);
        assert_eq!(
            roster.students[0].reference_photo_path.as_deref(),
            Some("p.jpg")
        );
    }
}

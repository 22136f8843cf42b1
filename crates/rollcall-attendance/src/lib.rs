//! Reconciliation of recognition results against the class roster.
//!
//! Everything here is a pure function of its inputs: the roster, the
//! evidence of one session, and for previews the configured class size.

use std::collections::HashSet;

use rollcall_types::{
    attendance::{
        AttendancePreview, AttendanceReport, AttendanceRow, AttendanceTime, DetectedEntry,
        DetectionSummary,
    },
    roster::{RecognitionResult, RosterEntry, MAX_UNKNOWN_FACES},
    session::StoredSession,
};
use tracing::debug;

/// Evidence of who attended one session.
pub trait AttendanceSource {
    fn attended_matricules(&self) -> HashSet<&str>;
    /// Display time recorded for attendees.
    fn time(&self) -> &str;
}

impl AttendanceSource for StoredSession {
    fn attended_matricules(&self) -> HashSet<&str> {
        self.students.iter().map(|s| s.matricule.as_str()).collect()
    }

    fn time(&self) -> &str {
        &self.time
    }
}

/// A fresh recognition result paired with the time it was captured.
pub struct ScanEvidence<'a> {
    pub result: &'a RecognitionResult,
    pub time: String,
}

impl AttendanceSource for ScanEvidence<'_> {
    fn attended_matricules(&self) -> HashSet<&str> {
        self.result
            .recognized_students
            .iter()
            .map(|s| s.matricule.as_str())
            .collect()
    }

    fn time(&self) -> &str {
        &self.time
    }
}

/// Build one row per roster entry, in roster order. A student is present iff
/// their matricule appears exactly in the session evidence. Without a
/// session every student is absent.
pub fn reconcile<S: AttendanceSource>(roster: &[RosterEntry], session: Option<&S>) -> AttendanceReport {
    let attended = session
        .map(|s| s.attended_matricules())
        .unwrap_or_default();

    let rows: Vec<AttendanceRow> = roster
        .iter()
        .map(|student| {
            let present = attended.contains(student.matricule.as_str());
            let time = match (present, session) {
                (true, Some(s)) => AttendanceTime::At(s.time().to_string()),
                _ => AttendanceTime::Missing,
            };
            AttendanceRow {
                student: student.clone(),
                present,
                time,
            }
        })
        .collect();

    let present_count = rows.iter().filter(|row| row.present).count();
    let roster_size = rows.len();
    let report = AttendanceReport {
        rows,
        roster_size,
        present_count,
        absent_count: roster_size - present_count,
        rate: attendance_rate(present_count, roster_size),
        session_time: session.map(|s| s.time().to_string()),
    };
    debug!(
        roster_size,
        present = report.present_count,
        rate = report.rate,
        "attendance reconciled"
    );
    report
}

/// Reconcile against the most recent of the persisted sessions.
pub fn reconcile_latest(roster: &[RosterEntry], sessions: &[StoredSession]) -> AttendanceReport {
    reconcile(roster, sessions.last())
}

/// `round(present / total * 100)`, defined as 0 for an empty roster.
pub fn attendance_rate(present: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (present as f64 / total as f64 * 100.0).round() as u32
}

/// Detection list for the post-scan view: recognized students first in
/// collaborator order, then one numbered entry per unknown face (at most
/// [`MAX_UNKNOWN_FACES`] entries). Unknowns carry no matricule and are never
/// matched against the roster.
pub fn summarize_detection(result: &RecognitionResult) -> DetectionSummary {
    let mut entries: Vec<DetectedEntry> = result
        .recognized_students
        .iter()
        .cloned()
        .map(DetectedEntry::Recognized)
        .collect();
    let listed = result.unknown_count.min(MAX_UNKNOWN_FACES);
    if listed < result.unknown_count {
        debug!(unknowns = result.unknown_count, listed, "unknown faces truncated");
    }
    entries.extend((1..=listed).map(DetectedEntry::Unknown));

    DetectionSummary {
        entries,
        recognized_count: result.recognized_count(),
        unknown_count: result.unknown_count,
    }
}

/// Attendance estimate against the expected class size, before the session
/// is saved and reconciled against the real roster.
pub fn preview(result: &RecognitionResult, class_size: u32) -> AttendancePreview {
    let recognized = result.recognized_count();
    AttendancePreview {
        recognized_count: recognized,
        total_presents: result.total_presents,
        class_size,
        absent_count: class_size.saturating_sub(recognized as u32),
        rate: attendance_rate(recognized, class_size as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_types::{roster::RecognizedStudent, session::SessionStudent};

    fn roster() -> Vec<RosterEntry> {
        vec![RosterEntry::new("A1", "Alice"), RosterEntry::new("A2", "Bob")]
    }

    fn session(time: &str, matricules: &[&str]) -> StoredSession {
        StoredSession {
            id: None,
            date: None,
            time: time.into(),
            course_name: None,
            course_code: None,
            recognized_count: matricules.len() as u32,
            unknown_count: 0,
            students: matricules
                .iter()
                .map(|m| SessionStudent {
                    matricule: m.to_string(),
                    name: None,
                })
                .collect(),
        }
    }

    fn recognized(matricule: &str, name: &str) -> RecognizedStudent {
        RecognizedStudent {
            matricule: matricule.into(),
            name: name.into(),
            photo_path: None,
        }
    }

    #[test]
    fn reconcile_marks_exact_matches_present() {
        let report = reconcile(&roster(), Some(&session("09:15", &["A1"])));

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].student.name, "Alice");
        assert!(report.rows[0].present);
        assert_eq!(report.rows[0].time, AttendanceTime::At("09:15".into()));
        assert_eq!(report.rows[1].student.name, "Bob");
        assert!(!report.rows[1].present);
        assert_eq!(report.rows[1].time, AttendanceTime::Missing);
        assert_eq!(report.present_count, 1);
        assert_eq!(report.absent_count, 1);
        assert_eq!(report.rate, 50);
    }

    #[test]
    fn no_fuzzy_matching() {
        let report = reconcile(&roster(), Some(&session("09:15", &["a1", "A1 ", "A"])));
        assert_eq!(report.present_count, 0);
    }

    #[test]
    fn empty_roster_has_zero_rate() {
        let report = reconcile(&[], Some(&session("09:15", &["A1"])));
        assert_eq!(report.rate, 0);
        assert_eq!(report.present_count, 0);
        assert_eq!(report.absent_count, 0);
    }

    #[test]
    fn without_session_everyone_is_absent() {
        let report = reconcile::<StoredSession>(&roster(), None);
        assert_eq!(report.present_count, 0);
        assert_eq!(report.absent_count, 2);
        assert!(report.session_time.is_none());
        assert!(report.rows.iter().all(|r| r.time == AttendanceTime::Missing));
    }

    #[test]
    fn latest_session_wins() {
        let sessions = vec![session("08:00", &["A1", "A2"]), session("10:00", &["A2"])];
        let report = reconcile_latest(&roster(), &sessions);
        assert_eq!(report.session_time.as_deref(), Some("10:00"));
        assert!(!report.rows[0].present);
        assert!(report.rows[1].present);
    }

    #[test]
    fn rate_rounds_half_up() {
        assert_eq!(attendance_rate(1, 3), 33);
        assert_eq!(attendance_rate(2, 3), 67);
        assert_eq!(attendance_rate(1, 8), 13);
        assert_eq!(attendance_rate(0, 0), 0);
    }

    #[test]
    fn scan_evidence_reconciles_like_a_stored_session() {
        let result = RecognitionResult {
            recognized_students: vec![recognized("A2", "Bob")],
            unknown_count: 3,
            total_presents: 4,
        };
        let evidence = ScanEvidence {
            result: &result,
            time: "11:30".into(),
        };
        let report = reconcile(&roster(), Some(&evidence));
        assert_eq!(report.present_count, 1);
        assert!(report.rows[1].present);
    }

    #[test]
    fn detection_lists_recognized_before_unknowns() {
        let result = RecognitionResult {
            recognized_students: vec![recognized("B7", "Zoe"), recognized("A1", "Alice")],
            unknown_count: 2,
            total_presents: 4,
        };
        let summary = summarize_detection(&result);
        assert_eq!(
            summary.entries,
            vec![
                DetectedEntry::Recognized(recognized("B7", "Zoe")),
                DetectedEntry::Recognized(recognized("A1", "Alice")),
                DetectedEntry::Unknown(1),
                DetectedEntry::Unknown(2),
            ]
        );
        assert_eq!(summary.recognized_count, 2);
        assert!(summarize_detection(&RecognitionResult::empty()).is_empty());
    }

    #[test]
    fn detection_lists_a_bounded_number_of_unknowns() {
        let result = RecognitionResult {
            recognized_students: vec![recognized("A1", "Alice")],
            unknown_count: u32::MAX,
            total_presents: u32::MAX,
        };
        let summary = summarize_detection(&result);
        assert_eq!(summary.entries.len(), 1 + MAX_UNKNOWN_FACES as usize);
        assert_eq!(
            summary.entries.last(),
            Some(&DetectedEntry::Unknown(MAX_UNKNOWN_FACES))
        );
        assert_eq!(summary.unknown_count, u32::MAX);
    }

    #[test]
    fn preview_uses_class_size() {
        let result = RecognitionResult {
            recognized_students: vec![recognized("A1", "Alice"), recognized("A2", "Bob")],
            unknown_count: 1,
            total_presents: 3,
        };
        let preview = preview(&result, 45);
        assert_eq!(preview.rate, 4);
        assert_eq!(preview.absent_count, 43);
        assert_eq!(preview.total_presents, 3);

        let crowded = super::preview(&result, 1);
        assert_eq!(crowded.absent_count, 0);
    }
}

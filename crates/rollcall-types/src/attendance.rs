use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roster::{RecognizedStudent, RosterEntry};

/// Time column of an attendance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceTime {
    Missing,
    At(String),
}

impl fmt::Display for AttendanceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceTime::Missing => f.write_str("--:--"),
            AttendanceTime::At(time) => f.write_str(time),
        }
    }
}

/// Derived per-student row. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub student: RosterEntry,
    pub present: bool,
    pub time: AttendanceTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub rows: Vec<AttendanceRow>,
    pub roster_size: usize,
    pub present_count: usize,
    pub absent_count: usize,
    /// Whole percent, 0 for an empty roster.
    pub rate: u32,
    /// Display time of the session the report was built from, if any.
    pub session_time: Option<String>,
}

/// One entry of the post-scan detection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedEntry {
    Recognized(RecognizedStudent),
    /// 1-based ordinal among the unidentified faces.
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub entries: Vec<DetectedEntry>,
    pub recognized_count: usize,
    pub unknown_count: u32,
}

impl DetectionSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attendance estimate shown immediately after a scan, before saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendancePreview {
    pub recognized_count: usize,
    pub total_presents: u32,
    pub class_size: u32,
    pub absent_count: u32,
    pub rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_time_renders_sentinel() {
        assert_eq!(AttendanceTime::Missing.to_string(), "--:--");
        assert_eq!(AttendanceTime::At("09:30".into()).to_string(), "09:30");
    }
}

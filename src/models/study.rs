//! Study sessions and progress reporting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub topic: String,
    pub start_time: String,
    /// `None` while the session is active.
    pub end_time: Option<String>,
    /// Seconds; `None` while the session is active.
    pub duration: Option<i64>,
}

impl StudySession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Document,
    Quiz,
    Study,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    /// Display label, e.g. `Quiz: algebra`.
    pub name: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub documents_uploaded: u64,
    pub quizzes_generated: u64,
    pub study_sessions: u64,
    pub conversations: u64,
    /// Seconds across completed sessions.
    pub total_study_time: i64,
    pub total_study_time_formatted: String,
    pub topics_studied: Vec<String>,
    pub recent_activity: Vec<Activity>,
}

/// Format seconds as `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

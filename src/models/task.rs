use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    NotStarted,
    Incomplete,
    Paused,
    MadeProgress,
    Complete,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NotStarted",
            TaskStatus::Incomplete => "Incomplete",
            TaskStatus::Paused => "Paused",
            TaskStatus::MadeProgress => "MadeProgress",
            TaskStatus::Complete => "Complete",
            TaskStatus::Skipped => "Skipped",
        }
    }

    /// Terminal statuses cannot be recommitted within the same run; a
    /// made-progress continuation is a fresh duplicate task, not a reuse.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Complete | TaskStatus::MadeProgress | TaskStatus::Skipped
        )
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub is_liked: bool,
    pub is_urgent: bool,
    pub is_quick: bool,
    pub estimated_duration: Option<String>,
    pub notes: Option<String>,
    pub status: TaskStatus,
    pub position: i64,
    pub time_spent_minutes: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            is_liked: false,
            is_urgent: false,
            is_quick: false,
            estimated_duration: None,
            notes: None,
            status: TaskStatus::NotStarted,
            position,
            time_spent_minutes: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh copy for continuing work after "made progress": same title,
    /// tags, estimate and notes, but a new id and a clean lifecycle.
    pub fn continuation(&self, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: self.title.clone(),
            is_liked: self.is_liked,
            is_urgent: self.is_urgent,
            is_quick: self.is_quick,
            estimated_duration: self.estimated_duration.clone(),
            notes: self.notes.clone(),
            status: TaskStatus::NotStarted,
            position,
            time_spent_minutes: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseStatus {
    Running,
    Completed,
    Cancelled,
    Interrupted,
}

impl ExerciseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseStatus::Running => "Running",
            ExerciseStatus::Completed => "Completed",
            ExerciseStatus::Cancelled => "Cancelled",
            ExerciseStatus::Interrupted => "Interrupted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRecord {
    pub id: String,
    pub kind: ExerciseKind,
    pub status: ExerciseStatus,
    pub reps: u32,
    pub target_reps: u32,
    pub bonus: bool,
    pub minutes_earned: f64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

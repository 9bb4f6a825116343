use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persistent counters and the banked-minutes balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub banked_minutes: f64,
    /// Total minutes ever advanced through the once-daily emergency grant.
    pub debt_minutes: f64,
    /// Local calendar day of the last emergency grant.
    pub last_debt_day: Option<NaiveDate>,
    pub total_squats: u64,
    pub total_pushups: u64,
    pub updated_at: DateTime<Utc>,
}

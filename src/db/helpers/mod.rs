use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::models::ExerciseStatus;
use crate::exercise::ExerciseKind;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out of range value {value}"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_optional_day(value: Option<String>, field: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .with_context(|| format!("failed to parse {field}"))
        })
        .transpose()
}

pub fn parse_status(value: &str) -> Result<ExerciseStatus> {
    match value {
        "Running" => Ok(ExerciseStatus::Running),
        "Completed" => Ok(ExerciseStatus::Completed),
        "Cancelled" => Ok(ExerciseStatus::Cancelled),
        "Interrupted" => Ok(ExerciseStatus::Interrupted),
        other => Err(anyhow!("unknown exercise status {other}")),
    }
}

pub fn parse_kind(value: &str) -> Result<ExerciseKind> {
    match value {
        "Squat" => Ok(ExerciseKind::Squat),
        "Pushup" => Ok(ExerciseKind::Pushup),
        other => Err(anyhow!("unknown exercise kind {other}")),
    }
}

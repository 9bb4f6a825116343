use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_kind, parse_optional_datetime, parse_status, to_u32},
    models::{ExerciseRecord, ExerciseStatus},
};

const SELECT_COLUMNS: &str = "SELECT id, kind, status, reps, target_reps, bonus, minutes_earned, started_at, stopped_at, created_at, updated_at
     FROM exercise_sessions";

fn row_to_record(row: &Row) -> Result<ExerciseRecord> {
    let kind: String = row.get("kind")?;
    let status: String = row.get("status")?;
    let reps: i64 = row.get("reps")?;
    let target_reps: i64 = row.get("target_reps")?;
    let started_at: String = row.get("started_at")?;
    let stopped_at: Option<String> = row.get("stopped_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ExerciseRecord {
        id: row.get("id")?,
        kind: parse_kind(&kind)?,
        status: parse_status(&status)?,
        reps: to_u32(reps, "reps")?,
        target_reps: to_u32(target_reps, "target_reps")?,
        bonus: row.get("bonus")?,
        minutes_earned: row.get("minutes_earned")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        stopped_at: parse_optional_datetime(stopped_at, "stopped_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_exercise_session(&self, record: &ExerciseRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO exercise_sessions (id, kind, status, reps, target_reps, bonus, minutes_earned, started_at, stopped_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    record.kind.as_str(),
                    record.status.as_str(),
                    record.reps,
                    record.target_reps,
                    record.bonus,
                    record.minutes_earned,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn finish_exercise_session(
        &self,
        session_id: &str,
        status: ExerciseStatus,
        reps: u32,
        minutes_earned: f64,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE exercise_sessions
                 SET status = ?1,
                     reps = ?2,
                     minutes_earned = ?3,
                     stopped_at = ?4,
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    status.as_str(),
                    reps,
                    minutes_earned,
                    stopped_at.to_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_exercise_session(&self, session_id: &str) -> Result<Option<ExerciseRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Sessions left `Running` by a process that died mid-session.
    pub async fn get_running_exercise_sessions(&self) -> Result<Vec<ExerciseRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE status = 'Running' ORDER BY started_at DESC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn mark_exercise_interrupted(
        &self,
        session_id: &str,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT id FROM exercise_sessions WHERE id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                anyhow::bail!("exercise session {session_id} not found");
            }
            conn.execute(
                "UPDATE exercise_sessions
                 SET status = 'Interrupted',
                     stopped_at = ?1,
                     updated_at = ?1
                 WHERE id = ?2",
                params![stopped_at.to_rfc3339(), session_id],
            )?;
            Ok(())
        })
        .await
    }
}

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, TransactionBehavior};

use crate::bank::{DebtOutcome, SpendOutcome};
use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_day, to_i64, to_u64},
    models::UserStats,
};
use crate::exercise::ExerciseKind;

fn ensure_row(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_stats (id, updated_at) VALUES (1, ?1)",
        params![Utc::now().to_rfc3339()],
    )
    .context("failed to seed user_stats")?;
    Ok(())
}

fn read_stats(conn: &Connection) -> Result<UserStats> {
    ensure_row(conn)?;
    let (banked, debt, last_debt_day, squats, pushups, updated_at) = conn.query_row(
        "SELECT banked_minutes, debt_minutes, last_debt_day, total_squats, total_pushups, updated_at
         FROM user_stats
         WHERE id = 1",
        [],
        |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    )?;

    Ok(UserStats {
        banked_minutes: banked,
        debt_minutes: debt,
        last_debt_day: parse_optional_day(last_debt_day, "last_debt_day")?,
        total_squats: to_u64(squats, "total_squats")?,
        total_pushups: to_u64(pushups, "total_pushups")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn write_balance(conn: &Connection, banked_minutes: f64) -> Result<()> {
    conn.execute(
        "UPDATE user_stats SET banked_minutes = ?1, updated_at = ?2 WHERE id = 1",
        params![banked_minutes, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl Database {
    pub async fn get_user_stats(&self) -> Result<UserStats> {
        self.execute(|conn| read_stats(conn)).await
    }

    /// Adds `minutes` to the balance and returns the new balance.
    pub async fn credit_minutes(&self, minutes: f64) -> Result<f64> {
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stats = read_stats(&tx)?;
            let balance = stats.banked_minutes + minutes;
            write_balance(&tx, balance)?;
            tx.commit()?;
            Ok(balance)
        })
        .await
    }

    /// Deducts `minutes` only when the whole amount is available.
    pub async fn spend_minutes(&self, minutes: f64) -> Result<SpendOutcome> {
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stats = read_stats(&tx)?;
            if stats.banked_minutes < minutes {
                return Ok(SpendOutcome::InsufficientFunds {
                    balance: stats.banked_minutes,
                    requested: minutes,
                });
            }
            let remaining = stats.banked_minutes - minutes;
            write_balance(&tx, remaining)?;
            tx.commit()?;
            Ok(SpendOutcome::Spent { remaining })
        })
        .await
    }

    pub async fn take_debt(&self, today: NaiveDate, minutes: f64) -> Result<DebtOutcome> {
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stats = read_stats(&tx)?;
            if let Some(last) = stats.last_debt_day {
                if last >= today {
                    return Ok(DebtOutcome::AlreadyTakenToday { last });
                }
            }
            let balance = stats.banked_minutes + minutes;
            tx.execute(
                "UPDATE user_stats
                 SET banked_minutes = ?1,
                     debt_minutes = ?2,
                     last_debt_day = ?3,
                     updated_at = ?4
                 WHERE id = 1",
                params![
                    balance,
                    stats.debt_minutes + minutes,
                    today.format("%Y-%m-%d").to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            tx.commit()?;
            Ok(DebtOutcome::Granted { balance })
        })
        .await
    }

    /// Adds a finished session's reps to the lifetime totals and its earned
    /// minutes to the balance, both or neither.
    pub async fn record_session(&self, kind: ExerciseKind, reps: u32, earned: f64) -> Result<f64> {
        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stats = read_stats(&tx)?;
            let column = match kind {
                ExerciseKind::Squat => "total_squats",
                ExerciseKind::Pushup => "total_pushups",
            };
            let balance = stats.banked_minutes + earned;
            tx.execute(
                &format!(
                    "UPDATE user_stats
                     SET {column} = {column} + ?1,
                         banked_minutes = ?2,
                         updated_at = ?3
                     WHERE id = 1"
                ),
                params![to_i64(u64::from(reps))?, balance, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            Ok(balance)
        })
        .await
    }
}

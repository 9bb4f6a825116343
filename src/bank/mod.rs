//! Banked minutes: earned by exercising, spent on exemptions without reps.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use serde::Serialize;

use crate::db::{Database, UserStats};
use crate::exercise::ExerciseKind;
use crate::ledger::{LedgerSnapshot, SessionLedger, Target};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SpendOutcome {
    Spent { remaining: f64 },
    /// Balance left untouched; nothing is clamped.
    InsufficientFunds { balance: f64, requested: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum DebtOutcome {
    Granted { balance: f64 },
    AlreadyTakenToday { last: NaiveDate },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub outcome: SpendOutcome,
    pub ledger: Option<LedgerSnapshot>,
}

/// Minutes earned for `reps` at an exchange rate of `reps_per_exchange`
/// reps for `minutes_per_exchange` minutes.
pub fn minutes_for_reps(reps: u32, reps_per_exchange: u32, minutes_per_exchange: f64) -> f64 {
    if reps_per_exchange == 0 {
        return 0.0;
    }
    f64::from(reps) / f64::from(reps_per_exchange) * minutes_per_exchange
}

/// Exemption length bought by `minutes`, rejected up front when it cannot
/// be represented from `now`.
fn redeemable_duration(minutes: f64, now: DateTime<Utc>) -> Result<Duration> {
    if !(minutes.is_finite() && minutes > 0.0) {
        bail!("cannot redeem {minutes} minutes");
    }
    let millis = (minutes * 60_000.0).round();
    let duration = (millis < i64::MAX as f64)
        .then(|| Duration::try_milliseconds(millis as i64))
        .flatten()
        .filter(|duration| now.checked_add_signed(*duration).is_some())
        .ok_or_else(|| anyhow!("{minutes} minutes is out of range"))?;
    Ok(duration)
}

#[derive(Clone)]
pub struct Bank {
    db: Database,
}

impl Bank {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> Result<UserStats> {
        self.db.get_user_stats().await
    }

    pub async fn balance(&self) -> Result<f64> {
        Ok(self.db.get_user_stats().await?.banked_minutes)
    }

    pub async fn credit(&self, minutes: f64) -> Result<f64> {
        if !(minutes.is_finite() && minutes >= 0.0) {
            bail!("cannot credit {minutes} minutes");
        }
        let balance = self.db.credit_minutes(minutes).await?;
        info!("Credited {minutes:.2} banked minutes (balance {balance:.2})");
        Ok(balance)
    }

    pub async fn spend(&self, minutes: f64) -> Result<SpendOutcome> {
        if !(minutes.is_finite() && minutes > 0.0) {
            bail!("cannot spend {minutes} minutes");
        }
        let outcome = self.db.spend_minutes(minutes).await?;
        match outcome {
            SpendOutcome::Spent { remaining } => {
                info!("Spent {minutes:.2} banked minutes (balance {remaining:.2})")
            }
            SpendOutcome::InsufficientFunds { balance, requested } => {
                info!("Rejected spend of {requested:.2} minutes, balance is {balance:.2}")
            }
        }
        Ok(outcome)
    }

    /// Whether the once-daily emergency grant is still available on `today`
    /// (a local calendar day).
    pub async fn can_take_debt(&self, today: NaiveDate) -> Result<bool> {
        let stats = self.db.get_user_stats().await?;
        Ok(stats.last_debt_day.map_or(true, |last| last < today))
    }

    pub async fn take_debt(&self, today: NaiveDate, minutes: f64) -> Result<DebtOutcome> {
        if !(minutes.is_finite() && minutes > 0.0) {
            bail!("cannot advance {minutes} minutes");
        }
        let outcome = self.db.take_debt(today, minutes).await?;
        if let DebtOutcome::Granted { balance } = outcome {
            info!("Emergency grant of {minutes:.0} minutes on {today} (balance {balance:.2})");
        }
        Ok(outcome)
    }

    pub async fn record_session(&self, kind: ExerciseKind, reps: u32, earned: f64) -> Result<()> {
        if !(earned.is_finite() && earned >= 0.0) {
            bail!("cannot credit {earned} minutes");
        }
        let balance = self.db.record_session(kind, reps, earned).await?;
        if earned > 0.0 {
            info!("Credited {earned:.2} banked minutes (balance {balance:.2})");
        }
        Ok(())
    }

    /// Spend `minutes` and exempt `target` (or every selected target) for
    /// that long. Nothing is granted when the balance is short.
    pub async fn redeem(
        &self,
        ledger: &SessionLedger,
        target: Option<Target>,
        minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        let duration = redeemable_duration(minutes, now)?;

        let outcome = self.spend(minutes).await?;
        if let SpendOutcome::InsufficientFunds { .. } = outcome {
            return Ok(Redemption {
                outcome,
                ledger: None,
            });
        }

        match ledger.grant_exemption(target, duration, now).await {
            Ok(snapshot) => Ok(Redemption {
                outcome,
                ledger: Some(snapshot),
            }),
            Err(err) => {
                // Give the minutes back; the user got nothing for them.
                self.credit(minutes).await?;
                Err(err.context("redeemed minutes refunded after failed grant"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::enforcement::{EnforcementApplier, MemoryShield};
    use crate::ledger::ProtectedSelection;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bank.sqlite3")).unwrap();
        (dir, db)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    #[test]
    fn exchange_rate_math() {
        assert_eq!(minutes_for_reps(10, 10, 5.0), 5.0);
        assert_eq!(minutes_for_reps(3, 10, 5.0), 1.5);
        assert_eq!(minutes_for_reps(3, 0, 5.0), 0.0);
    }

    #[tokio::test]
    async fn overspend_is_rejected_not_clamped() {
        let (_dir, db) = open();
        let bank = Bank::new(db);
        bank.credit(10.0).await.unwrap();

        let outcome = bank.spend(12.5).await.unwrap();
        assert_eq!(
            outcome,
            SpendOutcome::InsufficientFunds {
                balance: 10.0,
                requested: 12.5
            }
        );
        assert_eq!(bank.balance().await.unwrap(), 10.0);

        let outcome = bank.spend(10.0).await.unwrap();
        assert_eq!(outcome, SpendOutcome::Spent { remaining: 0.0 });
        assert_eq!(bank.balance().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_errors() {
        let (_dir, db) = open();
        let bank = Bank::new(db);
        assert!(bank.spend(0.0).await.is_err());
        assert!(bank.spend(-3.0).await.is_err());
        assert!(bank.credit(f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn debt_once_per_day() {
        let (_dir, db) = open();
        let bank = Bank::new(db);

        assert!(bank.can_take_debt(day(22)).await.unwrap());
        assert_eq!(
            bank.take_debt(day(22), 15.0).await.unwrap(),
            DebtOutcome::Granted { balance: 15.0 }
        );
        assert!(!bank.can_take_debt(day(22)).await.unwrap());
        assert_eq!(
            bank.take_debt(day(22), 15.0).await.unwrap(),
            DebtOutcome::AlreadyTakenToday { last: day(22) }
        );

        assert_eq!(
            bank.take_debt(day(23), 15.0).await.unwrap(),
            DebtOutcome::Granted { balance: 30.0 }
        );
        let stats = bank.stats().await.unwrap();
        assert_eq!(stats.debt_minutes, 30.0);
        assert_eq!(stats.last_debt_day, Some(day(23)));
    }

    #[tokio::test]
    async fn redeem_grants_only_when_funded() {
        let (_dir, db) = open();
        let shield = Arc::new(MemoryShield::new());
        let ledger = SessionLedger::new(db.clone(), EnforcementApplier::new(shield.clone()));
        let bank = Bank::new(db);
        let now = Utc.with_ymd_and_hms(2025, 11, 22, 9, 0, 0).unwrap();

        ledger
            .update_selection(
                ProtectedSelection::from_targets([Target::application("A")]),
                now,
            )
            .await
            .unwrap();

        let denied = bank
            .redeem(&ledger, Some(Target::application("A")), 5.0, now)
            .await
            .unwrap();
        assert!(matches!(denied.outcome, SpendOutcome::InsufficientFunds { .. }));
        assert!(denied.ledger.is_none());
        assert!(shield.current().unwrap().contains(&Target::application("A")));

        bank.credit(8.0).await.unwrap();
        let granted = bank
            .redeem(&ledger, Some(Target::application("A")), 5.0, now)
            .await
            .unwrap();
        assert_eq!(granted.outcome, SpendOutcome::Spent { remaining: 3.0 });
        assert!(shield.current().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_totals_accumulate() {
        let (_dir, db) = open();
        let bank = Bank::new(db);
        bank.record_session(ExerciseKind::Squat, 7, 3.5).await.unwrap();
        bank.record_session(ExerciseKind::Pushup, 4, 0.0).await.unwrap();

        let stats = bank.stats().await.unwrap();
        assert_eq!(stats.total_squats, 7);
        assert_eq!(stats.total_pushups, 4);
        assert_eq!(stats.banked_minutes, 3.5);
    }

    #[tokio::test]
    async fn out_of_range_redeem_spends_nothing() {
        let (_dir, db) = open();
        let bank = Bank::new(db.clone());
        let ledger = SessionLedger::new(
            db,
            EnforcementApplier::new(Arc::new(MemoryShield::new())),
        );
        bank.credit(1e18).await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 11, 22, 9, 0, 0).unwrap();

        for minutes in [1e17, 1e12] {
            assert!(bank
                .redeem(&ledger, Some(Target::application("A")), minutes, now)
                .await
                .is_err());
        }
        assert_eq!(bank.balance().await.unwrap(), 1e18);
    }
}

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::ledger::{Reconciliation, SessionLedger};

/// Name of the OS activity schedule covering the current unlock window.
pub const SESSION_ACTIVITY: &str = "sessionTimer";

/// Shortest interval the platform scheduler accepts. Shorter unlocks rely
/// on the foreground poll alone.
pub const MINIMUM_SCHEDULE_INTERVAL_MINUTES: i64 = 15;

/// Backdate so the platform treats the interval as already started.
const START_BACKDATE_SECS: i64 = 5;

/// OS interval scheduler (the background monitor's wake-up source).
pub trait ScheduleRegistrar: Send + Sync {
    fn start_monitoring(
        &self,
        activity: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;

    fn stop_monitoring(&self, activity: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ScheduleRegistration {
    Registered,
    Rejected { reason: String },
}

/// Replace any running session schedule with one ending at `end`.
/// Rejection is logged and reported, never propagated.
pub fn register_session_schedule(
    registrar: &dyn ScheduleRegistrar,
    now: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ScheduleRegistration {
    registrar.stop_monitoring(SESSION_ACTIVITY);

    let start = now - Duration::seconds(START_BACKDATE_SECS);
    match registrar.start_monitoring(SESSION_ACTIVITY, start, end) {
        Ok(()) => {
            info!("Monitoring {SESSION_ACTIVITY} until {end}");
            ScheduleRegistration::Registered
        }
        Err(err) => {
            warn!("Schedule registration rejected, relying on foreground poll: {err:#}");
            ScheduleRegistration::Rejected {
                reason: format!("{err:#}"),
            }
        }
    }
}

/// Entry points for short-lived background contexts woken by the OS.
/// Each call opens nothing and assumes nothing about the foreground app.
pub struct BackgroundTrigger {
    ledger: SessionLedger,
}

impl BackgroundTrigger {
    pub fn new(ledger: SessionLedger) -> Self {
        Self { ledger }
    }

    /// The foreground app already shaped the shield; starting the interval
    /// must not touch it.
    pub fn interval_did_start(&self, activity: &str) {
        info!("Interval started for {activity}");
    }

    pub async fn interval_did_end(
        &self,
        activity: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation> {
        info!("Interval ended for {activity}; reconciling");
        self.ledger.reconcile(now).await
    }

    pub async fn warning_threshold(
        &self,
        activity: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation> {
        info!("Warning threshold reached for {activity}; reconciling");
        self.ledger.reconcile(now).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::bail;
    use chrono::TimeZone;

    use super::*;
    use crate::db::Database;
    use crate::enforcement::{EnforcementApplier, MemoryShield};
    use crate::ledger::{ProtectedSelection, Target};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 22, 21, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct PlatformScheduler {
        active: Mutex<Option<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl ScheduleRegistrar for PlatformScheduler {
        fn start_monitoring(
            &self,
            _activity: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<()> {
            if end - start < Duration::minutes(MINIMUM_SCHEDULE_INTERVAL_MINUTES) {
                bail!("intervalTooShort");
            }
            *self.active.lock().unwrap() = Some((start, end));
            Ok(())
        }

        fn stop_monitoring(&self, _activity: &str) {
            *self.active.lock().unwrap() = None;
        }
    }

    #[test]
    fn short_interval_is_rejected_without_panicking() {
        let scheduler = PlatformScheduler::default();
        let outcome = register_session_schedule(&scheduler, now(), now() + Duration::minutes(1));
        assert!(matches!(outcome, ScheduleRegistration::Rejected { .. }));
        assert!(scheduler.active.lock().unwrap().is_none());
    }

    #[test]
    fn accepted_interval_is_backdated() {
        let scheduler = PlatformScheduler::default();
        let end = now() + Duration::minutes(30);
        let outcome = register_session_schedule(&scheduler, now(), end);

        assert_eq!(outcome, ScheduleRegistration::Registered);
        assert_eq!(
            *scheduler.active.lock().unwrap(),
            Some((now() - Duration::seconds(5), end))
        );
    }

    #[tokio::test]
    async fn interval_end_relocks_without_the_foreground_app() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.sqlite3");
        let app = Target::application("A");

        // Foreground context grants and goes away.
        {
            let db = Database::new(path.clone()).unwrap();
            let ledger =
                SessionLedger::new(db, EnforcementApplier::new(Arc::new(MemoryShield::new())));
            ledger
                .update_selection(ProtectedSelection::from_targets([app.clone()]), now())
                .await
                .unwrap();
            ledger
                .grant_exemption(Some(app.clone()), Duration::minutes(20), now())
                .await
                .unwrap();
        }

        // Background context wakes at the interval boundary.
        let shield = Arc::new(MemoryShield::new());
        let ledger = SessionLedger::new(
            Database::new(path).unwrap(),
            EnforcementApplier::new(shield.clone()),
        );
        let trigger = BackgroundTrigger::new(ledger);
        trigger.interval_did_start(SESSION_ACTIVITY);
        assert!(shield.current().is_none());

        let outcome = trigger
            .interval_did_end(SESSION_ACTIVITY, now() + Duration::minutes(20))
            .await
            .unwrap();
        assert_eq!(outcome.expired, vec![app.clone()]);
        assert!(shield.current().unwrap().contains(&app));
    }
}

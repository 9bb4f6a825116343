use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};

use crate::{
    bank::{minutes_for_reps, Bank},
    db::{Database, ExerciseRecord, ExerciseStatus},
    ledger::{SessionLedger, Target},
    log_error, log_info, log_warn,
    pose::JointSample,
    settings::SettingsStore,
};

use super::{ExerciseEvent, ExerciseKind, ExerciseSession, SessionSnapshot};

const ENABLE_LOGS: bool = true;

/// Owns at most one active [`ExerciseSession`] and wires its events into
/// the ledger (unlock on target) and the bank (minutes on finish).
#[derive(Clone)]
pub struct ExerciseController {
    session: Arc<Mutex<Option<ExerciseSession>>>,
    db: Database,
    ledger: SessionLedger,
    bank: Bank,
    settings: Arc<SettingsStore>,
    events: mpsc::UnboundedSender<ExerciseEvent>,
}

impl ExerciseController {
    pub fn new(
        db: Database,
        ledger: SessionLedger,
        bank: Bank,
        settings: Arc<SettingsStore>,
        events: mpsc::UnboundedSender<ExerciseEvent>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            db,
            ledger,
            bank,
            settings,
            events,
        }
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.lock().await.as_ref().map(ExerciseSession::snapshot)
    }

    /// `seed` fixes the bonus draw; `None` picks one at random.
    pub async fn start_session(
        &self,
        kind: ExerciseKind,
        unlock: Option<Target>,
        seed: Option<u64>,
    ) -> Result<SessionSnapshot> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Err(anyhow!("exercise session already active"));
        }

        let settings = self.settings.get();
        let target = settings.bonus().draw(seed.unwrap_or_else(rand::random));
        let started_at = Utc::now();
        let session = ExerciseSession::new(kind, target, unlock, &settings, started_at);

        let record = ExerciseRecord {
            id: session.id().to_string(),
            kind,
            status: ExerciseStatus::Running,
            reps: 0,
            target_reps: target.reps,
            bonus: target.bonus,
            minutes_earned: 0.0,
            started_at,
            stopped_at: None,
            created_at: started_at,
            updated_at: started_at,
        };
        self.db.insert_exercise_session(&record).await?;

        log_info!(
            "Started {} session {} (target {}{})",
            kind.as_str(),
            record.id,
            target.reps,
            if target.bonus { ", bonus" } else { "" }
        );

        let snapshot = session.snapshot();
        *guard = Some(session);
        Ok(snapshot)
    }

    /// Feed one frame to the active session. Returns `None` when no session
    /// is running.
    pub async fn process_frame(&self, sample: &JointSample) -> Result<Option<SessionSnapshot>> {
        let (events, snapshot) = {
            let mut guard = self.session.lock().await;
            let Some(session) = guard.as_mut() else {
                return Ok(None);
            };
            let events = session.process(sample);
            (events, session.snapshot())
        };

        for event in events {
            if let ExerciseEvent::TargetReached { unlock, count, .. } = &event {
                let duration = self.settings.get().unlock_duration();
                log_info!("Target of {count} reps reached, unlocking");
                if let Err(err) = self
                    .ledger
                    .grant_exemption(unlock.clone(), duration, Utc::now())
                    .await
                {
                    log_error!("Failed to grant exemption after target reached: {err:#}");
                }
            }
            if self.events.send(event).is_err() {
                log_warn!("Exercise event receiver dropped");
            }
        }

        Ok(Some(snapshot))
    }

    /// Close the session and credit minutes for every rep counted.
    pub async fn finish_session(&self) -> Result<ExerciseRecord> {
        self.close(ExerciseStatus::Completed).await
    }

    /// Close the session without crediting minutes. Reps still count
    /// toward lifetime totals.
    pub async fn cancel_session(&self) -> Result<ExerciseRecord> {
        self.close(ExerciseStatus::Cancelled).await
    }

    /// The session stays active until both writes land, so a failed close
    /// can simply be retried.
    async fn close(&self, status: ExerciseStatus) -> Result<ExerciseRecord> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("no active exercise session"))?;

        let settings = self.settings.get();
        let id = session.id().to_string();
        let kind = session.kind();
        let reps = session.reps();
        let earned = match status {
            ExerciseStatus::Completed => minutes_for_reps(
                reps,
                settings.exchange_rate(kind),
                settings.minutes_per_exchange,
            ),
            _ => 0.0,
        };

        self.db
            .finish_exercise_session(&id, status, reps, earned, Utc::now())
            .await?;
        self.bank.record_session(kind, reps, earned).await?;
        guard.take();
        drop(guard);

        log_info!(
            "{} session {id} closed as {} with {reps} reps ({earned:.2} minutes)",
            kind.as_str(),
            status.as_str()
        );

        self.db
            .get_exercise_session(&id)
            .await?
            .ok_or_else(|| anyhow!("exercise session {id} vanished"))
    }

    /// Mark sessions a previous process left `Running` as interrupted.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let stale = self.db.get_running_exercise_sessions().await?;
        let now = Utc::now();
        for record in &stale {
            log_info!(
                "Recovered incomplete exercise session {}; marking as Interrupted",
                record.id
            );
            self.db.mark_exercise_interrupted(&record.id, now).await?;
        }
        Ok(stale.len())
    }
}

//! Session ledger: the single authority for what is blocked right now.
//!
//! The ledger owns the exemption lifecycle. Every mutation goes through the
//! shared store in one locked transaction and is followed by a full
//! recomputation and commit of the effective block set; nothing is patched
//! incrementally.

mod policy;

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Serialize;

use crate::db::{Database, SharedState};
use crate::enforcement::EnforcementApplier;
use crate::monitor::{register_session_schedule, ScheduleRegistrar, SESSION_ACTIVITY};

pub use policy::{
    effective_block_set, BlockSet, Exemptions, ProtectedSelection, Target, TargetSet,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionView {
    pub target: Target,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub selection: ProtectedSelection,
    /// Exemptions still live at `at`.
    pub exemptions: Vec<ExemptionView>,
    pub blocked: BlockSet,
    pub at: DateTime<Utc>,
}

impl LedgerSnapshot {
    fn from_state(state: &SharedState, now: DateTime<Utc>) -> Self {
        Self {
            selection: state.selection.clone(),
            exemptions: state
                .exemptions
                .iter()
                .filter(|(_, expires_at)| **expires_at > now)
                .map(|(target, expires_at)| ExemptionView {
                    target: target.clone(),
                    expires_at: *expires_at,
                })
                .collect(),
            blocked: effective_block_set(&state.selection, &state.exemptions, now),
            at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub expired: Vec<Target>,
    pub snapshot: LedgerSnapshot,
}

/// Constructed once per process on top of that process's [`Database`]
/// handle. Holds no state of its own beyond the handles.
#[derive(Clone)]
pub struct SessionLedger {
    db: Database,
    applier: EnforcementApplier,
    scheduler: Option<Arc<dyn ScheduleRegistrar>>,
}

impl SessionLedger {
    pub fn new(db: Database, applier: EnforcementApplier) -> Self {
        Self {
            db,
            applier,
            scheduler: None,
        }
    }

    /// Register an OS interval schedule for every grant. Optional: expiry
    /// still happens through the foreground poll when registration fails.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn ScheduleRegistrar>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Exempt `target` until `now + duration`, overwriting any earlier expiry.
    /// `None` exempts every currently selected target.
    pub async fn grant_exemption(
        &self,
        target: Option<Target>,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot> {
        if duration <= Duration::zero() {
            bail!("exemption duration must be positive, got {duration}");
        }
        let expires_at = now
            .checked_add_signed(duration)
            .ok_or_else(|| anyhow!("exemption of {duration} from {now} is out of range"))?;

        let (snapshot, (granted, latest)) = self
            .apply(now, move |state| {
                let targets: Vec<Target> = match target {
                    Some(target) => vec![target],
                    None => state.selection.targets().collect(),
                };
                for target in &targets {
                    state.exemptions.grant(target.clone(), expires_at);
                }
                (targets, state.exemptions.latest_expiry(now))
            })
            .await?;

        if granted.is_empty() {
            info!("Global grant with an empty selection; nothing exempted");
        }
        for target in &granted {
            info!("Exempted {target} until {expires_at}");
        }

        if let (Some(scheduler), Some(end)) = (&self.scheduler, latest) {
            register_session_schedule(scheduler.as_ref(), now, end);
        }

        Ok(snapshot)
    }

    pub async fn cancel_exemption(
        &self,
        target: Target,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot> {
        let label = target.to_string();
        let (snapshot, removed) = self
            .apply(now, move |state| state.exemptions.cancel(&target))
            .await?;
        if removed {
            info!("Cancelled exemption for {label}");
        }
        Ok(snapshot)
    }

    /// End every exemption at once.
    pub async fn cancel_all(&self, now: DateTime<Utc>) -> Result<LedgerSnapshot> {
        let (snapshot, removed) = self.apply(now, |state| state.exemptions.clear()).await?;
        if removed {
            info!("Cancelled all exemptions");
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop_monitoring(SESSION_ACTIVITY);
        }
        Ok(snapshot)
    }

    /// Drop every exemption whose expiry is at or before `now`. Returns
    /// whether anything was removed. Always recommits the full set.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(!self.reconcile(now).await?.expired.is_empty())
    }

    /// The one expiry path shared by the foreground poll and OS callbacks.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<Reconciliation> {
        let (snapshot, expired) = self
            .apply(now, move |state| state.exemptions.expire_due(now))
            .await?;
        for target in &expired {
            info!("Exemption for {target} expired; re-locking");
        }
        Ok(Reconciliation { expired, snapshot })
    }

    /// Picker edits land here. The new selection is persisted and the
    /// shield recommitted.
    pub async fn update_selection(
        &self,
        selection: ProtectedSelection,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot> {
        info!(
            "Selection changed: {} apps, {} categories",
            selection.applications.len(),
            selection.categories.len()
        );
        let (snapshot, ()) = self
            .apply(now, move |state| state.selection = selection)
            .await?;
        Ok(snapshot)
    }

    /// Pure read; nothing is committed.
    pub async fn effective_block_set(&self, now: DateTime<Utc>) -> Result<BlockSet> {
        let state = self.db.load_shared_state().await?;
        Ok(effective_block_set(&state.selection, &state.exemptions, now))
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<LedgerSnapshot> {
        let state = self.db.load_shared_state().await?;
        Ok(LedgerSnapshot::from_state(&state, now))
    }

    /// Mutate the shared state and commit the resulting block set while the
    /// store's write lock is still held. A context holding stale state can
    /// never push its shield after a newer one.
    async fn apply<F, T>(&self, now: DateTime<Utc>, mutate: F) -> Result<(LedgerSnapshot, T)>
    where
        F: FnOnce(&mut SharedState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let applier = self.applier.clone();
        self.db
            .update_shared_state(mutate, move |state| {
                let snapshot = LedgerSnapshot::from_state(state, now);
                applier.commit(&snapshot.blocked)?;
                Ok(snapshot)
            })
            .await
    }
}

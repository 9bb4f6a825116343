pub mod bank;
pub mod db;
pub mod enforcement;
pub mod exercise;
pub mod ledger;
pub mod monitor;
pub mod pose;
pub mod settings;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::mpsc;

use bank::Bank;
use db::Database;
use enforcement::{EnforcementApplier, RestrictionSink};
use exercise::{ExerciseController, ExerciseEvent};
use ledger::SessionLedger;
use monitor::ScheduleRegistrar;
use settings::SettingsStore;

pub const DATABASE_FILE: &str = "physically.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Install the `env_logger` backend. Reads `RUST_LOG`; defaults to `info`.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Which kind of execution context is opening the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    /// The interactive app. Owns exercise sessions and finalizes the ones a
    /// crashed predecessor left running.
    Foreground,
    /// OS callbacks and CLI invocations. May run while the app is mid-session,
    /// so they never touch exercise records.
    Background,
}

/// Everything one process needs, built on top of its own [`Database`]
/// handle. The app and every background context each open one.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub ledger: SessionLedger,
    pub bank: Bank,
    pub exercise: ExerciseController,
}

impl AppContext {
    pub async fn open(
        data_dir: &Path,
        role: ContextRole,
        sink: Arc<dyn RestrictionSink>,
        scheduler: Option<Arc<dyn ScheduleRegistrar>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ExerciseEvent>)> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join(SETTINGS_FILE))?);

        let mut ledger = SessionLedger::new(db.clone(), EnforcementApplier::new(sink));
        if let Some(scheduler) = scheduler {
            ledger = ledger.with_scheduler(scheduler);
        }
        let bank = Bank::new(db.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let exercise =
            ExerciseController::new(db.clone(), ledger.clone(), bank.clone(), settings.clone(), tx);

        // Finalize exercise sessions that were running when the app last died.
        if role == ContextRole::Foreground {
            let recovered = exercise.recover_interrupted().await?;
            if recovered > 0 {
                warn!("Marked {recovered} exercise session(s) as Interrupted");
            }
        }

        // Exemptions may have lapsed while nothing was running.
        let startup = ledger.reconcile(Utc::now()).await?;
        info!(
            "Ledger ready: {} blocked, {} expired at startup",
            startup.snapshot.blocked.len(),
            startup.expired.len()
        );

        Ok((
            Self {
                db,
                settings,
                ledger,
                bank,
                exercise,
            },
            rx,
        ))
    }
}

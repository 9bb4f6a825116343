use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::exercise::{BonusConfig, ExerciseKind, PushupThresholds, SquatThresholds};
use crate::pose::DEFAULT_MIN_CONFIDENCE;

/// User-tunable knobs. Missing keys in the file fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub smoother_window: usize,
    pub min_confidence: f32,
    pub default_target_reps: u32,
    pub bonus_target_reps: u32,
    pub bonus_probability: f64,
    pub unlock_duration_secs: i64,
    pub poll_interval_ms: u64,
    /// Reps per exchange; each exchange earns `minutes_per_exchange`.
    pub exchange_rate_squats: u32,
    pub exchange_rate_pushups: u32,
    pub minutes_per_exchange: f64,
    pub debt_minutes: f64,
    pub squat: SquatThresholds,
    pub pushup: PushupThresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smoother_window: 6,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            default_target_reps: 5,
            bonus_target_reps: 10,
            bonus_probability: 0.05,
            unlock_duration_secs: 15 * 60,
            poll_interval_ms: 500,
            exchange_rate_squats: 10,
            exchange_rate_pushups: 10,
            minutes_per_exchange: 5.0,
            debt_minutes: 15.0,
            squat: SquatThresholds::default(),
            pushup: PushupThresholds::default(),
        }
    }
}

impl Settings {
    pub fn bonus(&self) -> BonusConfig {
        BonusConfig {
            probability: self.bonus_probability,
            default_target: self.default_target_reps,
            bonus_target: self.bonus_target_reps,
        }
    }

    pub fn exchange_rate(&self, kind: ExerciseKind) -> u32 {
        match kind {
            ExerciseKind::Squat => self.exchange_rate_squats,
            ExerciseKind::Pushup => self.exchange_rate_pushups,
        }
    }

    pub fn unlock_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.unlock_duration_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> Settings {
        self.read().clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: Settings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "defaultTargetReps": 8, "debtMinutes": 20.0 }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.default_target_reps, 8);
        assert_eq!(settings.debt_minutes, 20.0);
        assert_eq!(settings.smoother_window, 6);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(Settings {
                exchange_rate_pushups: 4,
                ..Settings::default()
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.get().exchange_rate(ExerciseKind::Pushup), 4);
        reopened.reload().unwrap();
        assert_eq!(reopened.get().exchange_rate(ExerciseKind::Squat), 10);
    }

    #[test]
    fn garbage_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().get(), Settings::default());
    }
}

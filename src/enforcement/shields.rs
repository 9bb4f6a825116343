use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use anyhow::{Context, Result};
use uuid::Uuid;

use super::RestrictionSink;
use crate::ledger::BlockSet;

/// In-process shield. Holds the last committed set.
#[derive(Default)]
pub struct MemoryShield {
    current: Mutex<Option<BlockSet>>,
    writes: AtomicU64,
}

impl MemoryShield {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first commit.
    pub fn current(&self) -> Option<BlockSet> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RestrictionSink for MemoryShield {
    fn shield(&self, blocked: &BlockSet) -> Result<()> {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(blocked.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shield materialized as a JSON file that an OS-side agent watches.
/// Each write goes to its own temp file beside the target and is renamed
/// over it, so readers never see a partial set and concurrent writers never
/// share a temp path.
pub struct JsonFileShield {
    path: PathBuf,
}

impl JsonFileShield {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<Option<BlockSet>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read shield from {}", self.path.display()))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

impl RestrictionSink for JsonFileShield {
    fn shield(&self, blocked: &BlockSet) -> Result<()> {
        let serialized = serde_json::to_string_pretty(blocked)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, serialized)
            .with_context(|| format!("Failed to write shield to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .or_else(|err| {
                let _ = fs::remove_file(&tmp);
                Err(err)
            })
            .with_context(|| format!("Failed to move shield into {}", self.path.display()))
    }
}

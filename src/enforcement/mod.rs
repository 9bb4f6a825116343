//! Pushes effective block sets to the platform restriction primitive.

mod shields;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

use crate::ledger::BlockSet;

pub use shields::{JsonFileShield, MemoryShield};

/// The platform's shield. `shield` replaces the entire restricted set; an
/// implementation must never merge with what it enforced before.
pub trait RestrictionSink: Send + Sync {
    fn shield(&self, blocked: &BlockSet) -> Result<()>;
}

/// Commits whole block sets to a [`RestrictionSink`].
///
/// Every commit sends the complete set. Old and new sets are never diffed,
/// so applying the same set twice leaves the shield exactly as the first
/// call left it.
#[derive(Clone)]
pub struct EnforcementApplier {
    sink: Arc<dyn RestrictionSink>,
}

impl EnforcementApplier {
    pub fn new(sink: Arc<dyn RestrictionSink>) -> Self {
        Self { sink }
    }

    /// The ledger calls this with the shared store's write lock held, so
    /// commits from separate processes land in the order of their writes.
    pub fn commit(&self, blocked: &BlockSet) -> Result<()> {
        debug!(
            "Committing shield: {} apps, {} categories",
            blocked.applications.len(),
            blocked.categories.len()
        );
        self.sink
            .shield(blocked)
            .context("failed to apply restriction shield")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Target;

    #[test]
    fn repeated_commit_is_idempotent() {
        let shield = Arc::new(MemoryShield::new());
        let applier = EnforcementApplier::new(shield.clone());
        let blocked = BlockSet::from_targets([Target::application("A"), Target::category("games")]);

        applier.commit(&blocked).unwrap();
        let after_first = shield.current();
        applier.commit(&blocked).unwrap();

        assert_eq!(shield.writes(), 2);
        assert_eq!(shield.current(), after_first);
        assert_eq!(shield.current(), Some(blocked));
    }

    #[test]
    fn commit_replaces_rather_than_merges() {
        let shield = Arc::new(MemoryShield::new());
        let applier = EnforcementApplier::new(shield.clone());

        applier
            .commit(&BlockSet::from_targets([Target::application("A")]))
            .unwrap();
        applier
            .commit(&BlockSet::from_targets([Target::application("B")]))
            .unwrap();

        assert_eq!(
            shield.current(),
            Some(BlockSet::from_targets([Target::application("B")]))
        );
    }
}

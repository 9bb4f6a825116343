use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An application or category identifier subject to blocking. Identifiers
/// are opaque tokens handed out by the platform picker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Target {
    Application(String),
    Category(String),
}

impl Target {
    pub fn application(id: impl Into<String>) -> Self {
        Target::Application(id.into())
    }

    pub fn category(id: impl Into<String>) -> Self {
        Target::Category(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Target::Application(id) | Target::Category(id) => id,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Application(id) => write!(f, "app:{id}"),
            Target::Category(id) => write!(f, "category:{id}"),
        }
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    /// Inverse of `Display`: `app:<id>` or `category:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected app:<id> or category:<id>, got {s:?}"))?;
        if id.is_empty() {
            return Err(format!("empty identifier in {s:?}"));
        }
        match kind {
            "app" => Ok(Target::application(id)),
            "category" => Ok(Target::category(id)),
            other => Err(format!("unknown target kind {other:?}")),
        }
    }
}

/// Applications and categories, kept sorted so that two equal sets always
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSet {
    pub applications: BTreeSet<String>,
    pub categories: BTreeSet<String>,
}

/// What the user chose to restrict. Sole source of truth for "what should be
/// blocked absent an active exemption".
pub type ProtectedSelection = TargetSet;

/// Targets currently enforced: the selection minus live exemptions.
pub type BlockSet = TargetSet;

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_targets<I: IntoIterator<Item = Target>>(targets: I) -> Self {
        let mut set = Self::new();
        for target in targets {
            set.insert(target);
        }
        set
    }

    pub fn insert(&mut self, target: Target) -> bool {
        match target {
            Target::Application(id) => self.applications.insert(id),
            Target::Category(id) => self.categories.insert(id),
        }
    }

    pub fn remove(&mut self, target: &Target) -> bool {
        match target {
            Target::Application(id) => self.applications.remove(id),
            Target::Category(id) => self.categories.remove(id),
        }
    }

    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Application(id) => self.applications.contains(id),
            Target::Category(id) => self.categories.contains(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.applications.len() + self.categories.len()
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.applications
            .iter()
            .cloned()
            .map(Target::Application)
            .chain(self.categories.iter().cloned().map(Target::Category))
    }
}

/// Live exemptions keyed by target. At most one entry per target; a new
/// grant overwrites the previous expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exemptions {
    entries: BTreeMap<Target, DateTime<Utc>>,
}

impl Exemptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, target: Target, expires_at: DateTime<Utc>) {
        self.entries.insert(target, expires_at);
    }

    pub fn cancel(&mut self, target: &Target) -> bool {
        self.entries.remove(target).is_some()
    }

    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    /// Drop every entry whose expiry is at or before `now`.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<Target> {
        let due: Vec<Target> = self
            .entries
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now)
            .map(|(target, _)| target.clone())
            .collect();
        for target in &due {
            self.entries.remove(target);
        }
        due
    }

    pub fn expiry(&self, target: &Target) -> Option<DateTime<Utc>> {
        self.entries.get(target).copied()
    }

    pub fn is_active(&self, target: &Target, now: DateTime<Utc>) -> bool {
        self.expiry(target).is_some_and(|expires_at| expires_at > now)
    }

    /// Latest expiry among entries still live at `now`.
    pub fn latest_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries.values().copied().filter(|at| *at > now).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &DateTime<Utc>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Target, DateTime<Utc>)> for Exemptions {
    fn from_iter<I: IntoIterator<Item = (Target, DateTime<Utc>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Recomputed from scratch on every call. Entries past their expiry are
/// ignored even if nobody has purged them yet.
pub fn effective_block_set(
    selection: &ProtectedSelection,
    exemptions: &Exemptions,
    now: DateTime<Utc>,
) -> BlockSet {
    TargetSet::from_targets(
        selection
            .targets()
            .filter(|target| !exemptions.is_active(target, now)),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 22, 9, 0, 0).unwrap()
    }

    #[test]
    fn target_parses_from_display_form() {
        for target in [Target::application("com.example.feed"), Target::category("games")] {
            assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
        }
        assert!("feed".parse::<Target>().is_err());
        assert!("app:".parse::<Target>().is_err());
        assert!("widget:x".parse::<Target>().is_err());
    }

    fn selection() -> ProtectedSelection {
        TargetSet::from_targets([
            Target::application("A"),
            Target::application("B"),
            Target::category("social"),
        ])
    }

    #[test]
    fn no_exemptions_blocks_everything() {
        let blocked = effective_block_set(&selection(), &Exemptions::new(), now());
        assert_eq!(blocked, selection());
    }

    #[test]
    fn exempting_one_target_keeps_the_rest() {
        let mut exemptions = Exemptions::new();
        exemptions.grant(Target::application("A"), now() + Duration::seconds(60));

        let blocked = effective_block_set(&selection(), &exemptions, now());
        assert!(!blocked.contains(&Target::application("A")));
        assert!(blocked.contains(&Target::application("B")));
        assert!(blocked.contains(&Target::category("social")));
    }

    #[test]
    fn stale_entry_is_ignored_before_purge() {
        let mut exemptions = Exemptions::new();
        exemptions.grant(Target::application("A"), now() + Duration::seconds(60));

        let later = now() + Duration::seconds(61);
        assert_eq!(effective_block_set(&selection(), &exemptions, later), selection());
    }

    #[test]
    fn regrant_overwrites_instead_of_stacking() {
        let mut exemptions = Exemptions::new();
        let target = Target::application("A");
        exemptions.grant(target.clone(), now() + Duration::minutes(15));
        exemptions.grant(target.clone(), now() + Duration::minutes(5));

        assert_eq!(exemptions.len(), 1);
        assert_eq!(exemptions.expiry(&target), Some(now() + Duration::minutes(5)));
    }

    #[test]
    fn expire_due_is_inclusive() {
        let mut exemptions = Exemptions::new();
        exemptions.grant(Target::application("A"), now());
        exemptions.grant(Target::application("B"), now() + Duration::seconds(1));

        let expired = exemptions.expire_due(now());
        assert_eq!(expired, vec![Target::application("A")]);
        assert_eq!(exemptions.len(), 1);
        assert!(exemptions.expire_due(now()).is_empty());
    }

    #[test]
    fn target_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Target::category("games")).unwrap();
        assert_eq!(json, r#"{"kind":"category","id":"games"}"#);
    }
}

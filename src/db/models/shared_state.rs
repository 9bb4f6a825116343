//! Wire format of the state every execution context shares.
//!
//! Each key holds a JSON envelope tagged with `version`. Readers reject
//! versions they do not know; callers degrade that to empty state.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Exemptions, ProtectedSelection, Target};

pub const SELECTION_KEY: &str = "SavedAppSelection";
pub const EXEMPTIONS_KEY: &str = "ActiveExemptions";

const SELECTION_VERSION: u32 = 1;
const EXEMPTIONS_VERSION: u32 = 1;

/// Durable policy plus live exemptions, as loaded from the shared store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedState {
    pub selection: ProtectedSelection,
    pub exemptions: Exemptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct SelectionEnvelope {
    version: u32,
    applications: Vec<String>,
    categories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExemptionEntry {
    target: Target,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExemptionsEnvelope {
    version: u32,
    entries: Vec<ExemptionEntry>,
}

pub fn encode_selection(selection: &ProtectedSelection) -> Result<String> {
    let envelope = SelectionEnvelope {
        version: SELECTION_VERSION,
        applications: selection.applications.iter().cloned().collect(),
        categories: selection.categories.iter().cloned().collect(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode_selection(raw: &str) -> Result<ProtectedSelection> {
    let envelope: SelectionEnvelope = serde_json::from_str(raw)?;
    if envelope.version != SELECTION_VERSION {
        bail!("unsupported selection version {}", envelope.version);
    }
    Ok(ProtectedSelection {
        applications: envelope.applications.into_iter().collect(),
        categories: envelope.categories.into_iter().collect(),
    })
}

pub fn encode_exemptions(exemptions: &Exemptions) -> Result<String> {
    let envelope = ExemptionsEnvelope {
        version: EXEMPTIONS_VERSION,
        entries: exemptions
            .iter()
            .map(|(target, expires_at)| ExemptionEntry {
                target: target.clone(),
                expires_at: *expires_at,
            })
            .collect(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode_exemptions(raw: &str) -> Result<Exemptions> {
    let envelope: ExemptionsEnvelope = serde_json::from_str(raw)?;
    if envelope.version != EXEMPTIONS_VERSION {
        bail!("unsupported exemptions version {}", envelope.version);
    }
    Ok(envelope
        .entries
        .into_iter()
        .map(|entry| (entry.target, entry.expires_at))
        .collect())
}

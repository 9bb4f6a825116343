use anyhow::{Context, Result};
use chrono::Utc;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::{
    connection::Database,
    models::shared_state::{
        decode_exemptions, decode_selection, encode_exemptions, encode_selection, SharedState,
        EXEMPTIONS_KEY, SELECTION_KEY,
    },
};
use crate::ledger::{Exemptions, ProtectedSelection};

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM shared_state WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("failed to read shared key {key}"))
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO shared_state (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("failed to write shared key {key}"))?;
    Ok(())
}

/// Undecodable values degrade to empty state so enforcement keeps running.
fn load_state(conn: &Connection) -> Result<SharedState> {
    let selection = match read_value(conn, SELECTION_KEY)? {
        Some(raw) => decode_selection(&raw).unwrap_or_else(|err| {
            warn!("Stored selection is unreadable, treating as empty: {err:#}");
            ProtectedSelection::default()
        }),
        None => ProtectedSelection::default(),
    };

    let exemptions = match read_value(conn, EXEMPTIONS_KEY)? {
        Some(raw) => decode_exemptions(&raw).unwrap_or_else(|err| {
            warn!("Stored exemptions are unreadable, treating as none: {err:#}");
            Exemptions::default()
        }),
        None => Exemptions::default(),
    };

    Ok(SharedState {
        selection,
        exemptions,
    })
}

impl Database {
    pub async fn load_shared_state(&self) -> Result<SharedState> {
        self.execute(|conn| load_state(conn)).await
    }

    /// Read-modify-write of the shared state under SQLite's write lock, so
    /// concurrent processes serialize on the file rather than overwrite each
    /// other.
    ///
    /// `publish` sees the mutated state before the lock is released. Side
    /// effects it performs (the platform shield) are therefore ordered across
    /// processes exactly like the writes. A `publish` error rolls the
    /// mutation back.
    pub async fn update_shared_state<F, P, T, R>(&self, mutate: F, publish: P) -> Result<(R, T)>
    where
        F: FnOnce(&mut SharedState) -> T + Send + 'static,
        P: FnOnce(&SharedState) -> Result<R> + Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("failed to lock shared state")?;

            let mut state = load_state(&tx)?;
            let original = state.clone();
            let output = mutate(&mut state);

            if state.selection != original.selection {
                write_value(&tx, SELECTION_KEY, &encode_selection(&state.selection)?)?;
            }
            if state.exemptions != original.exemptions {
                write_value(&tx, EXEMPTIONS_KEY, &encode_exemptions(&state.exemptions)?)?;
            }

            let published = publish(&state)?;
            tx.commit().context("failed to commit shared state")?;
            Ok((published, output))
        })
        .await
    }

    /// Overwrite a raw shared value. Used to simulate foreign writers.
    #[cfg(test)]
    pub async fn put_raw_shared_value(&self, key: &'static str, value: String) -> Result<()> {
        self.execute(move |conn| write_value(conn, key, &value)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::ledger::Target;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("shared.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn empty_store_loads_empty_state() {
        let (_dir, db) = open();
        assert_eq!(db.load_shared_state().await.unwrap(), SharedState::default());
    }

    #[tokio::test]
    async fn selection_round_trips_through_the_file() {
        let (dir, db) = open();
        let selection = ProtectedSelection::from_targets([
            Target::application("tok-a"),
            Target::category("games"),
        ]);
        let stored = selection.clone();
        db.update_shared_state(move |state| state.selection = stored, |_| Ok(()))
            .await
            .unwrap();

        let other = Database::new(dir.path().join("shared.sqlite3")).unwrap();
        assert_eq!(other.load_shared_state().await.unwrap().selection, selection);
    }

    #[tokio::test]
    async fn corrupt_selection_degrades_to_empty() {
        let (_dir, db) = open();
        db.put_raw_shared_value(SELECTION_KEY, "not json".into())
            .await
            .unwrap();

        let state = db.load_shared_state().await.unwrap();
        assert!(state.selection.is_empty());
    }

    #[tokio::test]
    async fn update_persists_mutation() {
        let (_dir, db) = open();
        let expires_at = Utc::now() + Duration::minutes(5);

        let (published, granted) = db
            .update_shared_state(
                move |state| {
                    state.exemptions.grant(Target::application("tok-a"), expires_at);
                    true
                },
                |state| Ok(state.exemptions.len()),
            )
            .await
            .unwrap();

        assert!(granted);
        assert_eq!(published, 1);
        let reloaded = db.load_shared_state().await.unwrap();
        assert_eq!(
            reloaded.exemptions.expiry(&Target::application("tok-a")),
            Some(expires_at)
        );
    }

    #[tokio::test]
    async fn failed_publish_rolls_back() {
        let (_dir, db) = open();
        let expires_at = Utc::now() + Duration::minutes(5);

        let result = db
            .update_shared_state(
                move |state| state.exemptions.grant(Target::application("tok-a"), expires_at),
                |_| -> Result<()> { anyhow::bail!("shield unavailable") },
            )
            .await;

        assert!(result.is_err());
        assert!(db.load_shared_state().await.unwrap().exemptions.is_empty());
    }
}

// SQLite-backed token storage
// A durable key-value table that survives process restarts

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::TokenStorage;
use crate::error::AuthError;

/// Durable token storage backed by a SQLite key-value table
#[derive(Debug)]
pub struct SqliteTokenStorage {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteTokenStorage {
    /// Open the database at `path`, creating the token table if needed.
    ///
    /// Failures here are construction-time configuration errors.
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();

        let conn = Connection::open(&path).map_err(|e| {
            AuthError::Configuration(format!(
                "failed to open token database {}: {e}",
                path.display()
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .map_err(|e| {
            AuthError::Configuration(format!("failed to initialize token database: {e}"))
        })?;

        tracing::debug!("Opened token database: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStorage for SqliteTokenStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT value FROM auth_kv WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("Failed to read token {key} from SQLite"))
    }

    fn set(&self, token: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, token],
        )
        .with_context(|| format!("Failed to store token {key} in SQLite"))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_kv WHERE key = ?", [key])
            .with_context(|| format!("Failed to delete token {key} from SQLite"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteTokenStorage) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTokenStorage::open(dir.path().join("tokens.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (_dir, store) = temp_store();

        store.set("abc123", "session").unwrap();
        assert_eq!(store.get("session").await.unwrap().as_deref(), Some("abc123"));

        store.delete("session").unwrap();
        assert_eq!(store.get("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");

        {
            let store = SqliteTokenStorage::open(&path).unwrap();
            store.set("persisted", "session").unwrap();
        }

        let store = SqliteTokenStorage::open(&path).unwrap();
        assert_eq!(
            store.get("session").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (_dir, store) = temp_store();

        store.set("old", "k").unwrap();
        store.set("new", "k").unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_open_rejects_bad_path() {
        let err = SqliteTokenStorage::open("/nonexistent-dir/tokens.db").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }
}

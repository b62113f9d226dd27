use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

use shared::{
    domain::{SessionId, ValuesMap},
    protocol::FlashKey,
};

mod session;

pub use session::{SessionFlash, SessionValues};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Values saved by one step of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStep {
    pub step_path: String,
    pub values: ValuesMap,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own empty database.
        let max_connections = if sqlite_path(database_url).is_none() { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flash_messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                flash_key   TEXT NOT NULL,
                payload     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure flash_messages table exists")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS flash_messages_session_key
             ON flash_messages (session_id, flash_key)",
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure flash_messages index exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS step_values (
                session_id   TEXT NOT NULL,
                step_path    TEXT NOT NULL,
                values_json  TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (session_id, step_path)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure step_values table exists")?;

        Ok(())
    }

    pub async fn push_flash(
        &self,
        session_id: &SessionId,
        key: FlashKey,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO flash_messages (session_id, flash_key, payload, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&session_id.0)
        .bind(key.as_str())
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store '{key}' flash for session {session_id}"))?;
        Ok(())
    }

    /// Removes and returns every entry under `key`, oldest first. Entries
    /// older than `max_age` are removed but not returned.
    pub async fn take_flash(
        &self,
        session_id: &SessionId,
        key: FlashKey,
        max_age: Option<Duration>,
    ) -> Result<Vec<serde_json::Value>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT payload, created_at FROM flash_messages
             WHERE session_id = ? AND flash_key = ?
             ORDER BY id ASC",
        )
        .bind(&session_id.0)
        .bind(key.as_str())
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM flash_messages WHERE session_id = ? AND flash_key = ?")
            .bind(&session_id.0)
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let cutoff = max_age.map(|age| Utc::now() - age);
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            if cutoff.is_some_and(|cutoff| created_at < cutoff) {
                debug!(session = %session_id, %key, "dropping expired flash entry");
                continue;
            }
            let payload: String = row.try_get("payload")?;
            match serde_json::from_str(&payload) {
                Ok(value) => entries.push(value),
                Err(err) => warn!(session = %session_id, %key, error = %err, "discarding unreadable flash entry"),
            }
        }
        Ok(entries)
    }

    pub async fn purge_expired_flash(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM flash_messages WHERE created_at < ?")
            .bind(older_than)
            .execute(&self.pool)
            .await
            .context("failed to purge expired flash entries")?;
        Ok(result.rows_affected())
    }

    pub async fn save_step_values(
        &self,
        session_id: &SessionId,
        step_path: &str,
        values: &ValuesMap,
    ) -> Result<()> {
        let values_json = serde_json::to_string(values).context("failed to encode step values")?;
        sqlx::query(
            "INSERT INTO step_values (session_id, step_path, values_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id, step_path) DO UPDATE SET
                values_json = excluded.values_json,
                updated_at = excluded.updated_at",
        )
        .bind(&session_id.0)
        .bind(step_path)
        .bind(values_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save values for step '{step_path}'"))?;
        Ok(())
    }

    pub async fn load_step_values(
        &self,
        session_id: &SessionId,
        step_path: &str,
    ) -> Result<Option<ValuesMap>> {
        let row = sqlx::query(
            "SELECT values_json FROM step_values WHERE session_id = ? AND step_path = ?",
        )
        .bind(&session_id.0)
        .bind(step_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let raw: String = r.get(0);
            serde_json::from_str(&raw)
                .with_context(|| format!("stored values for step '{step_path}' are not valid JSON"))
        })
        .transpose()
    }

    /// Every step saved by a session, in the order they were last saved.
    pub async fn load_session_values(&self, session_id: &SessionId) -> Result<Vec<StoredStep>> {
        let rows = sqlx::query(
            "SELECT step_path, values_json, updated_at FROM step_values
             WHERE session_id = ?
             ORDER BY updated_at ASC, step_path ASC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let step_path: String = r.get(0);
                let raw: String = r.get(1);
                let values = serde_json::from_str(&raw).with_context(|| {
                    format!("stored values for step '{step_path}' are not valid JSON")
                })?;
                Ok(StoredStep {
                    step_path,
                    values,
                    updated_at: r.get::<DateTime<Utc>, _>(2),
                })
            })
            .collect()
    }

    /// Drops all flash entries and saved values for a session. Returns the
    /// number of rows removed.
    pub async fn clear_session(&self, session_id: &SessionId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let flash = sqlx::query("DELETE FROM flash_messages WHERE session_id = ?")
            .bind(&session_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let values = sqlx::query("DELETE FROM step_values WHERE session_id = ?")
            .bind(&session_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(flash + values)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

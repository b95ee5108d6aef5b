use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteExecutor,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{CalendarKind, CalendarList, Entry};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database, so an
        // in-memory store is pinned to one connection that never recycles.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
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

    /// Loads the persisted list in priority order.
    pub async fn load_calendars(&self) -> Result<CalendarList> {
        select_calendars(&self.pool).await
    }

    /// Replaces the whole persisted list in one transaction and returns the
    /// list as that transaction reads it back before committing.
    pub async fn replace_calendars(&self, calendars: &CalendarList) -> Result<CalendarList> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM calendars")
            .execute(&mut *tx)
            .await
            .context("failed to clear calendars")?;

        for (position, entry) in calendars.rows() {
            let extra = serde_json::to_string(&entry.extra)?;
            sqlx::query(
                "INSERT INTO calendars (position, name, kind, url, extra) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.name)
            .bind(entry.kind.as_str())
            .bind(entry.url.as_deref())
            .bind(extra)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert calendar at position {position}"))?;
        }

        sqlx::query(
            "INSERT INTO calendar_list_meta (id, updated_at) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let stored = select_calendars(&mut *tx).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Time of the last successful replace, if the list was ever written.
    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT updated_at FROM calendar_list_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<DateTime<Utc>, _>(0)))
    }
}

async fn select_calendars<'e, E>(executor: E) -> Result<CalendarList>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT name, kind, url, extra FROM calendars ORDER BY position ASC")
        .fetch_all(executor)
        .await
        .context("failed to load calendars")?;

    rows.into_iter()
        .map(|r| -> Result<Entry> {
            let extra: Map<String, Value> = serde_json::from_str(&r.get::<String, _>(3))
                .context("stored calendar extra fields are not a JSON object")?;
            Ok(Entry {
                name: r.get::<String, _>(0),
                kind: CalendarKind::from(r.get::<String, _>(1)),
                url: r.get::<Option<String>, _>(2),
                extra,
            })
        })
        .collect()
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
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
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
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

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    models::StateDocument,
    store::{DocumentStore, SetError, StoreError, Version, Versioned},
};

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open the SQLite pool (creating the file if needed) and apply the embedded
/// migrations.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            database_url
                .parse::<SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
        )
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

// ── Store ──────────────────────────────────────────────────────────────────

/// State document kept as a JSON blob in the `documents` table. The row's
/// `version` column is the OCC token; every accepted write bumps it by one.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    key: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    async fn read(&self) -> Result<Option<Versioned>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT body, version FROM documents WHERE key = ?1")
                .bind(&self.key)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(body, version)| -> Result<Versioned, StoreError> {
            Ok(Versioned {
                document: serde_json::from_str(&body)?,
                version: Version::new(version),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self) -> Result<Option<Versioned>, StoreError> {
        self.read().await
    }

    async fn set(
        &self,
        document: &StateDocument,
        expected: Option<Version>,
    ) -> Result<Version, SetError> {
        let body = serde_json::to_string(document).map_err(StoreError::from)?;

        let affected = match expected {
            Some(version) => sqlx::query(
                "UPDATE documents SET body = ?1, version = version + 1
                 WHERE key = ?2 AND version = ?3",
            )
            .bind(&body)
            .bind(&self.key)
            .bind(version.get())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?
            .rows_affected(),
            None => sqlx::query(
                "INSERT INTO documents (key, body, version) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO NOTHING",
            )
            .bind(&self.key)
            .bind(&body)
            .bind(Version::INITIAL.get())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?
            .rows_affected(),
        };

        if affected == 1 {
            return Ok(expected.map_or(Version::INITIAL, Version::next));
        }

        // Lost the race: report whatever won.
        match self.read().await? {
            Some(current) => Err(SetError::Conflict(current)),
            None => Err(StoreError::Missing.into()),
        }
    }
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // Every connection to `sqlite::memory:` is its own database, so pin the
    // pool to a single connection that never gets recycled.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}

//! Key-value persistence
//!
//! Values are JSON documents. A missing key and a value that no longer parses
//! as JSON both load as `None`; callers run every loaded value through the
//! sanitize boundary before use.

pub mod keys;

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, key: &str) -> Option<Value> {
        let raw = self.entries.read().get(key).cloned()?;
        parse_stored(key, &raw)
    }

    pub fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.entries.write().insert(key.to_string(), raw);
        Ok(())
    }

    /// All entries land under one write lock, or none if any fails to serialize.
    pub fn save_batch(&self, entries: &[(String, Value)]) -> Result<(), StoreError> {
        let raw = entries
            .iter()
            .map(|(key, value)| -> Result<(String, String), StoreError> {
                Ok((key.clone(), serde_json::to_string(value)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.entries.write().extend(raw);
        Ok(())
    }

    /// Writes raw text, bypassing serialization.
    pub fn save_raw(&self, key: &str, raw: impl Into<String>) {
        self.entries.write().insert(key.to_string(), raw.into());
    }
}

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "kv_store" (
    "key" TEXT PRIMARY KEY NOT NULL,
    "value" TEXT NOT NULL,
    "updated_at" TEXT NOT NULL
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO "kv_store" ("key", "value", "updated_at") VALUES (?, ?, ?)
ON CONFLICT("key") DO UPDATE SET "value" = excluded."value", "updated_at" = excluded."updated_at"
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Each connection to `:memory:` opens a distinct database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = sqlx::query_scalar(r#"SELECT "value" FROM "kv_store" WHERE "key" = ?"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(raw.and_then(|raw| parse_stored(key, &raw)))
    }

    pub async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.save_raw(key, &raw).await
    }

    pub async fn save_raw(&self, key: &str, raw: &str) -> Result<(), StoreError> {
        sqlx::query(UPSERT_SQL)
            .bind(key)
            .bind(raw)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upserts every entry in one transaction.
    pub async fn save_batch(&self, entries: &[(String, Value)]) -> Result<(), StoreError> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            let raw = serde_json::to_string(value)?;
            sqlx::query(UPSERT_SQL)
                .bind(key)
                .bind(&raw)
                .bind(&updated_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn parse_stored(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "stored value is not valid JSON, treating as absent");
            None
        }
    }
}

/// Either backend behind one load/save contract.
#[derive(Debug)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn connect(database_url: Option<&str>) -> Result<Self, StoreError> {
        match database_url {
            Some(url) => Ok(Self::Sqlite(SqliteStore::connect(url).await?)),
            None => Ok(Self::memory()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }

    pub async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.load(key)),
            Self::Sqlite(store) => store.load(key).await,
        }
    }

    pub async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.save(key, value),
            Self::Sqlite(store) => store.save(key, value).await,
        }
    }

    pub async fn save_batch(&self, entries: &[(String, Value)]) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.save_batch(entries),
            Self::Sqlite(store) => store.save_batch(entries).await,
        }
    }

    pub async fn save_raw(&self, key: &str, raw: &str) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => {
                store.save_raw(key, raw);
                Ok(())
            }
            Self::Sqlite(store) => store.save_raw(key, raw).await,
        }
    }

    pub async fn ping(&self) -> bool {
        match self {
            Self::Memory(_) => true,
            Self::Sqlite(store) => store.ping().await,
        }
    }
}

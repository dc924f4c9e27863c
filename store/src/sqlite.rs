use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};

use crate::{
    collection::validate_id,
    retry::{retry_with_backoff, RetryFuture},
    Collection, DocumentStore, StoreError,
};

const UPSERT: &str = "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?) \
     ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at";

/// Documents in a single `documents` table keyed by (collection, id).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_retries: usize,
    initial_delay: Duration,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
        }
    }

    /// Connects and runs migrations. An in-memory database is pinned to a
    /// single connection, since every connection would otherwise see its own
    /// empty database.
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { pool_size.max(1) };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        tracing::info!("Connected to SQLite store at {url}");
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT id FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(rows.iter().map(|row| row.get::<String, _>("id")).collect())
    }

    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        match row {
            Some(row) => {
                let body: String = row.get("body");
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, collection: Collection, id: &str, document: &Value) -> Result<(), StoreError> {
        validate_id(id)?;
        let body = serde_json::to_string(document)?;
        let pool = self.pool.clone();
        let id = id.to_string();
        retry_with_backoff(
            move || -> RetryFuture<(), sqlx::Error> {
                let pool = pool.clone();
                let body = body.clone();
                let id = id.clone();
                Box::pin(async move {
                    sqlx::query(UPSERT)
                        .bind(collection.as_str())
                        .bind(id)
                        .bind(body)
                        .bind(Utc::now())
                        .execute(&pool)
                        .await
                        .map(|_| ())
                })
            },
            self.max_retries,
            self.initial_delay,
        )
        .await
        .map_err(|e| StoreError::Query(e.to_string()))
    }
}

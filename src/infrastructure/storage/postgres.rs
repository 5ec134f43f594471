use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::storage::{Storage, StorageEntity, StorageKey};

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl PostgresConfig {
    pub async fn connect(&self) -> DomainResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await
            .map_err(|err| DomainError::storage(format!("postgres connect failed: {err}")))
    }
}

/// Postgres-backed storage. Each collection is one table of JSONB
/// documents keyed by the entity's storage key.
#[derive(Debug)]
pub struct PostgresStorage<E: StorageEntity> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: StorageEntity> PostgresStorage<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Creates the collection table if it does not exist yet.
    /// `E::COLLECTION` is a compile-time constant, never user input.
    pub async fn ensure_table(&self) -> DomainResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            E::COLLECTION
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::storage(err.to_string())
}

#[async_trait]
impl<E: StorageEntity> Storage<E> for PostgresStorage<E> {
    async fn get(&self, key: &E::Key) -> DomainResult<Option<E>> {
        let sql = format!("SELECT data FROM {} WHERE key = $1", E::COLLECTION);
        let row = sqlx::query(&sql)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data").map_err(storage_error)?;
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entity: &E) -> DomainResult<()> {
        let sql = format!(
            "INSERT INTO {} (key, data) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
            E::COLLECTION
        );
        let data = serde_json::to_value(entity)?;
        sqlx::query(&sql)
            .bind(entity.storage_key().as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn delete(&self, key: &E::Key) -> DomainResult<bool> {
        let sql = format!("DELETE FROM {} WHERE key = $1", E::COLLECTION);
        let result = sqlx::query(&sql)
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> DomainResult<Vec<E>> {
        let sql = format!("SELECT data FROM {}", E::COLLECTION);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.try_get("data").map_err(storage_error)?;
                Ok(serde_json::from_value(data)?)
            })
            .collect()
    }

    async fn count(&self) -> DomainResult<usize> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", E::COLLECTION);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        let count: i64 = row.try_get("n").map_err(storage_error)?;
        Ok(count as usize)
    }
}

//! PostgreSQL implementation of the document store.
//!
//! All documents share one `documents` table holding JSONB bodies keyed by
//! full path. Transactions run at `SERIALIZABLE`, so PostgreSQL itself
//! detects read/write races; those surface as [`StoreError::Aborted`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use super::document::{
    CollectionPath, DocumentPath, DocumentStore, SetMode, StoreError, Transaction, apply_set,
};

/// SQLSTATE codes that mean "lost a race, re-run the transaction".
const RETRYABLE_SQLSTATES: [&str; 3] = ["40001", "40P01", "23505"];

/// Document store backed by a `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached
    /// or a migration fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

/// Maps a sqlx error onto the store taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
    {
        return StoreError::Aborted;
    }
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        sqlx::query_scalar::<_, Value>("SELECT data FROM documents WHERE path = $1")
            .bind(path.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError> {
        sqlx::query_as::<_, (String, Value)>(
            "SELECT doc_id, data FROM documents WHERE collection = $1 ORDER BY doc_id",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Serializable PostgreSQL transaction.
///
/// Rolled back automatically if dropped before [`Transaction::commit`].
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl PostgresTransaction {
    fn conn(&mut self) -> Result<&mut sqlx::Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or_else(|| {
            StoreError::Unavailable("transaction already committed".to_string())
        })
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn get(&mut self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let tx = self.conn()?;
        sqlx::query_scalar::<_, Value>("SELECT data FROM documents WHERE path = $1")
            .bind(path.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list(
        &mut self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let tx = self.conn()?;
        sqlx::query_as::<_, (String, Value)>(
            "SELECT doc_id, data FROM documents WHERE collection = $1 ORDER BY doc_id",
        )
        .bind(collection.as_str())
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)
    }

    async fn set(
        &mut self,
        path: &DocumentPath,
        value: Value,
        mode: SetMode,
    ) -> Result<(), StoreError> {
        let tx = self.conn()?;
        let existing = match mode {
            SetMode::Overwrite => None,
            SetMode::Merge | SetMode::Update => sqlx::query_scalar::<_, Value>(
                "SELECT data FROM documents WHERE path = $1",
            )
            .bind(path.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?,
        };
        let data = apply_set(existing, value, mode);

        sqlx::query(
            "INSERT INTO documents (path, collection, doc_id, data, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (path) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(path.to_string())
        .bind(path.parent().as_str())
        .bind(path.id())
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(&mut self, path: &DocumentPath) -> Result<(), StoreError> {
        let tx = self.conn()?;
        sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path.to_string())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or_else(|| {
            StoreError::Unavailable("transaction already committed".to_string())
        })?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}

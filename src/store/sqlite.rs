//! SQLite-backed document store.
//!
//! Documents live as JSON text in a single `documents` table keyed by
//! `(collection, id)`. Each batch commits inside one `sqlx` transaction,
//! which gives the true all-or-nothing semantics the batch writer's
//! failure accounting relies on.

use std::str::FromStr;

use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{
    strip_system_fields, Document, DocumentStore, WriteOp, FIELD_CREATED, FIELD_TENANT,
    FIELD_UPDATED, MAX_OPS_PER_BATCH,
};
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (\n\
    collection TEXT NOT NULL,\n\
    id TEXT NOT NULL,\n\
    data TEXT NOT NULL,\n\
    created_at TEXT NOT NULL,\n\
    updated_at TEXT NOT NULL,\n\
    PRIMARY KEY (collection, id)\n\
)";

/// Document store over a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://crmport.db`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// An in-memory database, one connection so every caller sees the same
    /// data. Used by tests and throwaway runs.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    async fn apply_op(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        tenant_id: &str,
        op: WriteOp,
        now: &str,
    ) -> StoreResult<()> {
        let mut data = op.data;
        strip_system_fields(&mut data);
        data.insert(FIELD_TENANT.to_string(), json!(tenant_id));
        data.insert(FIELD_UPDATED.to_string(), json!(now));

        match op.id {
            Some(id) => {
                let existing = sqlx::query(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                )
                .bind(collection)
                .bind(&id)
                .fetch_optional(&mut **tx)
                .await?;

                match existing {
                    Some(row) => {
                        let stored: String = row.try_get("data")?;
                        let mut merged: Map<String, Value> = serde_json::from_str(&stored)
                            .map_err(|source| StoreError::CorruptDocument {
                                collection: collection.to_string(),
                                id: id.clone(),
                                source,
                            })?;
                        // Merge: incoming fields win, untouched fields stay,
                        // and the original createdAt survives because the
                        // incoming data never carries one.
                        for (key, value) in data {
                            merged.insert(key, value);
                        }
                        sqlx::query(
                            "UPDATE documents SET data = ?3, updated_at = ?4 \
                             WHERE collection = ?1 AND id = ?2",
                        )
                        .bind(collection)
                        .bind(&id)
                        .bind(serde_json::to_string(&merged)?)
                        .bind(now)
                        .execute(&mut **tx)
                        .await?;
                    }
                    None => {
                        data.insert(FIELD_CREATED.to_string(), json!(now));
                        insert_document(tx, collection, &id, &data, now).await?;
                    }
                }
            }
            None => {
                let id = Uuid::new_v4().to_string();
                data.insert(FIELD_CREATED.to_string(), json!(now));
                insert_document(tx, collection, &id, &data, now).await?;
            }
        }

        Ok(())
    }
}

async fn insert_document(
    tx: &mut Transaction<'_, Sqlite>,
    collection: &str,
    id: &str,
    data: &Map<String, Value>,
    now: &str,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO documents (collection, id, data, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(collection)
    .bind(id)
    .bind(serde_json::to_string(data)?)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_document(collection: &str, row: &sqlx::sqlite::SqliteRow) -> StoreResult<Document> {
    let id: String = row.try_get("id")?;
    let raw: String = row.try_get("data")?;
    let data = serde_json::from_str(&raw).map_err(|source| StoreError::CorruptDocument {
        collection: collection.to_string(),
        id: id.clone(),
        source,
    })?;
    Ok(Document { id, data })
}

impl DocumentStore for SqliteStore {
    async fn commit_batch(
        &self,
        collection: &str,
        tenant_id: &str,
        ops: Vec<WriteOp>,
    ) -> StoreResult<()> {
        if ops.len() > MAX_OPS_PER_BATCH {
            return Err(StoreError::BatchTooLarge {
                size: ops.len(),
                max: MAX_OPS_PER_BATCH,
            });
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for op in ops {
            Self::apply_op(&mut tx, collection, tenant_id, op, &now).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE collection = ?1 \
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_document(collection, row))
            .collect()
    }

    async fn append(&self, collection: &str, mut data: Map<String, Value>) -> StoreResult<String> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        data.insert(FIELD_CREATED.to_string(), json!(now));

        sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(collection)
        .bind(&id)
        .bind(serde_json::to_string(&data)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn fetch_recent(&self, collection: &str, limit: usize) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE collection = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_document(collection, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_stamps_system_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        // Incoming system fields must be discarded, not trusted.
        let data = doc(&[
            ("name", json!("Alice")),
            ("companyId", json!("spoofed")),
            ("createdAt", json!("1999-01-01T00:00:00Z")),
        ]);
        store
            .commit_batch("tenants/acme/contacts", "acme", vec![WriteOp::create(data)])
            .await
            .unwrap();

        let docs = store.fetch_all("tenants/acme/contacts").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["companyId"], "acme");
        assert_eq!(docs[0].data["name"], "Alice");
        assert!(docs[0].data["createdAt"].as_str().unwrap().starts_with("20"));
        assert!(docs[0].data.contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn test_upsert_merges_and_preserves_created_at() {
        let store = SqliteStore::in_memory().await.unwrap();
        let collection = "tenants/acme/contacts";

        store
            .commit_batch(
                collection,
                "acme",
                vec![WriteOp::upsert(
                    "c1",
                    doc(&[("name", json!("Alice")), ("phone", json!("123"))]),
                )],
            )
            .await
            .unwrap();

        let before = store.fetch_all(collection).await.unwrap();
        let created_at = before[0].data["createdAt"].clone();

        store
            .commit_batch(
                collection,
                "acme",
                vec![WriteOp::upsert("c1", doc(&[("name", json!("Alice B."))]))],
            )
            .await
            .unwrap();

        let after = store.fetch_all(collection).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].data["name"], "Alice B.");
        // untouched field survives the merge
        assert_eq!(after[0].data["phone"], "123");
        assert_eq!(after[0].data["createdAt"], created_at);
    }

    #[tokio::test]
    async fn test_upsert_missing_document_creates_it() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .commit_batch(
                "tenants/acme/contacts",
                "acme",
                vec![WriteOp::upsert("c9", doc(&[("name", json!("Bob"))]))],
            )
            .await
            .unwrap();

        let docs = store.fetch_all("tenants/acme/contacts").await.unwrap();
        assert_eq!(docs[0].id, "c9");
        assert!(docs[0].data.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn test_batch_over_cap_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ops: Vec<WriteOp> = (0..=MAX_OPS_PER_BATCH)
            .map(|i| WriteOp::create(doc(&[("n", json!(i))])))
            .collect();

        let err = store
            .commit_batch("tenants/acme/contacts", "acme", ops)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size: 501, .. }));

        // nothing landed
        let docs = store.fetch_all("tenants/acme/contacts").await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crmport-test.db");
        let url = format!("sqlite://{}", path.display());

        let store = SqliteStore::connect(&url).await.unwrap();
        store
            .append("tenants/acme/auditLogs", doc(&[("seq", json!(0))]))
            .await
            .unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .commit_batch(
                "tenants/acme/contacts",
                "acme",
                vec![WriteOp::create(doc(&[("name", json!("A"))]))],
            )
            .await
            .unwrap();

        let other = store.fetch_all("tenants/globex/contacts").await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_recent_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let collection = "tenants/acme/auditLogs";
        for i in 0..3 {
            store
                .append(collection, doc(&[("seq", json!(i))]))
                .await
                .unwrap();
        }

        let recent = store.fetch_recent(collection, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].data["seq"], 2);
        assert_eq!(recent[1].data["seq"], 1);
    }
}

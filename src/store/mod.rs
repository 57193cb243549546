//! Document store abstraction.
//!
//! The pipeline talks to its storage backend through [`DocumentStore`]: a
//! tenant-scoped, collection-addressed document database with atomic batch
//! commits. Collection paths follow `tenants/{tenantId}/{entity}` with the
//! audit trail under `tenants/{tenantId}/auditLogs`.
//!
//! System-managed fields are the store's job, not the caller's: every
//! written document gets `companyId` and a server-assigned `updatedAt`
//! (plus `createdAt` on fresh inserts), and any such fields arriving in the
//! input data are discarded first.
//!
//! The shipped implementation is [`SqliteStore`]; the trait seam exists so
//! tests can inject failing or recording backends.

use serde_json::{Map, Value};

use crate::error::StoreResult;

mod sqlite;

pub use sqlite::SqliteStore;

/// Hard platform cap on operations per atomic batch.
pub const MAX_OPS_PER_BATCH: usize = 500;

/// Tenant id field stamped onto every written document.
pub const FIELD_TENANT: &str = "companyId";
/// Server-assigned creation timestamp field.
pub const FIELD_CREATED: &str = "createdAt";
/// Server-assigned update timestamp field.
pub const FIELD_UPDATED: &str = "updatedAt";

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub struct WriteOp {
    /// Explicit document id: upsert-merge when present, fresh create with a
    /// generated id when absent.
    pub id: Option<String>,
    pub data: Map<String, Value>,
}

impl WriteOp {
    pub fn create(data: Map<String, Value>) -> Self {
        Self { id: None, data }
    }

    pub fn upsert(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            data,
        }
    }
}

/// A stored document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Tenant-scoped document database with atomic batch commits.
pub trait DocumentStore {
    /// Commit up to [`MAX_OPS_PER_BATCH`] writes as one atomic operation:
    /// either every op lands or none does.
    fn commit_batch(
        &self,
        collection: &str,
        tenant_id: &str,
        ops: Vec<WriteOp>,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Fetch every document in a collection, oldest first.
    fn fetch_all(
        &self,
        collection: &str,
    ) -> impl std::future::Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Append one document with a generated id and server timestamp.
    fn append(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> impl std::future::Future<Output = StoreResult<String>> + Send;

    /// Fetch the most recent documents in a collection, newest first.
    fn fetch_recent(
        &self,
        collection: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = StoreResult<Vec<Document>>> + Send;
}

/// Strip caller-supplied system fields; they are never taken from input.
pub(crate) fn strip_system_fields(data: &mut Map<String, Value>) {
    data.remove(FIELD_TENANT);
    data.remove(FIELD_CREATED);
    data.remove(FIELD_UPDATED);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles for exercising pipeline failure and accounting paths.

    use std::sync::Mutex;

    use super::*;
    use crate::error::StoreError;

    /// Records batch sizes without writing anywhere.
    #[derive(Default)]
    pub struct RecordingStore {
        pub batch_sizes: Mutex<Vec<usize>>,
    }

    impl DocumentStore for RecordingStore {
        async fn commit_batch(
            &self,
            _collection: &str,
            _tenant_id: &str,
            ops: Vec<WriteOp>,
        ) -> StoreResult<()> {
            self.batch_sizes.lock().unwrap().push(ops.len());
            Ok(())
        }

        async fn fetch_all(&self, _collection: &str) -> StoreResult<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn append(&self, _collection: &str, _data: Map<String, Value>) -> StoreResult<String> {
            Ok("recorded".to_string())
        }

        async fn fetch_recent(
            &self,
            _collection: &str,
            _limit: usize,
        ) -> StoreResult<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    /// Fails every batch commit; reads succeed but find nothing.
    #[derive(Default)]
    pub struct FailingStore;

    impl DocumentStore for FailingStore {
        async fn commit_batch(
            &self,
            _collection: &str,
            _tenant_id: &str,
            _ops: Vec<WriteOp>,
        ) -> StoreResult<()> {
            Err(StoreError::Database(sqlx::Error::Protocol(
                "simulated commit failure".into(),
            )))
        }

        async fn fetch_all(&self, _collection: &str) -> StoreResult<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn append(&self, _collection: &str, _data: Map<String, Value>) -> StoreResult<String> {
            Err(StoreError::Database(sqlx::Error::Protocol(
                "simulated append failure".into(),
            )))
        }

        async fn fetch_recent(
            &self,
            _collection: &str,
            _limit: usize,
        ) -> StoreResult<Vec<Document>> {
            Ok(Vec::new())
        }
    }
}

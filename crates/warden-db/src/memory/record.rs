//! In-memory record store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::RecordRow;
use crate::repo::{NewRecord, RecordStore, Scope};

/// In-memory store for tenant-owned records
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<Uuid, RecordRow>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a record with no tenant predicate (test assertions only)
    pub fn peek(&self, id: Uuid) -> Option<RecordRow> {
        self.records.get(&id).map(|r| r.value().clone())
    }
}

fn visible(row: &RecordRow, scope: Scope, collection: &str) -> bool {
    row.collection == collection && scope.admits(row.tenant_id)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<Option<RecordRow>> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| visible(r.value(), scope, collection))
            .map(|r| r.value().clone()))
    }

    async fn list(&self, scope: Scope, collection: &str, limit: i64) -> DbResult<Vec<RecordRow>> {
        let mut rows: Vec<RecordRow> = self
            .records
            .iter()
            .filter(|r| visible(r.value(), scope, collection))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn insert(&self, record: NewRecord) -> DbResult<RecordRow> {
        let Entry::Vacant(slot) = self.records.entry(record.id) else {
            return Err(DbError::Conflict("record already exists".to_string()));
        };
        let now = Utc::now();
        let row = RecordRow {
            id: record.id,
            tenant_id: record.tenant_id,
            collection: record.collection,
            data: record.data,
            created_at: now,
            updated_at: now,
        };
        slot.insert(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        scope: Scope,
        collection: &str,
        id: Uuid,
        data: serde_json::Value,
    ) -> DbResult<Option<RecordRow>> {
        let Some(mut row) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if !visible(&row, scope, collection) {
            return Ok(None);
        }
        row.data = data;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<bool> {
        Ok(self
            .records
            .remove_if(&id, |_, row| visible(row, scope, collection))
            .is_some())
    }
}

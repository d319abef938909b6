//! In-memory fake for the veto store (testing only)
//!
//! `MemoryVetoStore` satisfies the `VetoStore` contract without any
//! external dependencies. The CAS semantics match the SurrealDB backend:
//! a transition commits only if the record is still `Pending` under the
//! lock, so decide-vs-reap races resolve the same way in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::store_traits::*;

/// In-memory veto store backed by a `HashMap<approval_id, record>`.
#[derive(Debug, Default)]
pub struct MemoryVetoStore {
    records: Mutex<HashMap<String, PendingApproval>>,
}

impl MemoryVetoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VetoStore for MemoryVetoStore {
    async fn insert_pending(&self, record: PendingApproval) -> StoreResult<()> {
        let mut records = self.records.lock().unwrap();
        let key = record.approval_id.as_str().to_string();
        if records.contains_key(&key) {
            return Err(StoreError::DuplicateRecord { approval_id: key });
        }
        records.insert(key, record);
        Ok(())
    }

    async fn get(&self, id: &ApprovalId) -> StoreResult<PendingApproval> {
        let records = self.records.lock().unwrap();
        records
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                approval_id: id.as_str().to_string(),
            })
    }

    async fn transition(
        &self,
        id: &ApprovalId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
    ) -> StoreResult<Option<PendingApproval>> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::RecordNotFound {
                approval_id: id.as_str().to_string(),
            })?;

        if record.status != ApprovalStatus::Pending {
            return Ok(None);
        }

        record.status = to;
        record.decided_at = Some(decided_at);
        record.decided_by = decided_by;
        Ok(Some(record.clone()))
    }

    async fn list_pending(&self) -> StoreResult<Vec<PendingApproval>> {
        let records = self.records.lock().unwrap();
        let mut pending: Vec<PendingApproval> = records
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn expire_older_than(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PendingApproval>> {
        let mut records = self.records.lock().unwrap();
        let mut expired = Vec::new();
        for record in records.values_mut() {
            if record.status == ApprovalStatus::Pending && record.created_at < cutoff {
                record.status = ApprovalStatus::Expired;
                record.decided_at = Some(now);
                record.decided_by = None;
                expired.push(record.clone());
            }
        }
        expired.sort_by_key(|r| r.created_at);
        Ok(expired)
    }
}

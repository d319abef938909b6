//! SurrealDB-backed VetoStore implementation
//!
//! Uses `schema::ApprovalRow` for persistence, converting to/from
//! `store_traits` types at the boundary. Status transitions are
//! expressed as a single conditional `UPDATE ... WHERE status =
//! 'pending' RETURN AFTER` statement — SurrealDB runs each statement in
//! its own transaction, which is exactly the compare-and-swap the veto
//! gate's race semantics require.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::migrations;
use crate::schema::ApprovalRow;
use crate::store_traits::{
    ApprovalId, ApprovalStatus, PendingApproval, StoreResult, VetoStore,
};

/// SurrealDB-backed implementation of [`VetoStore`].
pub struct SurrealVetoStore {
    db: Surreal<Any>,
}

impl SurrealVetoStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `toolgate/main`, and runs
    /// `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Open (or create) an on-disk store rooted at `path`.
    pub async fn open(path: &str) -> crate::Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Connection(format!("failed to create store directory {path}: {e}"))
        })?;
        Self::connect(&format!("surrealkv://{path}")).await
    }

    /// Create from the `TOOLGATE_DB_URL` environment variable, falling
    /// back to local persistence in `.toolgate/db`.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("TOOLGATE_DB_URL") {
            info!("connecting veto store ({url})");
            return Self::connect(&url).await;
        }
        let path = ".toolgate/db";
        info!("no TOOLGATE_DB_URL set, using local persistence: {path}");
        Self::open(path).await
    }

    async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        db.use_ns("toolgate")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        debug!("veto store connected ({url})");
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch a row by approval id, or RecordNotFound.
    async fn fetch_row(&self, id: &str) -> StoreResult<ApprovalRow> {
        let id_owned = id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM approvals WHERE approval_id = $id")
            .bind(("id", id_owned))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<ApprovalRow> = res
            .take(0)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::RecordNotFound {
                approval_id: id.to_string(),
            })
    }
}

#[async_trait]
impl VetoStore for SurrealVetoStore {
    async fn insert_pending(&self, record: PendingApproval) -> StoreResult<()> {
        let id = record.approval_id.as_str().to_string();
        let row = ApprovalRow::from_record(record);

        debug!(approval_id = %id, "persisting pending approval");

        let created: Result<Option<ApprovalRow>, surrealdb::Error> =
            self.db.create("approvals").content(row).await;

        match created {
            Ok(_) => Ok(()),
            Err(e) => {
                // The unique index rejects duplicates; distinguish that
                // from a genuine backend failure by re-checking.
                if self.fetch_row(&id).await.is_ok() {
                    Err(StoreError::DuplicateRecord { approval_id: id })
                } else {
                    Err(StoreError::Backend(e.to_string()))
                }
            }
        }
    }

    async fn get(&self, id: &ApprovalId) -> StoreResult<PendingApproval> {
        let row = self.fetch_row(id.as_str()).await?;
        row.into_record()
    }

    async fn transition(
        &self,
        id: &ApprovalId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
    ) -> StoreResult<Option<PendingApproval>> {
        // Existence check first so a missing id is reported as NotFound
        // rather than as a silently lost race.
        self.fetch_row(id.as_str()).await?;

        let id_owned = id.as_str().to_string();
        let mut res = self
            .db
            .query(
                "UPDATE approvals SET status = $to, decided_at = $at, decided_by = $by \
                 WHERE approval_id = $id AND status = 'pending' RETURN AFTER",
            )
            .bind(("to", to.as_str()))
            .bind(("at", SurrealDatetime::from(decided_at)))
            .bind(("by", decided_by))
            .bind(("id", id_owned))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<ApprovalRow> = res
            .take(0)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_record()?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> StoreResult<Vec<PendingApproval>> {
        let mut res = self
            .db
            .query("SELECT * FROM approvals WHERE status = 'pending' ORDER BY created_at ASC")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<ApprovalRow> = res
            .take(0)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(ApprovalRow::into_record).collect()
    }

    async fn expire_older_than(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PendingApproval>> {
        let mut res = self
            .db
            .query(
                "UPDATE approvals SET status = 'expired', decided_at = $now \
                 WHERE status = 'pending' AND created_at < $cutoff RETURN AFTER",
            )
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("cutoff", SurrealDatetime::from(cutoff)))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<ApprovalRow> = res
            .take(0)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut expired: Vec<PendingApproval> = rows
            .into_iter()
            .map(ApprovalRow::into_record)
            .collect::<StoreResult<_>>()?;
        expired.sort_by_key(|r| r.created_at);
        Ok(expired)
    }
}

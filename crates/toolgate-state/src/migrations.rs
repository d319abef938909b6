//! SurrealDB schema initialization for the approvals table
//!
//! Safe to call multiple times (idempotent). The unique index on
//! `approval_id` is what turns at-most-one submission into a storage
//! property rather than a read-then-check.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::Result;
use crate::StoreError;

/// Initialize the toolgate approvals schema.
///
/// Schema:
/// ```text
/// TABLE approvals {
///   approval_id:       STRING (primary key, unique)
///   tenant_id:         STRING (indexed)
///   tool_name:         STRING
///   arguments:         OBJECT
///   capability_grant:  OBJECT
///   status:            STRING (enum: pending | approved | rejected | expired)
///   created_at:        DATETIME (indexed)
///   decided_at:        DATETIME?
///   decided_by:        STRING?
/// }
/// ```
///
/// Constraints:
/// - `approval_id` is unique (at-most-one record per request)
/// - `status` transitions pending → approved | rejected | expired are
///   enforced by conditional updates in the store implementation
/// - records are never deleted (delete permission NONE — audit trail)
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    debug!("initializing approvals table");

    let sql = r#"
        DEFINE TABLE approvals AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete NONE;

        -- At-most-one record per approval id
        DEFINE INDEX idx_approval_id ON TABLE approvals COLUMNS approval_id UNIQUE;

        -- Index tenant_id for per-tenant listings
        DEFINE INDEX idx_tenant_id ON TABLE approvals COLUMNS tenant_id;

        -- Composite index (status, created_at) for pending scans and reaping
        DEFINE INDEX idx_status_created_at ON TABLE approvals COLUMNS status, created_at;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;

    info!("approvals schema initialized");
    Ok(())
}

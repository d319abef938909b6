//! Error types for toolgate-state

use thiserror::Error;

/// Errors that can occur in the approval persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection error
    #[error("store connection failed: {0}")]
    Connection(String),

    /// Backend query or write error
    #[error("store backend failed: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A record with the same approval id already exists
    #[error("duplicate approval record: {approval_id}")]
    DuplicateRecord { approval_id: String },

    /// No record exists for the given approval id
    #[error("approval record not found: {approval_id}")]
    RecordNotFound { approval_id: String },

    /// Schema setup error
    #[error("schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

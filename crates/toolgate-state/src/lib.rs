//! Toolgate-State: durable approval persistence for the veto gate.
//!
//! This crate owns all I/O with the durable store backing suspended
//! high-risk tool invocations. Every status change is expressed as a
//! single-record atomic conditional update, so concurrent deciders and
//! the expiry reaper race-resolve at the storage layer: exactly one
//! transition commits, the other observes the loss.
//!
//! ## Key components
//!
//! - [`VetoStore`]: the storage trait (insert-pending, CAS transition,
//!   pending listing, batch expiry)
//! - [`SurrealVetoStore`]: embedded SurrealDB backend (`kv-mem` for
//!   tests, `kv-surrealkv` for on-disk persistence)
//! - [`fakes::MemoryVetoStore`]: in-memory fake for unit tests

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod store_traits;
mod surreal_store;

pub use error::StoreError;
pub use store_traits::{
    ApprovalId, ApprovalStatus, PendingApproval, StoreResult, VetoStore,
};
pub use surreal_store::SurrealVetoStore;

/// Result type for toolgate-state operations
pub type Result<T> = std::result::Result<T, StoreError>;

//! Veto gate: durable suspend-for-approval of high-risk invocations.
//!
//! The only durable state in the execution core lives behind this
//! module. See [`veto::VetoGate`] for the state machine and
//! [`error::GateError`] for the outcome taxonomy.

pub mod error;
pub mod veto;

pub use error::{GateError, GateResult};
pub use veto::{Decision, VetoGate};

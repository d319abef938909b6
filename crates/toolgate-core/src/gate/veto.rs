//! The veto gate state machine.
//!
//! Intercepts high-risk execution requests, persists them, and exposes
//! the resume/reject entry points. Transitions are
//! `Pending → {Approved, Rejected}` plus the time-driven
//! `Pending → Expired`; all three outcomes are terminal. A second act
//! on a terminal record fails with `AlreadyDecided` — idempotent
//! detection, not idempotent overwrite.
//!
//! The gate holds no state of its own: every mutation is a conditional
//! update in the durable store, so concurrent `decide` and
//! `reap_expired` calls race-resolve there, first committed transition
//! wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use toolgate_state::{
    ApprovalId, ApprovalStatus, PendingApproval, StoreError, VetoStore,
};

use super::error::{GateError, GateResult};
use crate::capability::CapabilityGrant;
use crate::domain::ExecutionRequest;

/// The decision an approver can take on a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn terminal_status(self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// Durable suspend-for-approval gate over a [`VetoStore`].
pub struct VetoGate<S: VetoStore> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: VetoStore> VetoGate<S> {
    /// Create a gate with the given pending-record TTL.
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// The configured TTL for pending records.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persist a new pending record for a high-risk request.
    ///
    /// Returns immediately — suspension is external, never a blocked
    /// call. Fails with [`GateError::DuplicateRequest`] if a record for
    /// the same request id already exists, leaving the first record
    /// untouched.
    pub async fn submit(
        &self,
        request: &ExecutionRequest,
        grant: &CapabilityGrant,
        now: DateTime<Utc>,
    ) -> GateResult<PendingApproval> {
        let record = PendingApproval {
            approval_id: ApprovalId::from_request(&request.request_id.0),
            tenant_id: request.tenant_id.clone(),
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            capability_grant: serde_json::to_value(grant)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            status: ApprovalStatus::Pending,
            created_at: now,
            decided_at: None,
            decided_by: None,
        };

        match self.store.insert_pending(record.clone()).await {
            Ok(()) => {
                info!(
                    approval_id = %record.approval_id.short(),
                    tenant_id = %record.tenant_id,
                    tool = %record.tool_name,
                    "suspended high-risk invocation for approval"
                );
                Ok(record)
            }
            Err(StoreError::DuplicateRecord { .. }) => Err(GateError::DuplicateRequest {
                request_id: request.request_id.0.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit an approver's decision on a pending record.
    ///
    /// Fails with `NotFound` if no record exists, `AlreadyDecided` if a
    /// terminal transition already committed, and `Expired` if the TTL
    /// has elapsed — in which case the record is atomically transitioned
    /// to `Expired` rather than the late decision being honored.
    pub async fn decide(
        &self,
        id: &ApprovalId,
        decision: Decision,
        decided_by: &str,
        now: DateTime<Utc>,
    ) -> GateResult<PendingApproval> {
        let record = self.store.get(id).await.map_err(not_found)?;

        if record.status.is_terminal() {
            return Err(GateError::AlreadyDecided {
                approval_id: id.as_str().to_string(),
                status: record.status,
            });
        }

        if now - record.created_at >= self.ttl {
            // The TTL elapsed before this decision arrived: commit the
            // expiry ourselves rather than honoring a late decision.
            // Losing this transition race means some other terminal
            // transition just committed; report whatever it was.
            match self
                .store
                .transition(id, ApprovalStatus::Expired, now, None)
                .await?
            {
                Some(_) => {
                    return Err(GateError::Expired {
                        approval_id: id.as_str().to_string(),
                    })
                }
                None => return Err(self.terminal_outcome(id).await?),
            }
        }

        match self
            .store
            .transition(
                id,
                decision.terminal_status(),
                now,
                Some(decided_by.to_string()),
            )
            .await?
        {
            Some(updated) => {
                info!(
                    approval_id = %id.short(),
                    outcome = %updated.status,
                    decided_by,
                    "approval decided"
                );
                Ok(updated)
            }
            None => Err(self.terminal_outcome(id).await?),
        }
    }

    /// Transition every pending record older than the TTL to `Expired`.
    ///
    /// Safe to run concurrently with `decide`: both sides go through the
    /// store's conditional update, so exactly one transition commits per
    /// record. Returns the records this pass expired (count = `len()`).
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> GateResult<Vec<PendingApproval>> {
        let cutoff = now - self.ttl;
        let reaped = self.store.expire_older_than(cutoff, now).await?;
        for record in &reaped {
            info!(
                approval_id = %record.approval_id.short(),
                tenant_id = %record.tenant_id,
                tool = %record.tool_name,
                "pending approval expired"
            );
        }
        Ok(reaped)
    }

    /// Return all records still pending, for startup recovery.
    ///
    /// The surrounding system decides whether to re-expose them for
    /// approval or expire the overdue ones immediately based on their
    /// stored timestamps.
    pub async fn recover(&self) -> GateResult<Vec<PendingApproval>> {
        let pending = self.store.list_pending().await?;
        debug!(count = pending.len(), "recovered pending approvals");
        Ok(pending)
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &ApprovalId) -> GateResult<PendingApproval> {
        self.store.get(id).await.map_err(not_found)
    }

    /// After a lost transition race, read the record back and report the
    /// terminal state that actually committed.
    async fn terminal_outcome(&self, id: &ApprovalId) -> GateResult<GateError> {
        let record = self.store.get(id).await.map_err(not_found)?;
        Ok(match record.status {
            ApprovalStatus::Expired => GateError::Expired {
                approval_id: id.as_str().to_string(),
            },
            status => GateError::AlreadyDecided {
                approval_id: id.as_str().to_string(),
                status,
            },
        })
    }
}

fn not_found(err: StoreError) -> GateError {
    match err {
        StoreError::RecordNotFound { approval_id } => GateError::NotFound { approval_id },
        other => GateError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionRequest;
    use toolgate_state::fakes::MemoryVetoStore;

    fn gate(ttl_secs: i64) -> VetoGate<MemoryVetoStore> {
        VetoGate::new(Arc::new(MemoryVetoStore::new()), Duration::seconds(ttl_secs))
    }

    fn request(request_id: &str) -> ExecutionRequest {
        ExecutionRequest {
            request_id: crate::domain::RequestId(request_id.into()),
            tenant_id: "t1".into(),
            tool_name: "delete-file".into(),
            arguments: serde_json::json!({"path": "old.log"}),
        }
    }

    fn grant() -> CapabilityGrant {
        CapabilityGrant::deny_all("t1", 1000)
    }

    #[tokio::test]
    async fn test_submit_returns_pending_record() {
        let gate = gate(300);
        let now = Utc::now();
        let record = gate.submit(&request("req-1"), &grant(), now).await.unwrap();
        assert_eq!(record.status, ApprovalStatus::Pending);
        assert_eq!(record.created_at, now);
        assert_eq!(record.approval_id, ApprovalId::from_request("req-1"));
    }

    #[tokio::test]
    async fn test_duplicate_submit_fails() {
        let gate = gate(300);
        let now = Utc::now();
        gate.submit(&request("req-1"), &grant(), now).await.unwrap();
        let err = gate
            .submit(&request("req-1"), &grant(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateRequest { .. }));
    }

    #[tokio::test]
    async fn test_approve_then_second_decide_is_already_decided() {
        let gate = gate(300);
        let now = Utc::now();
        let record = gate.submit(&request("req-1"), &grant(), now).await.unwrap();

        let approved = gate
            .decide(&record.approval_id, Decision::Approve, "admin1", now)
            .await
            .unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.decided_by.as_deref(), Some("admin1"));

        // Same outcome twice is still AlreadyDecided, both times.
        for _ in 0..2 {
            let err = gate
                .decide(&record.approval_id, Decision::Approve, "admin1", now)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                GateError::AlreadyDecided {
                    status: ApprovalStatus::Approved,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_decide_unknown_id_is_not_found() {
        let gate = gate(300);
        let err = gate
            .decide(
                &ApprovalId::from_request("ghost"),
                Decision::Reject,
                "admin1",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_late_decide_expires_instead_of_honoring() {
        let gate = gate(60);
        let now = Utc::now();
        let record = gate.submit(&request("req-1"), &grant(), now).await.unwrap();

        let late = now + Duration::seconds(61);
        let err = gate
            .decide(&record.approval_id, Decision::Approve, "admin1", late)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Expired { .. }));

        // The expiry committed durably; the decision did not.
        let stored = gate.get(&record.approval_id).await.unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
        assert!(stored.decided_by.is_none());
    }

    #[tokio::test]
    async fn test_reap_expires_only_overdue_records() {
        let gate = gate(60);
        let now = Utc::now();
        let old = gate
            .submit(&request("req-old"), &grant(), now - Duration::seconds(120))
            .await
            .unwrap();
        gate.submit(&request("req-new"), &grant(), now).await.unwrap();

        let reaped = gate.reap_expired(now).await.unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].approval_id, old.approval_id);

        // The reaped record refuses a later decision.
        let err = gate
            .decide(&old.approval_id, Decision::Approve, "admin1", now)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::AlreadyDecided { status: ApprovalStatus::Expired, .. }));
    }

    #[tokio::test]
    async fn test_recover_lists_pending_only() {
        let gate = gate(300);
        let now = Utc::now();
        let first = gate.submit(&request("req-1"), &grant(), now).await.unwrap();
        let second = gate
            .submit(&request("req-2"), &grant(), now + Duration::seconds(1))
            .await
            .unwrap();

        gate.decide(&first.approval_id, Decision::Reject, "admin1", now)
            .await
            .unwrap();

        let pending = gate.recover().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].approval_id, second.approval_id);
    }
}

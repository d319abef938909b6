//! Schema definition for the `approvals` SurrealDB table
//!
//! The row struct mirrors the logical persisted-record schema: status is
//! stored as an enumerated text value, timestamps as native SurrealDB
//! datetimes, and the arguments/grant payloads as JSON objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store_traits::{ApprovalId, ApprovalStatus, PendingApproval};
use crate::StoreError;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// DB row for the `approvals` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRow {
    pub approval_id: String,
    pub tenant_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub capability_grant: serde_json::Value,
    pub status: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime_opt")]
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl ApprovalRow {
    /// Build a row from a record (status flattened to its text form).
    pub fn from_record(record: PendingApproval) -> Self {
        Self {
            approval_id: record.approval_id.0,
            tenant_id: record.tenant_id,
            tool_name: record.tool_name,
            arguments: record.arguments,
            capability_grant: record.capability_grant,
            status: record.status.as_str().to_string(),
            created_at: record.created_at,
            decided_at: record.decided_at,
            decided_by: record.decided_by,
        }
    }

    /// Convert a row back into a record, validating the status text.
    pub fn into_record(self) -> Result<PendingApproval, StoreError> {
        let status = ApprovalStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Backend(format!("unknown approval status: {}", self.status))
        })?;
        Ok(PendingApproval {
            approval_id: ApprovalId(self.approval_id),
            tenant_id: self.tenant_id,
            tool_name: self.tool_name,
            arguments: self.arguments,
            capability_grant: self.capability_grant,
            status,
            created_at: self.created_at,
            decided_at: self.decided_at,
            decided_by: self.decided_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PendingApproval {
        PendingApproval {
            approval_id: ApprovalId::from_request("req-1"),
            tenant_id: "t1".into(),
            tool_name: "delete-file".into(),
            arguments: serde_json::json!({"path": "a.txt"}),
            capability_grant: serde_json::json!({"fuel_ceiling": 5000}),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
            decided_by: None,
        }
    }

    #[test]
    fn test_row_record_round_trip() {
        let record = sample();
        let row = ApprovalRow::from_record(record.clone());
        assert_eq!(row.status, "pending");
        let back = row.into_record().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut row = ApprovalRow::from_record(sample());
        row.status = "limbo".into();
        assert!(row.into_record().is_err());
    }
}

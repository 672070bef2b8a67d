//! # Deployment Records Module
//!
//! Audit trail of lifecycle operations, one row per provision, start, stop or
//! restart. A row is written as `pending` when the operation begins and is
//! moved to `completed` or `failed` when it ends.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of lifecycle operation recorded.
#[derive(DbEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[ExistingTypePath = "crate::schema::sql_types::DeploymentType"]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    Provision,
    Start,
    Stop,
    Restart,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a recorded operation.
#[derive(DbEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[ExistingTypePath = "crate::schema::sql_types::DeploymentStatus"]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Represents a deployment record in the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::deployment_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub tenant_container_id: Uuid,
    pub deployment_type: DeploymentType,
    pub status: DeploymentStatus,
    pub previous_image_tag: Option<String>,
    pub new_image_tag: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub can_rollback: bool,
}

/// Represents a new deployment record to be inserted into the database.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[diesel(table_name = crate::schema::deployment_records)]
pub struct NewDeploymentRecord {
    pub tenant_container_id: Uuid,
    pub deployment_type: DeploymentType,
    pub status: DeploymentStatus,
    pub previous_image_tag: Option<String>,
    pub new_image_tag: Option<String>,
    pub started_at: DateTime<Utc>,
    pub can_rollback: bool,
}

impl NewDeploymentRecord {
    /// Creates a `pending` record for an operation that is about to run.
    pub fn pending(
        tenant_container_id: Uuid,
        deployment_type: DeploymentType,
        previous_image_tag: Option<String>,
        new_image_tag: Option<String>,
    ) -> Self {
        NewDeploymentRecord {
            tenant_container_id,
            deployment_type,
            status: DeploymentStatus::Pending,
            previous_image_tag,
            new_image_tag,
            started_at: Utc::now(),
            can_rollback: false,
        }
    }
}

/// Final state written when an operation ends.
#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::deployment_records)]
pub struct DeploymentOutcome {
    pub status: DeploymentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub can_rollback: bool,
}

impl DeploymentOutcome {
    /// Successful completion. Rollback is possible when a previous image is known.
    pub fn completed(previous_image_tag: Option<&str>) -> Self {
        DeploymentOutcome {
            status: DeploymentStatus::Completed,
            completed_at: Some(Utc::now()),
            error_message: None,
            can_rollback: previous_image_tag.is_some(),
        }
    }

    /// Failure with the captured error text.
    pub fn failed(error_message: impl Into<String>) -> Self {
        DeploymentOutcome {
            status: DeploymentStatus::Failed,
            completed_at: Some(Utc::now()),
            error_message: Some(error_message.into()),
            can_rollback: false,
        }
    }

    /// Applies the outcome to an in-memory copy of the row.
    pub fn apply_to(&self, record: &mut DeploymentRecord) {
        record.status = self.status;
        record.completed_at = self.completed_at;
        record.error_message = self.error_message.clone();
        record.can_rollback = self.can_rollback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record() {
        let id = Uuid::new_v4();
        let record = NewDeploymentRecord::pending(
            id,
            DeploymentType::Provision,
            None,
            Some("app:1.0".to_string()),
        );
        assert_eq!(record.status, DeploymentStatus::Pending);
        assert_eq!(record.deployment_type, DeploymentType::Provision);
        assert!(!record.can_rollback);
    }

    #[test]
    fn test_outcomes() {
        let done = DeploymentOutcome::completed(Some("app:1.0"));
        assert_eq!(done.status, DeploymentStatus::Completed);
        assert!(done.can_rollback);
        assert!(done.error_message.is_none());

        let failed = DeploymentOutcome::failed("compose exited with status 1");
        assert_eq!(failed.status, DeploymentStatus::Failed);
        assert!(!failed.can_rollback);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("compose exited with status 1")
        );
    }
}

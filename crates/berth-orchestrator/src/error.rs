//! Error type shared by every component of the orchestrator.
//!
//! Each variant carries a stable [`OrchestratorError::kind`] string that is
//! surfaced to callers inside the operation envelope and mapped onto an HTTP
//! status by the API layer.

use axum::http::StatusCode;
use berth_models::models::ConfigValidationError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("tenant {0} already has a container")]
    DuplicateTenant(Uuid),

    #[error("tenant {0} has no container")]
    TenantNotFound(Uuid),

    #[error("tenant {0} is busy with an operation in another process")]
    TenantBusy(Uuid),

    #[error("tenant {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("tenant {tenant_id} is not running (status: {status})")]
    NotRunning { tenant_id: Uuid, status: String },

    #[error("cannot {operation} tenant {tenant_id} from status {status}")]
    InvalidState {
        tenant_id: Uuid,
        operation: &'static str,
        status: String,
    },

    #[error("container for tenant {0} is not running")]
    ContainerNotRunning(Uuid),

    #[error("container runtime failed: {0}")]
    RuntimeInvocation(String),

    #[error("container runtime query failed: {0}")]
    RuntimeQuery(String),

    #[error("no external port available: next port {0} exceeds 65535")]
    ExhaustedRange(i64),

    #[error("descriptor error: {0}")]
    Descriptor(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl OrchestratorError {
    /// Stable machine-readable identifier for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::DuplicateTenant(_) => "duplicate_tenant",
            Self::TenantNotFound(_) => "tenant_not_found",
            Self::TenantBusy(_) => "tenant_busy",
            Self::AlreadyRunning(_) => "already_running",
            Self::NotRunning { .. } => "not_running",
            Self::InvalidState { .. } => "invalid_state",
            Self::ContainerNotRunning(_) => "container_not_running",
            Self::RuntimeInvocation(_) => "runtime_invocation_error",
            Self::RuntimeQuery(_) => "runtime_query_error",
            Self::ExhaustedRange(_) => "exhausted_range",
            Self::Descriptor(_) => "descriptor_error",
            Self::Persistence(_) => "persistence_error",
        }
    }

    /// Field that failed validation, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::TenantNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateTenant(_)
            | Self::TenantBusy(_)
            | Self::AlreadyRunning(_)
            | Self::NotRunning { .. }
            | Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::ContainerNotRunning(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RuntimeInvocation(_) | Self::RuntimeQuery(_) => StatusCode::BAD_GATEWAY,
            Self::ExhaustedRange(_) => StatusCode::INSUFFICIENT_STORAGE,
            Self::Descriptor(_) | Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConfigValidationError> for OrchestratorError {
    fn from(e: ConfigValidationError) -> Self {
        Self::Validation {
            field: e.field.to_string(),
            reason: e.reason,
        }
    }
}

impl From<diesel::result::Error> for OrchestratorError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<r2d2::Error> for OrchestratorError {
    fn from(e: r2d2::Error) -> Self {
        Self::Persistence(format!("connection pool: {}", e))
    }
}

impl From<tera::Error> for OrchestratorError {
    fn from(e: tera::Error) -> Self {
        Self::Descriptor(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_from_config() {
        let err: OrchestratorError = ConfigValidationError {
            field: "cpuLimit",
            reason: "CPU limit must be at most 4".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(err.field(), Some("cpuLimit"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("CPU limit"));
    }

    #[test]
    fn test_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(
            OrchestratorError::DuplicateTenant(id).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            OrchestratorError::TenantBusy(id).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            OrchestratorError::TenantNotFound(id).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OrchestratorError::ExhaustedRange(65536).status_code(),
            StatusCode::INSUFFICIENT_STORAGE
        );
        assert_eq!(
            OrchestratorError::RuntimeInvocation("exit 1".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}

//! Error types for Qualitag operations

use std::fmt;

use thiserror::Error;

use crate::models::{Collection, EntityRef};

/// Result type alias for Qualitag operations
pub type QualitagResult<T> = Result<T, QualitagError>;

/// Broad failure category, stable across error variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    PermissionDenied,
    ServiceError,
    ServiceUnavailable,
    PartialFailure,
    Internal,
}

/// Qualitag error types
#[derive(Debug, Error)]
pub enum QualitagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{} not found: {id}", collection.kind())]
    NotFound { collection: Collection, id: String },

    #[error("Team {0} has no artifacts")]
    NoArtifacts(String),

    #[error("Project already exists: {name}")]
    ProjectExists { name: String },

    #[error("Project owner {owner} cannot also be listed as a member")]
    OwnerListedAsMember { owner: String },

    #[error("User {user} is not a member of project {project_id}")]
    NotProjectMember { user: String, project_id: String },

    #[error("User {user} already belongs to team {team_id} in this project")]
    MemberInOtherTeam { user: String, team_id: String },

    #[error("Tag {value} already exists for this user")]
    TagExists { value: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    #[error("Agreement service error: {0}")]
    Service(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    PartialFailure(Box<CascadeReport>),

    #[error("{operation} failed and needs manual reconciliation: {cause}")]
    NeedsReconciliation {
        operation: String,
        cause: Box<QualitagError>,
        compensation_failures: Vec<String>,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QualitagError {
    pub fn validation(reason: impl Into<String>) -> Self {
        QualitagError::Validation(reason.into())
    }

    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        QualitagError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn permission_denied(action: impl Into<String>) -> Self {
        QualitagError::PermissionDenied {
            action: action.into(),
        }
    }

    /// Failure category
    pub fn kind(&self) -> ErrorKind {
        match self {
            QualitagError::Validation(_) => ErrorKind::Validation,
            QualitagError::NotFound { .. } | QualitagError::NoArtifacts(_) => ErrorKind::NotFound,
            QualitagError::ProjectExists { .. }
            | QualitagError::OwnerListedAsMember { .. }
            | QualitagError::NotProjectMember { .. }
            | QualitagError::MemberInOtherTeam { .. }
            | QualitagError::TagExists { .. }
            | QualitagError::Conflict(_) => ErrorKind::Conflict,
            QualitagError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            QualitagError::Service(_) | QualitagError::Store(_) => ErrorKind::ServiceError,
            QualitagError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            QualitagError::PartialFailure(_) | QualitagError::NeedsReconciliation { .. } => {
                ErrorKind::PartialFailure
            }
            QualitagError::Serialization(_) | QualitagError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QualitagError::Validation(_) => "VALIDATION_ERROR",
            QualitagError::NotFound { collection, .. } => match collection {
                Collection::Projects => "PROJECT_NOT_FOUND",
                Collection::Teams => "TEAM_NOT_FOUND",
                Collection::Users => "USER_NOT_FOUND",
                Collection::Tags => "TAG_NOT_FOUND",
                Collection::Artifacts => "ARTIFACT_NOT_FOUND",
            },
            QualitagError::NoArtifacts(_) => "NO_ARTIFACTS",
            QualitagError::ProjectExists { .. } => "PROJECT_EXISTS",
            QualitagError::OwnerListedAsMember { .. } => "OWNER_LISTED_AS_MEMBER",
            QualitagError::NotProjectMember { .. } => "NOT_PROJECT_MEMBER",
            QualitagError::MemberInOtherTeam { .. } => "MEMBER_IN_OTHER_TEAM",
            QualitagError::TagExists { .. } => "TAG_EXISTS",
            QualitagError::Conflict(_) => "CONFLICT",
            QualitagError::PermissionDenied { .. } => "PERMISSION_DENIED",
            QualitagError::Service(_) => "SERVICE_ERROR",
            QualitagError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            QualitagError::PartialFailure(_) => "PARTIAL_FAILURE",
            QualitagError::NeedsReconciliation { .. } => "NEEDS_RECONCILIATION",
            QualitagError::Store(_) => "STORE_ERROR",
            QualitagError::Serialization(_) => "SERIALIZATION_ERROR",
            QualitagError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The failure that started a rollback, looking through reconciliation wrappers
    pub fn root_cause(&self) -> &QualitagError {
        match self {
            QualitagError::NeedsReconciliation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Cascade report carried by a partial failure
    pub fn cascade_report(&self) -> Option<&CascadeReport> {
        match self {
            QualitagError::PartialFailure(report) => Some(report),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QualitagError {
    fn from(err: serde_json::Error) -> Self {
        QualitagError::Serialization(err.to_string())
    }
}

impl From<mongodb::error::Error> for QualitagError {
    fn from(err: mongodb::error::Error) -> Self {
        QualitagError::Store(err.to_string())
    }
}

impl From<bson::ser::Error> for QualitagError {
    fn from(err: bson::ser::Error) -> Self {
        QualitagError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for QualitagError {
    fn from(err: bson::de::Error) -> Self {
        QualitagError::Serialization(err.to_string())
    }
}

/// Item of a delete cascade that could not be processed
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeFailure {
    pub entity: EntityRef,
    pub error: String,
}

/// Outcome of a delete cascade that stopped part-way.
///
/// Cascades are not rolled back; the report lists what was already
/// processed, the item that failed and what was never reached.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeReport {
    pub operation: String,
    pub target: EntityRef,
    pub completed: Vec<EntityRef>,
    pub failure: CascadeFailure,
    pub remaining: Vec<EntityRef>,
}

impl CascadeReport {
    pub fn completed_ids(&self) -> Vec<&str> {
        self.completed.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn remaining_ids(&self) -> Vec<&str> {
        self.remaining.iter().map(|e| e.id.as_str()).collect()
    }
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} partially failed at {}: {} ({} processed, {} not processed)",
            self.operation,
            self.target,
            self.failure.entity,
            self.failure.error,
            self.completed.len(),
            self.remaining.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_kinds() {
        let err = QualitagError::not_found(Collection::Teams, "t1");
        assert_eq!(err.code(), "TEAM_NOT_FOUND");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Team not found: t1");

        let err = QualitagError::OwnerListedAsMember {
            owner: "alice@x.com".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("alice@x.com"));
    }

    #[test]
    fn test_root_cause_unwraps_reconciliation() {
        let err = QualitagError::NeedsReconciliation {
            operation: "CreateTeam".into(),
            cause: Box::new(QualitagError::Store("disk full".into())),
            compensation_failures: vec!["delete Team t1".into()],
        };
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert_eq!(err.root_cause().code(), "STORE_ERROR");
        assert_eq!(err.root_cause().kind(), ErrorKind::ServiceError);
    }

    #[test]
    fn test_store_failures_are_service_errors() {
        let err = QualitagError::Store("connection refused".into());
        assert_eq!(err.kind(), ErrorKind::ServiceError);
        assert_eq!(QualitagError::Serialization("bad bson".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_cascade_report_display() {
        let report = CascadeReport {
            operation: "DeleteTeam".into(),
            target: EntityRef::new(Collection::Teams, "t1"),
            completed: vec![EntityRef::new(Collection::Artifacts, "a1")],
            failure: CascadeFailure {
                entity: EntityRef::new(Collection::Artifacts, "a2"),
                error: "timeout".into(),
            },
            remaining: vec![EntityRef::new(Collection::Artifacts, "a3")],
        };
        assert_eq!(report.completed_ids(), vec!["a1"]);
        assert_eq!(report.remaining_ids(), vec!["a3"]);
        let err = QualitagError::PartialFailure(Box::new(report));
        assert_eq!(err.code(), "PARTIAL_FAILURE");
        assert!(err.to_string().contains("Artifact a2"));
    }
}

//! Error types for foreman-core

use thiserror::Error;

use crate::status::TaskStatus;

/// Coarse error category, used by callers to decide between retrying,
/// reporting, and giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown id in project scope
    NotFound,
    /// Lock held elsewhere, busy agent, or illegal transition
    Conflict,
    /// Role/skill ineligible or non-privileged caller
    PermissionDenied,
    /// Malformed input or configuration
    Validation,
    /// Storage or IO failure
    Internal,
}

/// Core error type for foreman operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Task lock is held by a different agent
    #[error("Task {task_id} is locked by {holder}")]
    AlreadyLocked { task_id: i64, holder: String },

    /// Agent already owns a different task in progress
    #[error("Agent {agent_id} is already working on task {task_id}")]
    AgentBusy { agent_id: String, task_id: i64 },

    /// Requested status change is not a legal step
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Caller must hold the task lock for this operation
    #[error("Agent {agent_id} does not hold the lock on task {task_id}")]
    NotLockHolder { task_id: i64, agent_id: String },

    /// Role or skill does not allow the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Input failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Stored or supplied value could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl Error {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyLocked { .. } => "ALREADY_LOCKED",
            Self::AgentBusy { .. } => "AGENT_BUSY",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotLockHolder { .. } => "NOT_LOCK_HOLDER",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::IoError(_) => "IO_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
        }
    }

    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyLocked { .. }
            | Self::AgentBusy { .. }
            | Self::InvalidTransition { .. }
            | Self::NotLockHolder { .. } => ErrorKind::Conflict,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::ValidationError(_) | Self::InvalidConfig(_) => ErrorKind::Validation,
            Self::DatabaseError(_) | Self::IoError(_) | Self::ParseError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true for lock, busy, and transition conflicts.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }

    /// Returns the appropriate process exit code for this error.
    ///
    /// Exit code scheme:
    /// - 1: User error (validation, invalid input, bad configuration)
    /// - 2: System error (IO, database)
    /// - 3: Not found
    /// - 4: Conflict or permission denied
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 1,
            ErrorKind::Internal => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict | ErrorKind::PermissionDenied => 4,
        }
    }
}

/// Result type alias for foreman operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_already_locked() {
        let err = Error::AlreadyLocked {
            task_id: 42,
            holder: "backend_senior_01".into(),
        };
        assert_eq!(err.to_string(), "Task 42 is locked by backend_senior_01");
        assert_eq!(err.code(), "ALREADY_LOCKED");
    }

    #[test]
    fn test_conflict_kinds() {
        let transition = Error::InvalidTransition {
            task_id: 1,
            from: TaskStatus::Committed,
            to: TaskStatus::UnderWork,
        };
        assert!(transition.is_conflict());
        assert!(Error::AgentBusy {
            agent_id: "a".into(),
            task_id: 2
        }
        .is_conflict());
        assert!(!Error::NotFound("task 3".into()).is_conflict());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::InvalidConfig("x".into()).exit_code(), 1);
        assert_eq!(Error::DatabaseError("x".into()).exit_code(), 2);
        assert_eq!(Error::NotFound("x".into()).exit_code(), 3);
        assert_eq!(Error::PermissionDenied("x".into()).exit_code(), 4);
    }
}

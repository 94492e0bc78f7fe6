use serde::Serialize;
use thiserror::Error;

/// Process exit code for a run blocked by a failed precondition.
/// Matches EX_CONFIG from sysexits.h.
pub const EXIT_BLOCKED: i32 = 78;

/// Process exit code for any other failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Refusing destructive '{operation}' without explicit confirmation: {requirement}")]
    DestructiveGuard { operation: String, requirement: String },

    #[error("Dependency failure in {operation} (tenant '{tenant_id}'): {message}")]
    Dependency { operation: String, tenant_id: String, message: String },

    #[error("Timed out in {operation} after {attempts} attempts: {message}")]
    Timeout { operation: String, attempts: u32, message: String },

    #[error("Pipeline finished with status {status}: {reason}")]
    Pipeline { status: String, exit_code: i32, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Coarse error classification reported in manifests and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Configuration,
    NotFound,
    DestructiveGuard,
    Dependency,
    Timeout,
    Pipeline,
    Internal,
}

impl SimError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn destructive_guard(operation: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::DestructiveGuard { operation: operation.into(), requirement: requirement.into() }
    }

    /// Wrap a collaborator failure with the operation and tenant it hit.
    pub fn dependency(
        operation: impl Into<String>,
        tenant_id: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::Dependency {
            operation: operation.into(),
            tenant_id: tenant_id.into(),
            message:   cause.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }       => ErrorKind::Validation,
            Self::Configuration(_)        => ErrorKind::Configuration,
            Self::NotFound { .. }         => ErrorKind::NotFound,
            Self::DestructiveGuard { .. } => ErrorKind::DestructiveGuard,
            Self::Dependency { .. }
            | Self::Database(_)
            | Self::Io(_)                 => ErrorKind::Dependency,
            Self::Timeout { .. }          => ErrorKind::Timeout,
            Self::Pipeline { .. }         => ErrorKind::Pipeline,
            Self::Serialization(_)
            | Self::Other(_)              => ErrorKind::Internal,
        }
    }

    /// Exit code the runner should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Pipeline { exit_code, .. } => *exit_code,
            _ => EXIT_FAILURE,
        }
    }

    /// True for failures detected before any I/O was attempted.
    pub fn is_pre_io(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::DestructiveGuard | ErrorKind::Configuration
        )
    }
}

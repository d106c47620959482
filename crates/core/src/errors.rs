//! Error types for the revmigrate core library.
//!
//! Workflow modes fail with [`MigrationError`], a closed set of failure kinds
//! that callers match on to decide exit codes and whether a later retry may
//! succeed. Configuration and replay-fixture loading have their own
//! `thiserror` enums, unified by [`CoreError`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

// ---------------------------------------------------------------------------
// Migration errors
// ---------------------------------------------------------------------------

/// Coarse classification of a [`MigrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration or an unsatisfiable precondition.
    Validation,
    /// Operational failure inside an origin or destination collaborator.
    Repository,
    /// Nothing to migrate.
    EmptyChange,
    /// The operator declined to continue.
    Rejected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Repository => write!(f, "repository"),
            Self::EmptyChange => write!(f, "empty_change"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Errors raised while running a workflow mode.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Configuration or precondition failure.
    ///
    /// `retryable` hints that running again later, without reconfiguring,
    /// may succeed (e.g. the destination has not caught up yet).
    #[error("{message}")]
    Validation { message: String, retryable: bool },

    /// A revision (typically the last migrated one) could not be resolved.
    #[error("cannot resolve revision: {0}")]
    CannotResolveRevision(String),

    /// I/O or protocol failure in a collaborator.
    #[error("{message}")]
    Repository {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The migration produced nothing to write.
    #[error("{0}")]
    EmptyChange(String),

    /// The operator aborted the run from an interactive prompt.
    #[error("{0}")]
    ChangeRejected(String),
}

impl MigrationError {
    /// Non-retryable validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            retryable: false,
        }
    }

    /// Validation failure that may succeed if retried later.
    pub fn retryable_validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            retryable: true,
        }
    }

    /// Repository failure without an underlying cause.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            source: None,
        }
    }

    /// Repository failure wrapping an underlying cause.
    pub fn repository_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Repository {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn empty_change(message: impl Into<String>) -> Self {
        Self::EmptyChange(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::CannotResolveRevision(_) => ErrorKind::Validation,
            Self::Repository { .. } => ErrorKind::Repository,
            Self::EmptyChange(_) => ErrorKind::EmptyChange,
            Self::ChangeRejected(_) => ErrorKind::Rejected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Validation { retryable: true, .. })
    }
}

/// Returns a validation error carrying `message` unless `condition` holds.
pub fn check_condition(condition: bool, message: impl Into<String>) -> Result<(), MigrationError> {
    if condition {
        Ok(())
    } else {
        Err(MigrationError::validation(message))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Replay fixture errors
// ---------------------------------------------------------------------------

/// Errors from loading or querying a replay fixture.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Fixture file not found.
    #[error("replay fixture not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("replay fixture parse error: {0}")]
    ParseError(String),

    /// The fixture is structurally inconsistent.
    #[error("invalid replay fixture: {0}")]
    Invalid(String),

    /// A revision id is not part of the origin history.
    #[error("unknown origin revision '{0}'")]
    UnknownRevision(String),

    /// Generic I/O error reading the fixture.
    #[error("replay fixture I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ReplayError> for MigrationError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::UnknownRevision(id) => MigrationError::CannotResolveRevision(id),
            other => MigrationError::repository_with_source("replay repository failure", other),
        }
    }
}

//! Error types for `beans-lib`.
//!
//! Every variant maps to a stable machine-readable code via
//! [`BeansError::code`], which the CLI prints alongside the message.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for beans-lib operations.
#[derive(Error, Debug)]
pub enum BeansError {
    // === Bean Errors ===
    /// Bean with the specified ID was not found.
    #[error("Bean not found: {id}")]
    NotFound { id: String },

    /// Input resolves to more than one bean.
    #[error("Ambiguous ID '{partial}': matches {matches:?}")]
    AmbiguousId {
        partial: String,
        matches: Vec<String>,
    },

    /// Attempted to create a bean with an ID that already exists.
    #[error("Bean ID collision: {id}")]
    IdCollision { id: String },

    // === Concurrency Errors ===
    /// The caller's fingerprint no longer matches the stored bean.
    #[error("ETag mismatch for {id}: expected {expected}, current {actual}")]
    ETagMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// Strict mode is on and the update carried no fingerprint.
    #[error("ETag required to update {id}")]
    ETagRequired { id: String },

    /// Lock poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    LockPoisoned,

    // === Parse & Validation Errors ===
    /// A bean file could not be decoded.
    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Invalid status value.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    /// Invalid bean type value.
    #[error("Invalid bean type: {bean_type}")]
    InvalidType { bean_type: String },

    /// Invalid priority value.
    #[error("Invalid priority: {priority}")]
    InvalidPriority { priority: String },

    // === Git Flow Errors ===
    /// Git flow operation requested while the integration is off.
    #[error("Git flow is not enabled")]
    GitFlowDisabled,

    /// Working tree has changes outside the beans directory.
    #[error("Working tree has uncommitted changes: {}", paths.join(", "))]
    DirtyWorkingTree { paths: Vec<String> },

    /// Underlying git failure.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    // === Configuration Errors ===
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === I/O Errors ===
    /// Filesystem watcher failure.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeansError {
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AmbiguousId { .. } => "ambiguous_id",
            Self::IdCollision { .. } => "id_collision",
            Self::ETagMismatch { .. } => "etag_mismatch",
            Self::ETagRequired { .. } => "etag_required",
            Self::LockPoisoned => "lock_poisoned",
            Self::Parse { .. } => "parse_error",
            Self::Validation { .. } => "validation",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::InvalidType { .. } => "invalid_type",
            Self::InvalidPriority { .. } => "invalid_priority",
            Self::GitFlowDisabled => "gitflow_disabled",
            Self::DirtyWorkingTree { .. } => "dirty_working_tree",
            Self::Git(_) => "git",
            Self::Config(_) => "config",
            Self::Watch(_) => "watch",
            Self::Yaml(_) => "yaml",
            Self::Io(_) => "io",
        }
    }

    /// True for failures caused by a concurrent writer.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ETagMismatch { .. } | Self::IdCollision { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for BeansError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

/// Result type using `BeansError`.
pub type Result<T> = std::result::Result<T, BeansError>;

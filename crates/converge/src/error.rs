//! Error types for the reconciliation engine.
//!
//! Configuration and dependency problems are batched: every offending
//! field is collected and reported in one error so a user can fix a
//! document in a single pass.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single validation failure, tied to the field that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The batched result of validating a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration validation failed:")?;
        for err in &self.0 {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Batched dependency failures found when checking a desired state
/// against the current system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyErrors(pub Vec<String>);

impl fmt::Display for DependencyErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency validation failed:\n  - {}", self.0.join("\n  - "))
    }
}

impl std::error::Error for DependencyErrors {}

/// Errors produced anywhere in the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem access failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration document could not be parsed.
    #[error("invalid YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The include graph contains a directed cycle.
    #[error("circular include detected: {0}")]
    CircularInclude(String),

    /// Loading an included document failed.
    #[error("failed to load include '{include}': {source}")]
    Include {
        include: String,
        #[source]
        source: Box<Error>,
    },

    /// One or more invariants of the merged document do not hold.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The desired state requires something the system cannot provide.
    #[error(transparent)]
    Dependency(#[from] DependencyErrors),

    /// An out-of-process command exited unsuccessfully. The message
    /// carries the command's combined output so callers can match on it.
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// An action was constructed with fields that cannot be applied.
    #[error("{0}")]
    Invalid(String),

    /// Anything else, with enough context baked into the message.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

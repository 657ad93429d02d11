//! Error taxonomy for indexing runs.
//!
//! Manifest problems are fatal and abort the run. Everything else is
//! recorded as a [`RunIssue`] so a run can finish with partial success.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported manifest version {0}")]
    UnsupportedVersion(u32),
    #[error("manifest field `{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("duplicate manifest path: {0}")]
    DuplicatePath(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid front matter: {0}")]
    FrontMatter(String),
    #[error("front matter block is not closed")]
    UnclosedFrontMatter,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid table reference `{0}`")]
    BadTableRef(String),
    #[error("invalid foreign key line `{0}`")]
    BadForeignKey(String),
    #[error("column `{column}` declared twice")]
    DuplicateColumn { column: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbedError {
    /// Worth retrying: rate limiting, server errors, network failures.
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// The service refused this batch (e.g. too large); others may succeed.
    #[error("embedding request rejected: {0}")]
    Rejected(String),
    /// The service cannot be used this run: bad credentials, unknown model,
    /// wrong dimensions.
    #[error("embedding failure: {0}")]
    Permanent(String),
}

impl EmbedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbedError::Transient(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    RecoverableError,
    RecoverableWarning,
    Deferred,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::RecoverableError => "error",
            Severity::RecoverableWarning => "warning",
            Severity::Deferred => "deferred",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem encountered during a run, tied to the path it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunIssue {
    pub severity: Severity,
    pub path: Option<String>,
    pub message: String,
}

impl RunIssue {
    pub fn new(severity: Severity, path: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn error(path: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::RecoverableError, Some(path), message)
    }

    pub fn warning(path: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::RecoverableWarning, path, message)
    }

    pub fn deferred(path: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Deferred, Some(path), message)
    }
}

impl fmt::Display for RunIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.severity, path, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

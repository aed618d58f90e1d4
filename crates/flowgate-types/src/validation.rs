//! Validation report types.
//!
//! The validator never throws for rule violations; it returns a
//! [`ValidationResult`] with issues sorted into severity buckets.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue severity. Only `Error` blocks execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// A single finding, pointing into the document (e.g. `nodes[3].position`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, path, message)
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, path, message)
    }

    pub fn info(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, path, message)
    }

    fn new(severity: Severity, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Outcome of validating one document.
///
/// Build it through [`ValidationResult::from_issues`] so that `is_valid`
/// always equals `errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
    /// Version of the schema document, when the schema tier produced this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Sort issues into buckets, preserving their relative order.
    pub fn from_issues(issues: Vec<ValidationIssue>, schema_version: Option<String>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut info = Vec::new();
        for issue in issues {
            match issue.severity {
                Severity::Error => errors.push(issue),
                Severity::Warning => warnings.push(issue),
                Severity::Info => info.push(issue),
            }
        }
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            info,
            schema_version,
            validated_at: Utc::now(),
        }
    }

    /// Result holding exactly one error.
    pub fn single_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_issues(vec![ValidationIssue::error(path, message)], None)
    }

    /// Compare everything except `validated_at`.
    pub fn same_issues(&self, other: &ValidationResult) -> bool {
        self.is_valid == other.is_valid
            && self.errors == other.errors
            && self.warnings == other.warnings
            && self.info == other.info
            && self.schema_version == other.schema_version
    }

    /// All issues, errors first.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.info.len()
    }
}
